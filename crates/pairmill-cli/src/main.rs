//! CLI for Pairmill.
//!
//! Subcommands:
//!  - `transform` : turn a chat export CSV into a deduplicated training dataset.
//!  - `extend`    : append new pairs from an export to an existing dataset.
//!  - `stats`     : inspect an export without writing anything.
//!  - `sample`    : print a few pairs from a dataset file.
//!
//! Design goals:
//!  - Small, testable, and clear CLI surface.
//!  - Use the library crate (`pairmill`) for segmentation, extraction and
//!    dataset persistence; keep export-format concerns (CSV columns, timestamp
//!    formats, noise filters) here.
//!  - Prefer `anyhow::Result` for application-level error handling.
//!
//! Usage examples:
//!  cargo run -p pairmill -- transform --input chat.csv --out dataset.json \
//!      --prompter "cream♡" --responder frank

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use serde_json::json;

mod progress;
mod timestamp;

use crate::progress::Progress;

/// Local library crate export (hyphen -> underscore).
use pairmill::{
    extract_from_session, load_dataset_json, load_dataset_jsonl, save_dataset_json,
    save_dataset_jsonl, split_into_sessions, ChatMessage, DedupState, ExtractConfig, ExtractStats,
    SessionConfig, SessionStats, TrainingPair,
};

/// CLI entrypoint.
#[derive(Parser)]
#[command(
    name = "pairmill",
    about = "Pairmill CLI — chat export to (history, response) training pairs",
    version
)]
struct Cli {
    /// Subcommands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Turn a chat export CSV into a deduplicated training dataset.
    Transform(TransformArgs),

    /// Append new pairs from an export to an existing dataset (alias for transform --append).
    Extend(ExtendArgs),

    /// Inspect a chat export: message counts, sessions, time span.
    Stats(StatsArgs),

    /// Print a few pairs from a dataset file.
    Sample(SampleArgs),
}

/// Arguments for the `transform` subcommand.
#[derive(Args, Debug)]
struct TransformArgs {
    /// Path to the chat export CSV (columns: DateTime, Sender, Message).
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Path to write the dataset to.
    #[arg(long, short = 'o', value_name = "PATH")]
    out: PathBuf,

    /// Sender whose messages open an exchange.
    #[arg(long)]
    prompter: String,

    /// Sender whose messages are collected as responses.
    #[arg(long)]
    responder: String,

    /// Lines of context kept before a prompt (also the dedup-key depth).
    #[arg(long, default_value_t = pairmill::extract::DEFAULT_HISTORY_LENGTH)]
    history_length: usize,

    /// Inactivity gap (minutes) that splits two messages into separate sessions.
    #[arg(long, default_value_t = 10)]
    session_gap_minutes: u64,

    /// Responses with fewer content words than this are skipped.
    #[arg(long, default_value_t = pairmill::extract::DEFAULT_MIN_RESPONSE_WORDS)]
    min_response_words: usize,

    /// How many lines after a prompt are searched for the response.
    #[arg(long, default_value_t = pairmill::extract::DEFAULT_RESPONSE_LOOKAHEAD)]
    response_lookahead: usize,

    /// Dataset format: json|jsonl.
    #[arg(long, default_value = "json")]
    format: String,

    /// If set, load an existing dataset at --out, seed dedup state from it and
    /// append only new pairs.
    #[arg(long)]
    append: bool,

    /// Maximum number of CSV records to read (useful for testing).
    #[arg(long)]
    max_messages: Option<usize>,

    /// Drop messages whose content matches this regex. Repeatable.
    #[arg(long = "drop-message", value_name = "REGEX")]
    drop_message: Vec<String>,

    /// Built-in message filter preset. Supported: chat-noise
    #[arg(long = "drop-preset", value_name = "NAME")]
    drop_preset: Option<String>,

    /// Apply case-insensitive matching for message filters.
    #[arg(long = "drop-case-insensitive")]
    drop_case_insensitive: bool,
}

/// Arguments for the `extend` subcommand.
#[derive(Args, Debug)]
struct ExtendArgs {
    /// Path to the chat export CSV (columns: DateTime, Sender, Message).
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Path to the dataset to extend in place.
    #[arg(long, short = 'o', value_name = "PATH")]
    out: PathBuf,

    /// Sender whose messages open an exchange.
    #[arg(long)]
    prompter: String,

    /// Sender whose messages are collected as responses.
    #[arg(long)]
    responder: String,

    /// Lines of context kept before a prompt (also the dedup-key depth).
    #[arg(long, default_value_t = pairmill::extract::DEFAULT_HISTORY_LENGTH)]
    history_length: usize,

    /// Inactivity gap (minutes) that splits two messages into separate sessions.
    #[arg(long, default_value_t = 10)]
    session_gap_minutes: u64,

    /// Responses with fewer content words than this are skipped.
    #[arg(long, default_value_t = pairmill::extract::DEFAULT_MIN_RESPONSE_WORDS)]
    min_response_words: usize,

    /// How many lines after a prompt are searched for the response.
    #[arg(long, default_value_t = pairmill::extract::DEFAULT_RESPONSE_LOOKAHEAD)]
    response_lookahead: usize,

    /// Dataset format: json|jsonl.
    #[arg(long, default_value = "json")]
    format: String,

    /// Maximum number of CSV records to read (useful for testing).
    #[arg(long)]
    max_messages: Option<usize>,

    /// Drop messages whose content matches this regex. Repeatable.
    #[arg(long = "drop-message", value_name = "REGEX")]
    drop_message: Vec<String>,

    /// Built-in message filter preset. Supported: chat-noise
    #[arg(long = "drop-preset", value_name = "NAME")]
    drop_preset: Option<String>,

    /// Apply case-insensitive matching for message filters.
    #[arg(long = "drop-case-insensitive")]
    drop_case_insensitive: bool,
}

/// Arguments for the `stats` subcommand.
#[derive(Args, Debug)]
struct StatsArgs {
    /// Path to the chat export CSV (columns: DateTime, Sender, Message).
    #[arg(short, long, value_name = "PATH")]
    input: PathBuf,

    /// Inactivity gap (minutes) used for the session count.
    #[arg(long, default_value_t = 10)]
    session_gap_minutes: u64,

    /// Maximum number of CSV records to read (useful for testing).
    #[arg(long)]
    max_messages: Option<usize>,

    /// Output as JSON.
    #[arg(long)]
    json: bool,
}

/// Arguments for the `sample` subcommand.
#[derive(Args, Debug)]
struct SampleArgs {
    /// Path to a dataset file written by `transform`.
    #[arg(short, long, value_name = "PATH")]
    dataset: PathBuf,

    /// Dataset format: json|jsonl.
    #[arg(long, default_value = "json")]
    format: String,

    /// Number of pairs to print.
    #[arg(long, default_value_t = 5)]
    count: usize,

    /// Seed for reproducible sampling. Unseeded runs pick fresh entropy.
    #[arg(long)]
    seed: Option<u64>,

    /// Output as JSON.
    #[arg(long)]
    json: bool,
}

/// Application entry point.
fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Transform(args) => run_transform(args),
        Commands::Extend(args) => run_extend(args),
        Commands::Stats(args) => run_stats(args),
        Commands::Sample(args) => run_sample(args),
    }
}

/// Dataset file formats the CLI can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DatasetFormat {
    Json,
    Jsonl,
}

impl DatasetFormat {
    fn from_flag(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" => Ok(Self::Jsonl),
            other => Err(anyhow::anyhow!(
                "unsupported --format '{}'; supported: json|jsonl",
                other
            )),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Jsonl => "jsonl",
        }
    }
}

fn save_dataset(pairs: &[TrainingPair], path: &Path, format: DatasetFormat) -> Result<()> {
    match format {
        DatasetFormat::Json => save_dataset_json(pairs, path),
        DatasetFormat::Jsonl => save_dataset_jsonl(pairs, path),
    }
}

fn load_dataset(path: &Path, format: DatasetFormat) -> Result<Vec<TrainingPair>> {
    match format {
        DatasetFormat::Json => load_dataset_json(path),
        DatasetFormat::Jsonl => load_dataset_jsonl(path),
    }
}

#[derive(Debug, Default)]
struct FilterStats {
    messages_seen: usize,
    messages_kept: usize,
    messages_dropped: usize,
}

#[derive(Debug, Default)]
struct MessageFilterConfig {
    drop_patterns: Vec<Regex>,
}

impl MessageFilterConfig {
    fn enabled(&self) -> bool {
        !self.drop_patterns.is_empty()
    }

    fn from_transform_args(args: &TransformArgs) -> Result<Self> {
        let mut raw_patterns: Vec<String> = Vec::new();

        if let Some(preset) = args.drop_preset.as_ref() {
            match preset.to_lowercase().as_str() {
                "chat-noise" => {
                    raw_patterns.extend([
                        String::from(r"^<Media omitted>$"),
                        String::from(r"^This message was deleted$"),
                        String::from(r"^You deleted this message$"),
                        String::from(r"^Missed voice call$"),
                        String::from(r"^Missed video call$"),
                        String::from(r"^null$"),
                    ]);
                }
                other => {
                    return Err(anyhow::anyhow!(
                        "unsupported --drop-preset '{}'; supported: chat-noise",
                        other
                    ));
                }
            }
        }

        raw_patterns.extend(args.drop_message.iter().cloned());

        let mut drop_patterns = Vec::with_capacity(raw_patterns.len());
        for pattern in raw_patterns {
            let rx = RegexBuilder::new(&pattern)
                .case_insensitive(args.drop_case_insensitive)
                .build()
                .with_context(|| format!("invalid --drop-message regex: '{}'", pattern))?;
            drop_patterns.push(rx);
        }

        Ok(Self { drop_patterns })
    }
}

/// Decide whether a message survives ingestion. Empty messages are always
/// dropped; otherwise any matching drop pattern removes the message before
/// segmentation, so noise neither splits windows nor lands in history.
fn keep_message(content: &str, filters: &MessageFilterConfig, stats: &mut FilterStats) -> bool {
    stats.messages_seen = stats.messages_seen.saturating_add(1);

    let trimmed = content.trim();
    if trimmed.is_empty() {
        stats.messages_dropped = stats.messages_dropped.saturating_add(1);
        return false;
    }

    if filters.drop_patterns.iter().any(|rx| rx.is_match(trimmed)) {
        stats.messages_dropped = stats.messages_dropped.saturating_add(1);
        return false;
    }

    stats.messages_kept = stats.messages_kept.saturating_add(1);
    true
}

/// One row of the export CSV.
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "DateTime")]
    datetime: String,
    #[serde(rename = "Sender")]
    sender: String,
    #[serde(rename = "Message")]
    message: String,
}

struct CollectMessagesOutput {
    messages: Vec<ChatMessage>,
    filter_stats: FilterStats,
}

/// Read the export CSV into `ChatMessage`s, sorted ascending by timestamp.
///
/// # Errors
///
/// Returns an `anyhow::Error` for IO failures, malformed rows and
/// unparseable timestamps; record numbers are 1-based in the error chain.
fn collect_messages(
    path: &Path,
    max_messages: Option<usize>,
    filters: &MessageFilterConfig,
) -> Result<CollectMessagesOutput> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening chat export {}", path.display()))?;

    let mut messages: Vec<ChatMessage> = Vec::new();
    let mut filter_stats = FilterStats::default();

    for (idx, result) in reader.deserialize::<RawRecord>().enumerate() {
        if let Some(limit) = max_messages {
            if idx >= limit {
                break;
            }
        }

        let record = result.with_context(|| format!("reading CSV record {}", idx + 1))?;
        let ts = timestamp::parse_timestamp(&record.datetime)
            .with_context(|| format!("parsing DateTime in CSV record {}", idx + 1))?;

        if !keep_message(&record.message, filters, &mut filter_stats) {
            continue;
        }

        messages.push(ChatMessage {
            sender: record.sender,
            content: record.message,
            timestamp: ts,
        });
    }

    // Exports are usually chronological already, but not reliably; sort_by_key
    // is stable so equal timestamps keep their file order.
    messages.sort_by_key(|m| m.timestamp);

    Ok(CollectMessagesOutput {
        messages,
        filter_stats,
    })
}

/// Run the `extend` subcommand as an alias for append-mode transformation.
fn run_extend(args: ExtendArgs) -> Result<()> {
    let transform_args = TransformArgs {
        input: args.input,
        out: args.out,
        prompter: args.prompter,
        responder: args.responder,
        history_length: args.history_length,
        session_gap_minutes: args.session_gap_minutes,
        min_response_words: args.min_response_words,
        response_lookahead: args.response_lookahead,
        format: args.format,
        append: true,
        max_messages: args.max_messages,
        drop_message: args.drop_message,
        drop_preset: args.drop_preset,
        drop_case_insensitive: args.drop_case_insensitive,
    };
    run_transform(transform_args)
}

/// Run the `transform` subcommand.
///
/// This function:
/// 1. Reads and filters the export CSV.
/// 2. Segments messages into sessions by inactivity gap.
/// 3. Extracts deduplicated (history, response) pairs.
/// 4. Writes the dataset file (merging with an existing one in append mode).
fn run_transform(args: TransformArgs) -> Result<()> {
    println!("Starting transform for export: {}", args.input.display());

    let format = DatasetFormat::from_flag(&args.format)?;
    let filters = MessageFilterConfig::from_transform_args(&args)?;

    let extract_config = ExtractConfig {
        prompter: args.prompter.clone(),
        responder: args.responder.clone(),
        history_length: args.history_length,
        response_lookahead: args.response_lookahead,
        min_response_words: args.min_response_words,
    };
    extract_config.validate()?;

    let session_config = SessionConfig {
        gap_seconds: args.session_gap_minutes.saturating_mul(60),
    };

    let collected = collect_messages(&args.input, args.max_messages, &filters)
        .with_context(|| format!("collecting messages from {}", args.input.display()))?;

    println!("Collected {} messages.", collected.messages.len());
    if filters.enabled() {
        println!(
            "Message filter summary: seen={} kept={} dropped={}",
            collected.filter_stats.messages_seen,
            collected.filter_stats.messages_kept,
            collected.filter_stats.messages_dropped
        );
    }

    // Initialize or load the dataset. In append mode an existing file at --out
    // seeds dedup state so already-exported pairs are never re-emitted.
    let existing_pairs: Vec<TrainingPair> = if args.append {
        if args.out.exists() {
            println!("Loading existing dataset from {}", args.out.display());
            load_dataset(&args.out, format)
                .with_context(|| format!("loading dataset from {}", args.out.display()))?
        } else {
            println!(
                "Output path {} does not exist, creating new dataset.",
                args.out.display()
            );
            Vec::new()
        }
    } else {
        Vec::new()
    };

    let mut session_stats = SessionStats::default();
    let sessions = split_into_sessions(&collected.messages, &session_config, &mut session_stats);
    println!(
        "Session summary: gap>{}s sessions={} largest={} splits={}",
        session_config.gap_seconds,
        session_stats.sessions_emitted,
        session_stats.largest_session,
        session_stats.splits_on_gap
    );

    let mut dedup = DedupState::from_pairs(&existing_pairs, extract_config.history_length);
    if args.append && !existing_pairs.is_empty() {
        println!(
            "Append mode: seeded dedup state from {} existing pairs.",
            existing_pairs.len()
        );
    }

    let bar = Progress::new(sessions.len() as u64, "Extracting exchanges...");
    let mut extract_stats = ExtractStats::default();
    let mut new_pairs: Vec<TrainingPair> = Vec::new();
    for session in &sessions {
        new_pairs.extend(extract_from_session(
            session,
            &extract_config,
            &mut dedup,
            &mut extract_stats,
        ));
        bar.inc();
    }
    bar.finish(format!(
        "Extracted {} pairs from {} sessions.",
        new_pairs.len(),
        sessions.len()
    ));

    println!(
        "Extract summary: prompts_seen={} pairs_emitted={} skipped_short={} skipped_reused={} skipped_duplicate={}",
        extract_stats.prompts_seen,
        extract_stats.pairs_emitted,
        extract_stats.skipped_short_response,
        extract_stats.skipped_reused_response,
        extract_stats.skipped_duplicate_pair
    );

    let new_count = new_pairs.len();
    let mut pairs = existing_pairs;
    pairs.append(&mut new_pairs);

    save_dataset(&pairs, &args.out, format)
        .with_context(|| format!("saving dataset to {}", args.out.display()))?;
    println!("Saved {} dataset to {}", format.as_str(), args.out.display());

    println!(
        "Dataset summary: pairs = {} ({} new, {} existing)",
        pairs.len(),
        new_count,
        pairs.len() - new_count
    );

    Ok(())
}

/// Run the `stats` subcommand.
fn run_stats(args: StatsArgs) -> Result<()> {
    let filters = MessageFilterConfig::default();
    let collected = collect_messages(&args.input, args.max_messages, &filters)
        .with_context(|| format!("collecting messages from {}", args.input.display()))?;
    let messages = collected.messages;

    let session_config = SessionConfig {
        gap_seconds: args.session_gap_minutes.saturating_mul(60),
    };
    let mut session_stats = SessionStats::default();
    let sessions = split_into_sessions(&messages, &session_config, &mut session_stats);

    let mut per_sender: HashMap<String, usize> = HashMap::new();
    for msg in &messages {
        *per_sender.entry(msg.sender.clone()).or_insert(0) += 1;
    }
    let mut senders: Vec<(String, usize)> = per_sender.into_iter().collect();
    senders.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let first_ts = messages.first().map(|m| m.timestamp);
    let last_ts = messages.last().map(|m| m.timestamp);

    if args.json {
        let sender_objs: Vec<serde_json::Value> = senders
            .iter()
            .map(|(sender, count)| json!({ "sender": sender, "messages": count }))
            .collect();
        let out = json!({
            "input": args.input.to_string_lossy().to_string(),
            "messages": messages.len(),
            "first_timestamp": first_ts,
            "last_timestamp": last_ts,
            "session_gap_seconds": session_config.gap_seconds,
            "sessions": session_stats.sessions_emitted,
            "largest_session": session_stats.largest_session,
            "senders": sender_objs,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("Messages: {}", messages.len());
        if let (Some(first), Some(last)) = (first_ts, last_ts) {
            println!(
                "Time span: {} .. {}",
                format_epoch(first),
                format_epoch(last)
            );
        }
        println!(
            "Sessions (gap > {}s): {} (largest {})",
            session_config.gap_seconds,
            sessions.len(),
            session_stats.largest_session
        );
        println!("Senders:");
        for (sender, count) in &senders {
            println!("  {}: {}", sender, count);
        }
    }

    Ok(())
}

/// Render epoch seconds as RFC 3339 UTC for human-readable summaries.
fn format_epoch(seconds: u64) -> String {
    chrono::DateTime::from_timestamp(seconds as i64, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| format!("epoch+{}s", seconds))
}

/// Run the `sample` subcommand.
fn run_sample(args: SampleArgs) -> Result<()> {
    let format = DatasetFormat::from_flag(&args.format)?;
    let pairs = load_dataset(&args.dataset, format)
        .with_context(|| format!("loading dataset from {}", args.dataset.display()))?;

    if pairs.is_empty() {
        println!("Dataset {} is empty.", args.dataset.display());
        return Ok(());
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let picked: Vec<&TrainingPair> = pairs.choose_multiple(&mut rng, args.count).collect();

    if args.json {
        let out = json!({
            "dataset": args.dataset.to_string_lossy().to_string(),
            "total_pairs": pairs.len(),
            "sampled": picked.len(),
            "pairs": picked,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!(
            "Sampled {} of {} pairs from {}:",
            picked.len(),
            pairs.len(),
            args.dataset.display()
        );
        for (i, pair) in picked.iter().enumerate() {
            println!("{}. history:", i + 1);
            for line in &pair.history {
                println!("     {}", line);
            }
            println!("   response: {}", pair.response);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{keep_message, DatasetFormat, FilterStats, MessageFilterConfig};
    use regex::RegexBuilder;

    fn filters(patterns: &[&str], case_insensitive: bool) -> MessageFilterConfig {
        MessageFilterConfig {
            drop_patterns: patterns
                .iter()
                .map(|p| {
                    RegexBuilder::new(p)
                        .case_insensitive(case_insensitive)
                        .build()
                        .unwrap()
                })
                .collect(),
        }
    }

    #[test]
    fn format_flag_parses_known_values() {
        assert_eq!(DatasetFormat::from_flag("json").unwrap(), DatasetFormat::Json);
        assert_eq!(
            DatasetFormat::from_flag("JSONL").unwrap(),
            DatasetFormat::Jsonl
        );
        assert!(DatasetFormat::from_flag("csv").is_err());
    }

    #[test]
    fn empty_messages_are_always_dropped() {
        let mut stats = FilterStats::default();
        assert!(!keep_message("   ", &MessageFilterConfig::default(), &mut stats));
        assert_eq!(stats.messages_dropped, 1);
    }

    #[test]
    fn matching_messages_are_dropped() {
        let mut stats = FilterStats::default();
        let f = filters(&[r"^<Media omitted>$"], false);
        assert!(!keep_message("<Media omitted>", &f, &mut stats));
        assert!(keep_message("sending you the photo now", &f, &mut stats));
        assert_eq!(stats.messages_seen, 2);
        assert_eq!(stats.messages_kept, 1);
        assert_eq!(stats.messages_dropped, 1);
    }

    #[test]
    fn case_insensitive_flag_widens_matching() {
        let mut stats = FilterStats::default();
        let sensitive = filters(&[r"^null$"], false);
        assert!(keep_message("NULL", &sensitive, &mut stats));

        let insensitive = filters(&[r"^null$"], true);
        assert!(!keep_message("NULL", &insensitive, &mut stats));
    }
}
