//! Library entry point for Pairmill.
//!
//! Pairmill turns a timestamped two-person chat log into a deduplicated set of
//! (conversation-history, response) pairs for training or evaluating a
//! response-generation model. This crate holds the core: the message model,
//! inactivity-gap session segmentation, windowed exchange extraction with
//! content-normalized dedup, and dataset persistence. Export parsing
//! (CSV, timestamp formats) lives in the CLI crate.
//
// Public modules
pub mod extract;
pub mod model;
pub mod session;

// Re‑export primary types for ergonomic use.
pub use extract::{extract_from_session, extract_pairs, DedupState, ExtractConfig, ExtractStats};
pub use model::{ChatMessage, TrainingPair};
pub use session::{split_into_sessions, Session, SessionConfig, SessionStats};

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Save pairs as a pretty-printed JSON array (2-space indent, UTF-8).
///
/// This is the primary dataset format: a bare array of
/// `{"history": [...], "response": "..."}` objects, so the file feeds straight
/// into training tooling without an envelope to strip.
pub fn save_dataset_json(pairs: &[TrainingPair], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating dataset file {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), pairs)
        .with_context(|| format!("writing dataset JSON to {}", path.display()))?;
    Ok(())
}

/// Load a dataset previously written with `save_dataset_json`.
pub fn load_dataset_json(path: &Path) -> Result<Vec<TrainingPair>> {
    let file = BufReader::new(
        File::open(path).with_context(|| format!("opening dataset file {}", path.display()))?,
    );
    let pairs: Vec<TrainingPair> = serde_json::from_reader(file)
        .with_context(|| format!("parsing dataset JSON from {}", path.display()))?;
    Ok(pairs)
}

/// Save pairs as JSON Lines: one `{"history": [...], "response": "..."}`
/// object per line.
pub fn save_dataset_jsonl(pairs: &[TrainingPair], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating dataset file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for pair in pairs {
        serde_json::to_writer(&mut writer, pair)
            .with_context(|| format!("writing dataset JSONL to {}", path.display()))?;
        writer
            .write_all(b"\n")
            .with_context(|| format!("writing dataset JSONL to {}", path.display()))?;
    }
    writer
        .flush()
        .with_context(|| format!("flushing dataset JSONL to {}", path.display()))?;
    Ok(())
}

/// Load a dataset previously written with `save_dataset_jsonl`.
///
/// Blank lines are ignored; a malformed line fails the load with its 1-based
/// line number in the error chain.
pub fn load_dataset_jsonl(path: &Path) -> Result<Vec<TrainingPair>> {
    let file = BufReader::new(
        File::open(path).with_context(|| format!("opening dataset file {}", path.display()))?,
    );
    let mut pairs: Vec<TrainingPair> = Vec::new();
    for (idx, line) in file.lines().enumerate() {
        let line = line.with_context(|| format!("reading line {} of {}", idx + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let pair: TrainingPair = serde_json::from_str(&line)
            .with_context(|| format!("parsing line {} of {}", idx + 1, path.display()))?;
        pairs.push(pair);
    }
    Ok(pairs)
}
