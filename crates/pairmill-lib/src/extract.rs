//! Exchange extraction: scan each session for prompter-then-responder
//! exchanges and emit deduplicated (history, response) pairs.
//!
//! Scan semantics:
//! - A formatted line starting with `"<prompter>:"` opens an exchange.
//! - The response is searched within the next `response_lookahead` lines; the
//!   first line starting with `"<responder>:"` that is neither too short nor
//!   an already-used response closes the window, whether or not the pair is
//!   ultimately emitted (a duplicate key closes it silently).
//! - Responses below the word threshold, or already used verbatim, leave the
//!   window open and the scan continues to the next candidate line.
//! - History spans from `history_length - 1` lines before the prompt up to
//!   (excluding) the response, so intervening messages are kept as context and
//!   history may exceed `history_length` entries; the dedup key normalizes
//!   only the trailing `history_length` entries.
//!
//! Dedup state is shared across sessions; windows and history never cross a
//! session boundary.

use std::collections::HashSet;

use anyhow::Result;

use crate::model::TrainingPair;
use crate::session::Session;

/// Default number of history lines normalized into the dedup key (and the
/// minimum context kept before a prompt).
pub const DEFAULT_HISTORY_LENGTH: usize = 3;
/// Default number of lines after a prompt searched for the response.
pub const DEFAULT_RESPONSE_LOOKAHEAD: usize = 4;
/// Default minimum word count of a response's content.
pub const DEFAULT_MIN_RESPONSE_WORDS: usize = 2;

/// Configuration for exchange extraction.
#[derive(Clone, Debug)]
pub struct ExtractConfig {
    /// Sender whose messages open an exchange.
    pub prompter: String,
    /// Sender whose messages close an exchange (the response side).
    pub responder: String,
    /// Number of lines of leading context kept before a prompt, and the number
    /// of trailing history entries normalized into the dedup key.
    pub history_length: usize,
    /// How many lines after a prompt are searched for a response.
    pub response_lookahead: usize,
    /// Responses whose content has fewer words than this are skipped.
    pub min_response_words: usize,
}

impl ExtractConfig {
    pub fn new(prompter: impl Into<String>, responder: impl Into<String>) -> Self {
        ExtractConfig {
            prompter: prompter.into(),
            responder: responder.into(),
            history_length: DEFAULT_HISTORY_LENGTH,
            response_lookahead: DEFAULT_RESPONSE_LOOKAHEAD,
            min_response_words: DEFAULT_MIN_RESPONSE_WORDS,
        }
    }

    /// Reject configurations that would make the scan degenerate.
    pub fn validate(&self) -> Result<()> {
        if self.prompter.trim().is_empty() {
            return Err(anyhow::anyhow!("prompter name must not be empty"));
        }
        if self.responder.trim().is_empty() {
            return Err(anyhow::anyhow!("responder name must not be empty"));
        }
        if self.prompter == self.responder {
            return Err(anyhow::anyhow!(
                "prompter and responder must be different senders (got '{}' for both)",
                self.prompter
            ));
        }
        if self.history_length == 0 {
            return Err(anyhow::anyhow!("history length must be at least 1"));
        }
        if self.response_lookahead == 0 {
            return Err(anyhow::anyhow!("response lookahead must be at least 1"));
        }
        Ok(())
    }
}

/// Counters reported in the run summary after extraction.
#[derive(Debug, Default)]
pub struct ExtractStats {
    pub sessions_seen: usize,
    pub prompts_seen: usize,
    pub pairs_emitted: usize,
    pub skipped_short_response: usize,
    pub skipped_reused_response: usize,
    pub skipped_duplicate_pair: usize,
}

/// Deduplication state shared across sessions (and, in append mode, across
/// runs).
///
/// `seen_keys` holds (normalized history, lowercased response) keys of emitted
/// pairs; `used_responses` holds the exact response lines already consumed, so
/// one responder message never answers two prompts.
#[derive(Debug, Default)]
pub struct DedupState {
    seen_keys: HashSet<(String, String)>,
    used_responses: HashSet<String>,
}

impl DedupState {
    pub fn new() -> Self {
        DedupState::default()
    }

    /// Rebuild dedup state from an existing dataset so an append run never
    /// re-emits pairs already on disk.
    pub fn from_pairs(pairs: &[TrainingPair], history_length: usize) -> Self {
        let mut state = DedupState::default();
        for pair in pairs {
            state.seen_keys.insert((
                normalize_history(&pair.history, history_length),
                pair.response.to_lowercase(),
            ));
            state.used_responses.insert(pair.response.clone());
        }
        state
    }

    pub fn len(&self) -> usize {
        self.seen_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen_keys.is_empty()
    }
}

/// Normalize a history window into its dedup form: trim and lowercase each of
/// the trailing `history_length` entries and join them with a single space.
pub fn normalize_history(history: &[String], history_length: usize) -> String {
    let start = history.len().saturating_sub(history_length);
    history[start..]
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Extract deduplicated pairs from a single session.
pub fn extract_from_session(
    session: &Session,
    config: &ExtractConfig,
    dedup: &mut DedupState,
    stats: &mut ExtractStats,
) -> Vec<TrainingPair> {
    stats.sessions_seen = stats.sessions_seen.saturating_add(1);

    let mut pairs: Vec<TrainingPair> = Vec::new();
    if session.messages.len() < 2 {
        return pairs;
    }

    let lines = session.formatted_lines();
    let prompter_prefix = format!("{}:", config.prompter);
    let responder_prefix = format!("{}:", config.responder);

    for i in 0..lines.len() - 1 {
        if !lines[i].starts_with(&prompter_prefix) {
            continue;
        }
        stats.prompts_seen = stats.prompts_seen.saturating_add(1);

        let window_end = (i + 1 + config.response_lookahead).min(lines.len());
        for j in (i + 1)..window_end {
            if !lines[j].starts_with(&responder_prefix) {
                continue;
            }

            // The threshold applies to the message content, not the formatted
            // line (the speaker prefix is not a word).
            if word_count(&session.messages[j].content) < config.min_response_words {
                stats.skipped_short_response = stats.skipped_short_response.saturating_add(1);
                continue;
            }

            let response = lines[j].trim().to_string();
            if dedup.used_responses.contains(&response) {
                stats.skipped_reused_response = stats.skipped_reused_response.saturating_add(1);
                continue;
            }

            let history_start = i.saturating_sub(config.history_length.saturating_sub(1));
            let history: Vec<String> = lines[history_start..j]
                .iter()
                .map(|line| line.trim().to_string())
                .collect();

            let key = (
                normalize_history(&history, config.history_length),
                response.to_lowercase(),
            );
            if dedup.seen_keys.contains(&key) {
                stats.skipped_duplicate_pair = stats.skipped_duplicate_pair.saturating_add(1);
            } else {
                dedup.seen_keys.insert(key);
                dedup.used_responses.insert(response.clone());
                pairs.push(TrainingPair { history, response });
                stats.pairs_emitted = stats.pairs_emitted.saturating_add(1);
            }
            break;
        }
    }

    pairs
}

/// Extract deduplicated pairs from all sessions, sharing one dedup state.
pub fn extract_pairs(
    sessions: &[Session],
    config: &ExtractConfig,
    dedup: &mut DedupState,
    stats: &mut ExtractStats,
) -> Vec<TrainingPair> {
    let mut pairs: Vec<TrainingPair> = Vec::new();
    for session in sessions {
        pairs.extend(extract_from_session(session, config, dedup, stats));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::{
        extract_from_session, extract_pairs, normalize_history, DedupState, ExtractConfig,
        ExtractStats,
    };
    use crate::model::ChatMessage;
    use crate::session::Session;

    fn msg(sender: &str, content: &str, timestamp: u64) -> ChatMessage {
        ChatMessage {
            sender: sender.to_string(),
            content: content.to_string(),
            timestamp,
        }
    }

    fn session(specs: &[(&str, &str)]) -> Session {
        Session {
            messages: specs
                .iter()
                .enumerate()
                .map(|(i, (sender, content))| msg(sender, content, 1000 + i as u64))
                .collect(),
        }
    }

    fn cfg() -> ExtractConfig {
        ExtractConfig::new("ana", "bruno")
    }

    #[test]
    fn basic_exchange_emits_pair_with_history() {
        let s = session(&[
            ("ana", "hello there"),
            ("ana", "are you around"),
            ("bruno", "yes I am"),
        ]);
        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut dedup, &mut stats);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].response, "bruno: yes I am");
        // History for the prompt at index 1 spans index 0..2.
        assert_eq!(
            pairs[0].history,
            vec![
                "ana: hello there".to_string(),
                "ana: are you around".to_string()
            ]
        );
        assert_eq!(stats.pairs_emitted, 1);
    }

    #[test]
    fn response_outside_lookahead_is_not_matched() {
        let mut specs = vec![("ana", "ping ping")];
        // Four non-responder lines push the response out of the default window.
        specs.extend([("carol", "x"); 4]);
        specs.push(("bruno", "too late reply"));
        let s = session(&specs);

        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut dedup, &mut stats);
        assert!(pairs.is_empty());
        assert_eq!(stats.prompts_seen, 1);
    }

    #[test]
    fn short_response_is_skipped_and_scan_continues() {
        let s = session(&[
            ("ana", "how was it"),
            ("bruno", "ok"),
            ("bruno", "it was actually great"),
        ]);
        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut dedup, &mut stats);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].response, "bruno: it was actually great");
        // The skipped short reply stays in the history window.
        assert!(pairs[0]
            .history
            .contains(&"bruno: ok".to_string()));
        assert_eq!(stats.skipped_short_response, 1);
    }

    #[test]
    fn first_acceptable_response_closes_the_window() {
        let s = session(&[
            ("ana", "tell me something"),
            ("bruno", "first real answer"),
            ("bruno", "second real answer"),
        ]);
        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut dedup, &mut stats);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].response, "bruno: first real answer");
    }

    #[test]
    fn used_response_is_not_reused_for_a_later_prompt() {
        let s = session(&[
            ("ana", "question one"),
            ("ana", "question two"),
            ("bruno", "the only answer"),
        ]);
        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut dedup, &mut stats);

        // Both prompts see the same response; only the first consumes it.
        assert_eq!(pairs.len(), 1);
        assert_eq!(stats.prompts_seen, 2);
        assert_eq!(stats.skipped_reused_response, 1);
    }

    #[test]
    fn duplicate_key_is_dropped_across_sessions() {
        let one = session(&[("ana", "same prompt"), ("bruno", "same answer here")]);
        // Different timestamps, identical content: normalizes to the same key,
        // and the identical response line is also already used.
        let two = session(&[("ana", "same prompt"), ("bruno", "same answer here")]);

        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_pairs(&[one, two], &cfg(), &mut dedup, &mut stats);

        assert_eq!(pairs.len(), 1);
        assert_eq!(stats.skipped_reused_response, 1);
    }

    #[test]
    fn duplicate_key_with_fresh_response_is_counted_as_duplicate_pair() {
        // Case-varied response: a fresh verbatim string, but the normalized
        // key collides with the already-emitted pair.
        let one = session(&[("ana", "same prompt"), ("bruno", "Same Answer Here")]);
        let two = session(&[("ana", "same prompt"), ("bruno", "same answer here")]);

        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_pairs(&[one, two], &cfg(), &mut dedup, &mut stats);

        assert_eq!(pairs.len(), 1);
        assert_eq!(stats.skipped_duplicate_pair, 1);
    }

    #[test]
    fn history_is_clamped_at_session_start() {
        let s = session(&[("ana", "opening line"), ("bruno", "reply to opening")]);
        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut dedup, &mut stats);

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].history, vec!["ana: opening line".to_string()]);
    }

    #[test]
    fn sender_prefix_match_is_exact() {
        // "anabel" must not satisfy the "ana:" prefix.
        let s = session(&[("anabel", "not a prompt"), ("bruno", "no pair expected")]);
        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut dedup, &mut stats);
        assert!(pairs.is_empty());
        assert_eq!(stats.prompts_seen, 0);
    }

    #[test]
    fn third_party_messages_appear_in_history_but_never_answer() {
        let s = session(&[
            ("carol", "interjection from elsewhere"),
            ("ana", "what do you think"),
            ("carol", "not the responder"),
            ("bruno", "here is what I think"),
        ]);
        let mut dedup = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut dedup, &mut stats);

        assert_eq!(pairs.len(), 1);
        assert_eq!(
            pairs[0].history,
            vec![
                "carol: interjection from elsewhere".to_string(),
                "ana: what do you think".to_string(),
                "carol: not the responder".to_string(),
            ]
        );
    }

    #[test]
    fn normalize_uses_only_trailing_entries() {
        let history = vec![
            "ana: one".to_string(),
            "ana: two".to_string(),
            "ana: three".to_string(),
            "Bruno: FOUR  ".to_string(),
        ];
        assert_eq!(
            normalize_history(&history, 3),
            "ana: two ana: three bruno: four"
        );
        assert_eq!(normalize_history(&history, 10), normalize_history(&history, 4));
    }

    #[test]
    fn from_pairs_seeds_state_that_blocks_reemission() {
        let s = session(&[("ana", "same prompt"), ("bruno", "same answer here")]);
        let mut first_state = DedupState::new();
        let mut stats = ExtractStats::default();
        let pairs = extract_from_session(&s, &cfg(), &mut first_state, &mut stats);
        assert_eq!(pairs.len(), 1);

        let mut seeded = DedupState::from_pairs(&pairs, cfg().history_length);
        assert_eq!(seeded.len(), 1);
        let mut stats2 = ExtractStats::default();
        let again = extract_from_session(&s, &cfg(), &mut seeded, &mut stats2);
        assert!(again.is_empty());
        assert_eq!(stats2.skipped_reused_response, 1);
    }

    #[test]
    fn validate_rejects_degenerate_configs() {
        assert!(ExtractConfig::new("", "bruno").validate().is_err());
        assert!(ExtractConfig::new("ana", "ana").validate().is_err());

        let mut zero_history = cfg();
        zero_history.history_length = 0;
        assert!(zero_history.validate().is_err());

        let mut zero_lookahead = cfg();
        zero_lookahead.response_lookahead = 0;
        assert!(zero_lookahead.validate().is_err());

        assert!(cfg().validate().is_ok());
    }
}
