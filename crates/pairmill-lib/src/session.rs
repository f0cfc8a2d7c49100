//! Inactivity-gap segmentation of a chat message stream.
//!
//! A session is a run of messages where no two neighbours are separated by
//! more than the configured gap. Splitting happens on the raw stream before
//! any exchange extraction, so history windows never reach across a long
//! silence.

use serde::{Deserialize, Serialize};

use crate::model::ChatMessage;

/// Default inactivity gap: 10 minutes.
pub const DEFAULT_GAP_SECONDS: u64 = 600;

/// Configuration for session segmentation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Gap (seconds) that splits two neighbouring messages into separate
    /// sessions. A gap of exactly this value does NOT split; the difference
    /// must be strictly greater.
    pub gap_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            gap_seconds: DEFAULT_GAP_SECONDS,
        }
    }
}

/// A contiguous run of messages with no internal gap above the threshold.
#[derive(Debug, Clone)]
pub struct Session {
    pub messages: Vec<ChatMessage>,
}

impl Session {
    /// Formatted `"<sender>: <content>"` lines for this session, in order.
    pub fn formatted_lines(&self) -> Vec<String> {
        self.messages.iter().map(ChatMessage::formatted).collect()
    }
}

/// Counters reported in the run summary after segmentation.
#[derive(Debug, Default)]
pub struct SessionStats {
    pub messages_seen: usize,
    pub sessions_emitted: usize,
    pub splits_on_gap: usize,
    pub largest_session: usize,
}

/// Split a timestamp-ascending message slice into sessions.
///
/// The input must already be sorted by `timestamp` ascending; the CLI sorts
/// after ingestion. Out-of-order timestamps are treated as a zero gap via
/// saturating subtraction. Every message lands in exactly one session and the
/// trailing session is emitted even without a terminating gap.
pub fn split_into_sessions(
    messages: &[ChatMessage],
    config: &SessionConfig,
    stats: &mut SessionStats,
) -> Vec<Session> {
    let mut sessions: Vec<Session> = Vec::new();
    let mut current: Vec<ChatMessage> = Vec::new();

    let mut prev_ts = match messages.first() {
        Some(first) => first.timestamp,
        None => return sessions,
    };

    for msg in messages {
        stats.messages_seen = stats.messages_seen.saturating_add(1);
        if msg.timestamp.saturating_sub(prev_ts) > config.gap_seconds && !current.is_empty() {
            stats.splits_on_gap = stats.splits_on_gap.saturating_add(1);
            sessions.push(Session {
                messages: std::mem::take(&mut current),
            });
        }
        current.push(msg.clone());
        prev_ts = msg.timestamp;
    }

    if !current.is_empty() {
        sessions.push(Session { messages: current });
    }

    stats.sessions_emitted = sessions.len();
    stats.largest_session = sessions.iter().map(|s| s.messages.len()).max().unwrap_or(0);

    sessions
}
