// Timestamp as seconds since UNIX epoch (u64) to avoid external chrono crate.
// Timestamp parsing from export formats lives in the CLI; the library only
// compares and subtracts epoch seconds.
use serde::{Deserialize, Serialize};

/// A single message from a two-person chat export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
    pub timestamp: u64,
}

impl ChatMessage {
    /// Canonical line form used for history entries and responses:
    /// `"<sender>: <content>"`.
    pub fn formatted(&self) -> String {
        format!("{}: {}", self.sender, self.content)
    }
}
