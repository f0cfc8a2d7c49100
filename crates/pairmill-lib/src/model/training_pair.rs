use serde::{Deserialize, Serialize};

/// One supervised example: the conversation leading up to a response, and the
/// response itself.
///
/// `history` holds formatted `"<sender>: <content>"` lines (the responder's
/// earlier messages included); `response` is a single formatted line from the
/// responder. This struct serializes 1:1 into the dataset file entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingPair {
    pub history: Vec<String>,
    pub response: String,
}
