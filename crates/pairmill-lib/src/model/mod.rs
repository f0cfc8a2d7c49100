pub mod chat_message;
pub mod training_pair;

pub use chat_message::ChatMessage;
pub use training_pair::TrainingPair;
