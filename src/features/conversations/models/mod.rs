mod conversation;
mod message;
mod normalized_output;

pub use conversation::{sort_summaries, Conversation, ConversationSummary};
pub use message::{Message, MessageMetadata, MessageRole};
pub use normalized_output::NormalizedOutput;
