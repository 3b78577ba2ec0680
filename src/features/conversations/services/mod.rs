pub mod context_assembler;
pub mod conversation_service;
pub mod response_normalizer;
pub mod usage_aggregator;

pub use conversation_service::ConversationService;
