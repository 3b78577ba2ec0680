pub mod azure_openai;
pub mod client;
pub mod models;

pub use azure_openai::AzureOpenAiAgent;
pub use client::{AgentClient, AgentError};
pub use models::{AgentOutput, AgentReply, UsageRecord};
