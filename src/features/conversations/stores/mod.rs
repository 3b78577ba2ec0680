//! Durable conversation storage.
//!
//! Every operation is scoped by the caller's user id: a conversation that
//! exists for another user is reported as not found.

mod file_store;
mod lock_arena;
mod postgres_store;

pub use file_store::FileThreadStore;
pub use lock_arena::LockArena;
pub use postgres_store::PostgresThreadStore;

use async_trait::async_trait;
use uuid::Uuid;

use super::models::{Conversation, ConversationSummary, Message};
use crate::core::error::{AppError, Result};

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Persist a conversation that does not exist yet, including any
    /// messages and totals it already carries
    async fn insert(&self, conversation: &Conversation) -> Result<()>;

    async fn get(&self, user_id: &str, conversation_id: Uuid) -> Result<Conversation>;

    /// Summaries for one user, most recently updated first
    async fn list(&self, user_id: &str) -> Result<Vec<ConversationSummary>>;

    /// Append one turn as a single write. Concurrent appends to the same
    /// conversation never lose messages or usage.
    async fn append_all(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        messages: Vec<Message>,
    ) -> Result<Conversation>;

    /// Replace the name and bump `updated_at`; messages and totals are untouched
    async fn rename(&self, user_id: &str, conversation_id: Uuid, name: &str)
        -> Result<Conversation>;

    async fn delete(&self, user_id: &str, conversation_id: Uuid) -> Result<()>;

    async fn create(&self, user_id: &str, name: Option<&str>) -> Result<Conversation> {
        let conversation = Conversation::new(user_id, name);
        self.insert(&conversation).await?;
        Ok(conversation)
    }

    async fn append(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        message: Message,
    ) -> Result<Conversation> {
        self.append_all(user_id, conversation_id, vec![message])
            .await
    }
}

pub(crate) fn not_found(conversation_id: Uuid) -> AppError {
    AppError::NotFound(format!("Conversation {} not found", conversation_id))
}
