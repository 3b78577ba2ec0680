use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::context_assembler::build_context;
use super::response_normalizer::normalize;
use super::usage_aggregator::aggregate;
use crate::core::config::PricingConfig;
use crate::core::error::{AppError, Result};
use crate::features::agent::AgentClient;
use crate::features::conversations::models::{
    Conversation, ConversationSummary, Message, NormalizedOutput,
};
use crate::features::conversations::stores::ThreadStore;

/// Thread operations and the chat turn pipeline
pub struct ConversationService {
    store: Arc<dyn ThreadStore>,
    agent: Arc<dyn AgentClient>,
    pricing: PricingConfig,
    agent_timeout: Duration,
}

impl ConversationService {
    pub fn new(
        store: Arc<dyn ThreadStore>,
        agent: Arc<dyn AgentClient>,
        pricing: PricingConfig,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            store,
            agent,
            pricing,
            agent_timeout,
        }
    }

    pub async fn create_thread(&self, user_id: &str, name: Option<&str>) -> Result<Conversation> {
        let conversation = self.store.create(user_id, name).await?;
        tracing::info!(
            "Created conversation {} ({}) for user {}",
            conversation.id,
            conversation.name,
            user_id
        );
        Ok(conversation)
    }

    pub async fn list_threads(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        self.store.list(user_id).await
    }

    pub async fn get_thread(&self, user_id: &str, conversation_id: Uuid) -> Result<Conversation> {
        self.store.get(user_id, conversation_id).await
    }

    pub async fn rename_thread(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        new_name: &str,
    ) -> Result<Conversation> {
        if new_name.trim().is_empty() {
            return Err(AppError::Validation(
                "Thread name must not be empty".to_string(),
            ));
        }
        self.store.rename(user_id, conversation_id, new_name).await
    }

    pub async fn delete_thread(&self, user_id: &str, conversation_id: Uuid) -> Result<()> {
        self.store.delete(user_id, conversation_id).await?;
        tracing::info!("Deleted conversation {} for user {}", conversation_id, user_id);
        Ok(())
    }

    /// Run one chat turn.
    ///
    /// Without an id a new conversation is prepared in memory and only stored
    /// once the agent has answered; a failed turn leaves no trace.
    pub async fn chat(
        &self,
        user_id: &str,
        query: &str,
        conversation_id: Option<Uuid>,
    ) -> Result<NormalizedOutput> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Query must not be empty".to_string()));
        }

        let (conversation, is_new) = match conversation_id {
            Some(id) => (self.store.get(user_id, id).await?, false),
            None => {
                let name = Conversation::name_from_query(query);
                (Conversation::new(user_id, Some(&name)), true)
            }
        };
        tracing::debug!(
            "Resolved conversation {} (new: {}, {} messages)",
            conversation.id,
            is_new,
            conversation.messages.len()
        );

        let context = build_context(&conversation);
        tracing::debug!("Context for {}: {}", conversation.id, context);

        let reply = match tokio::time::timeout(self.agent_timeout, self.agent.invoke(query, &context))
            .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                let err = AppError::from(e);
                tracing::error!(
                    "Agent call failed for {} (retryable: {}): {}",
                    conversation.id,
                    err.is_retryable(),
                    err
                );
                return Err(err);
            }
            Err(_) => {
                return Err(AppError::UpstreamUnavailable(format!(
                    "Agent did not respond within {}s",
                    self.agent_timeout.as_secs_f32()
                )));
            }
        };

        let usage = aggregate(&reply.usage, &self.pricing);
        let mut output = normalize(&reply.output, query, conversation.id);
        output.tokens_used = usage.tokens;
        output.cost = usage.cost_f64();
        tracing::debug!(
            "Turn usage for {}: {} tokens, cost {}",
            conversation.id,
            usage.tokens,
            usage.cost
        );

        let turn = vec![
            Message::user(query),
            Message::assistant(output.clone(), usage.tokens, usage.cost),
        ];

        if is_new {
            let mut conversation = conversation;
            conversation.apply_append(turn);
            self.store.insert(&conversation).await?;
        } else {
            self.store
                .append_all(user_id, conversation.id, turn)
                .await?;
        }

        tracing::info!(
            "Chat turn stored in conversation {} for user {}",
            output.conversation_id,
            user_id
        );

        Ok(output)
    }
}
