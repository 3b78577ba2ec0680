use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::features::conversations::models::{
    Conversation, ConversationSummary, Message, MessageRole, NormalizedOutput,
};
use crate::features::conversations::services::usage_aggregator::decimal_to_f64;

/// Request DTO for creating a thread
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateThreadDto {
    /// Optional display name; defaults to "Chat - YYYY-MM-DD HH:MM"
    #[validate(length(max = 200, message = "Thread name must not exceed 200 characters"))]
    pub thread_name: Option<String>,
}

/// Request DTO for renaming a thread
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RenameThreadDto {
    #[validate(length(min = 1, max = 200, message = "Thread name must be 1-200 characters"))]
    pub new_name: String,
}

/// Thread listing entry, without messages
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThreadSummaryDto {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
    pub total_tokens: i64,
    /// Accumulated cost in USD
    pub total_cost: f64,
}

/// Usage attached to an assistant message
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageMetadataDto {
    pub tokens: i64,
    pub cost: f64,
    pub full_response: NormalizedOutput,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MessageDto {
    pub role: MessageRole,
    /// Message text; assistant content is truncated, see `metadata.full_response`
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadataDto>,
}

/// Full thread with its ordered messages
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ThreadDetailDto {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    pub messages: Vec<MessageDto>,
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub total_tokens: i64,
    pub total_cost: f64,
}

impl From<ConversationSummary> for ThreadSummaryDto {
    fn from(s: ConversationSummary) -> Self {
        Self {
            id: s.id,
            name: s.name,
            created_at: s.created_at,
            updated_at: s.updated_at,
            message_count: s.message_count,
            total_tokens: s.total_tokens,
            total_cost: decimal_to_f64(s.total_cost),
        }
    }
}

impl From<Message> for MessageDto {
    fn from(m: Message) -> Self {
        Self {
            role: m.role,
            content: m.content,
            timestamp: m.timestamp,
            metadata: m.metadata.map(|meta| MessageMetadataDto {
                tokens: meta.tokens,
                cost: decimal_to_f64(meta.cost),
                full_response: meta.full_response,
            }),
        }
    }
}

impl From<Conversation> for ThreadDetailDto {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            message_count: c.message_count(),
            user_id: c.user_id,
            name: c.name,
            messages: c.messages.into_iter().map(MessageDto::from).collect(),
            created_at: c.created_at,
            updated_at: c.updated_at,
            total_tokens: c.total_tokens,
            total_cost: decimal_to_f64(c.total_cost),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_dto_validation() {
        assert!(RenameThreadDto {
            new_name: "RSI notes".to_string()
        }
        .validate()
        .is_ok());
        assert!(RenameThreadDto {
            new_name: String::new()
        }
        .validate()
        .is_err());
        assert!(RenameThreadDto {
            new_name: "x".repeat(201)
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_create_dto_name_is_optional() {
        let dto: CreateThreadDto = serde_json::from_str("{}").unwrap();
        assert!(dto.thread_name.is_none());
        assert!(dto.validate().is_ok());
    }

    #[test]
    fn test_detail_dto_counts_messages() {
        let mut conversation = Conversation::new("alice", Some("t"));
        conversation.apply_append(vec![Message::user("hi")]);

        let dto = ThreadDetailDto::from(conversation);

        assert_eq!(dto.message_count, 1);
        assert_eq!(dto.total_cost, 0.0);
        assert!(dto.messages[0].metadata.is_none());
    }
}
