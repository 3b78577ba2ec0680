use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::NormalizedOutput;
use crate::shared::constants::ASSISTANT_CONTENT_MAX_CHARS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("Unknown message role: {}", other)),
        }
    }
}

/// Usage and full reply attached to assistant messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub tokens: i64,
    pub cost: Decimal,
    pub full_response: NormalizedOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    /// Assistant message for a normalized reply. Stored content is the
    /// truncated answer; the full reply is kept in metadata.
    pub fn assistant(output: NormalizedOutput, tokens: i64, cost: Decimal) -> Self {
        let content = output
            .answer
            .chars()
            .take(ASSISTANT_CONTENT_MAX_CHARS)
            .collect();

        Self {
            role: MessageRole::Assistant,
            content,
            timestamp: Utc::now(),
            metadata: Some(MessageMetadata {
                tokens,
                cost,
                full_response: output,
            }),
        }
    }
}
