use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Message, MessageRole};
use crate::shared::constants::AUTO_NAME_QUERY_CHARS;

/// A named, append-only conversation owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub total_tokens: i64,
    #[serde(default)]
    pub total_cost: Decimal,
}

/// Listing view of a conversation, without message bodies
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: i64,
    pub total_tokens: i64,
    pub total_cost: Decimal,
}

impl Conversation {
    /// New empty conversation. A missing or blank name falls back to one
    /// derived from the creation time.
    pub fn new(user_id: impl Into<String>, name: Option<&str>) -> Self {
        let now = Utc::now();
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(String::from)
            .unwrap_or_else(|| Self::default_name(now));

        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            total_tokens: 0,
            total_cost: Decimal::ZERO,
        }
    }

    pub fn default_name(at: DateTime<Utc>) -> String {
        format!("Chat - {}", at.format("%Y-%m-%d %H:%M"))
    }

    /// Name for a conversation opened implicitly by its first query
    pub fn name_from_query(query: &str) -> String {
        let query = query.trim();
        let prefix: String = query.chars().take(AUTO_NAME_QUERY_CHARS).collect();
        if query.chars().count() > AUTO_NAME_QUERY_CHARS {
            format!("Chat - {}...", prefix)
        } else {
            format!("Chat - {}", prefix)
        }
    }

    /// Append one turn's messages, folding assistant usage into the totals
    pub fn apply_append(&mut self, messages: Vec<Message>) {
        for message in messages {
            if let Some(meta) = &message.metadata {
                self.total_tokens += meta.tokens;
                self.total_cost += meta.cost;
            }
            self.messages.push(message);
        }
        self.updated_at = Utc::now();
    }

    pub fn rename(&mut self, name: &str) {
        self.name = name.trim().to_string();
        self.updated_at = Utc::now();
    }

    pub fn latest_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
    }

    pub fn message_count(&self) -> i64 {
        self.messages.len() as i64
    }
}

/// Most recently updated first, newest creation breaking ties
pub fn sort_summaries(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}
