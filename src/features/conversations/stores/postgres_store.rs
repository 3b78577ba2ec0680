use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{not_found, ThreadStore};
use crate::core::error::{AppError, Result};
use crate::features::conversations::models::{
    Conversation, ConversationSummary, Message, MessageMetadata, NormalizedOutput,
};

/// Relational store: `conversations` holds the running totals,
/// `conversation_messages` the ordered turns. Appends lock the conversation
/// row so totals and messages move together.
pub struct PostgresThreadStore {
    pool: PgPool,
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    id: Uuid,
    user_id: String,
    name: String,
    total_tokens: i64,
    total_cost: Decimal,
    message_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct MessageRow {
    role: String,
    content: String,
    tokens: Option<i64>,
    cost: Option<Decimal>,
    full_response: Option<Json<NormalizedOutput>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for Message {
    type Error = AppError;

    fn try_from(row: MessageRow) -> Result<Self> {
        let role = row.role.parse().map_err(AppError::Storage)?;
        let metadata = match (row.tokens, row.cost, row.full_response) {
            (Some(tokens), Some(cost), Some(Json(full_response))) => Some(MessageMetadata {
                tokens,
                cost,
                full_response,
            }),
            _ => None,
        };

        Ok(Message {
            role,
            content: row.content,
            timestamp: row.created_at,
            metadata,
        })
    }
}

impl From<ConversationRow> for ConversationSummary {
    fn from(row: ConversationRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
            message_count: i64::from(row.message_count),
            total_tokens: row.total_tokens,
            total_cost: row.total_cost,
        }
    }
}

const SELECT_CONVERSATION: &str = r#"
    SELECT id, user_id, name, total_tokens, total_cost, message_count, created_at, updated_at
    FROM conversations
    WHERE id = $1 AND user_id = $2
"#;

const SELECT_CONVERSATION_FOR_UPDATE: &str = r#"
    SELECT id, user_id, name, total_tokens, total_cost, message_count, created_at, updated_at
    FROM conversations
    WHERE id = $1 AND user_id = $2
    FOR UPDATE
"#;

impl PostgresThreadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_messages(conn: &mut PgConnection, conversation_id: Uuid) -> Result<Vec<Message>> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT role, content, tokens, cost, full_response, created_at
            FROM conversation_messages
            WHERE conversation_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&mut *conn)
        .await?;

        rows.into_iter().map(Message::try_from).collect()
    }

    async fn insert_messages(
        tx: &mut Transaction<'_, Postgres>,
        conversation_id: Uuid,
        first_position: i32,
        messages: &[Message],
    ) -> Result<()> {
        for (offset, message) in messages.iter().enumerate() {
            let metadata = message.metadata.as_ref();
            sqlx::query(
                r#"
                INSERT INTO conversation_messages
                    (conversation_id, position, role, content, tokens, cost, full_response, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(conversation_id)
            .bind(first_position + offset as i32)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(metadata.map(|m| m.tokens))
            .bind(metadata.map(|m| m.cost))
            .bind(metadata.map(|m| Json(&m.full_response)))
            .bind(message.timestamp)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    fn assemble(row: ConversationRow, messages: Vec<Message>) -> Conversation {
        Conversation {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            messages,
            created_at: row.created_at,
            updated_at: row.updated_at,
            total_tokens: row.total_tokens,
            total_cost: row.total_cost,
        }
    }
}

#[async_trait]
impl ThreadStore for PostgresThreadStore {
    async fn insert(&self, conversation: &Conversation) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations
                (id, user_id, name, total_tokens, total_cost, message_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(conversation.id)
        .bind(&conversation.user_id)
        .bind(&conversation.name)
        .bind(conversation.total_tokens)
        .bind(conversation.total_cost)
        .bind(conversation.messages.len() as i32)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await?;

        Self::insert_messages(&mut tx, conversation.id, 0, &conversation.messages).await?;

        tx.commit().await?;

        tracing::debug!(
            "Stored conversation {} for user {}",
            conversation.id,
            conversation.user_id
        );
        Ok(())
    }

    async fn get(&self, user_id: &str, conversation_id: Uuid) -> Result<Conversation> {
        // Row and messages come from one snapshot so totals match the turns
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query_as::<_, ConversationRow>(SELECT_CONVERSATION)
            .bind(conversation_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found(conversation_id))?;

        let messages = Self::load_messages(&mut tx, conversation_id).await?;
        tx.commit().await?;

        Ok(Self::assemble(row, messages))
    }

    async fn list(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let rows = sqlx::query_as::<_, ConversationRow>(
            r#"
            SELECT id, user_id, name, total_tokens, total_cost, message_count, created_at, updated_at
            FROM conversations
            WHERE user_id = $1
            ORDER BY updated_at DESC, created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ConversationSummary::from).collect())
    }

    async fn append_all(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        messages: Vec<Message>,
    ) -> Result<Conversation> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, ConversationRow>(SELECT_CONVERSATION_FOR_UPDATE)
            .bind(conversation_id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| not_found(conversation_id))?;

        Self::insert_messages(&mut tx, conversation_id, current.message_count, &messages).await?;

        let (tokens, cost) = messages
            .iter()
            .filter_map(|m| m.metadata.as_ref())
            .fold((0i64, Decimal::ZERO), |(t, c), meta| (t + meta.tokens, c + meta.cost));

        let row = sqlx::query_as::<_, ConversationRow>(
            r#"
            UPDATE conversations
            SET total_tokens = total_tokens + $2,
                total_cost = total_cost + $3,
                message_count = message_count + $4,
                updated_at = $5
            WHERE id = $1
            RETURNING id, user_id, name, total_tokens, total_cost, message_count, created_at, updated_at
            "#,
        )
        .bind(conversation_id)
        .bind(tokens)
        .bind(cost)
        .bind(messages.len() as i32)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let stored = Self::load_messages(&mut tx, conversation_id).await?;
        tx.commit().await?;

        Ok(Self::assemble(row, stored))
    }

    async fn rename(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        name: &str,
    ) -> Result<Conversation> {
        let result = sqlx::query(
            r#"
            UPDATE conversations
            SET name = $3, updated_at = $4
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(name.trim())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(conversation_id));
        }

        self.get(user_id, conversation_id).await
    }

    async fn delete(&self, user_id: &str, conversation_id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1 AND user_id = $2")
            .bind(conversation_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(conversation_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::conversations::models::MessageRole;

    fn reply() -> NormalizedOutput {
        NormalizedOutput {
            answer: "Use a 14-period RSI.".to_string(),
            chatsummary: "User asked: RSI. Provided explanation.".to_string(),
            whatsapp_summary: "*RSI*".to_string(),
            conversation_id: Uuid::new_v4(),
            tokens_used: 42,
            cost: 0.0004,
        }
    }

    fn row(role: &str, with_metadata: bool) -> MessageRow {
        MessageRow {
            role: role.to_string(),
            content: "content".to_string(),
            tokens: with_metadata.then_some(42),
            cost: with_metadata.then_some(Decimal::new(4, 4)),
            full_response: with_metadata.then(|| Json(reply())),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_message_row_with_metadata() {
        let message = Message::try_from(row("assistant", true)).unwrap();

        assert_eq!(message.role, MessageRole::Assistant);
        let meta = message.metadata.unwrap();
        assert_eq!(meta.tokens, 42);
        assert_eq!(meta.full_response.answer, "Use a 14-period RSI.");
    }

    #[test]
    fn test_message_row_without_metadata() {
        let message = Message::try_from(row("user", false)).unwrap();

        assert_eq!(message.role, MessageRole::User);
        assert!(message.metadata.is_none());
    }

    fn assistant(conversation_id: Uuid, tokens: i64) -> Message {
        let output = NormalizedOutput {
            conversation_id,
            tokens_used: tokens,
            ..reply()
        };
        Message::assistant(output, tokens, Decimal::new(tokens, 5))
    }

    // Database-backed tests run against DATABASE_URL with `cargo test -- --ignored`

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_append_totals_match_stored_turns(pool: PgPool) {
        let store = PostgresThreadStore::new(pool);
        let created = store.create("alice", Some("RSI")).await.unwrap();

        for tokens in [1500, 900] {
            store
                .append_all(
                    "alice",
                    created.id,
                    vec![Message::user("What is RSI?"), assistant(created.id, tokens)],
                )
                .await
                .unwrap();
        }

        let loaded = store.get("alice", created.id).await.unwrap();
        let assistant_tokens: i64 = loaded
            .messages
            .iter()
            .filter_map(|m| m.metadata.as_ref().map(|meta| meta.tokens))
            .sum();

        assert_eq!(loaded.messages.len(), 4);
        assert_eq!(loaded.total_tokens, 2400);
        assert_eq!(assistant_tokens, 2400);
        assert_eq!(loaded.total_cost, Decimal::new(2400, 5));
        let roles: Vec<_> = loaded.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![
                MessageRole::User,
                MessageRole::Assistant,
                MessageRole::User,
                MessageRole::Assistant
            ]
        );
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_concurrent_appends_keep_totals_consistent(pool: PgPool) {
        let store = std::sync::Arc::new(PostgresThreadStore::new(pool));
        let created = store.create("alice", None).await.unwrap();

        let mut tasks = Vec::new();
        for i in 0..8i64 {
            let store = std::sync::Arc::clone(&store);
            let id = created.id;
            tasks.push(tokio::spawn(async move {
                store
                    .append_all(
                        "alice",
                        id,
                        vec![Message::user(format!("q{}", i)), assistant(id, 100 + i)],
                    )
                    .await
                    .unwrap();
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let loaded = store.get("alice", created.id).await.unwrap();
        let expected: i64 = (0..8).map(|i| 100 + i).sum();

        assert_eq!(loaded.messages.len(), 16);
        assert_eq!(loaded.total_tokens, expected);
        for pair in loaded.messages.chunks(2) {
            assert_eq!(pair[0].role, MessageRole::User);
            assert_eq!(pair[1].role, MessageRole::Assistant);
        }
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_list_orders_by_most_recent_update(pool: PgPool) {
        let store = PostgresThreadStore::new(pool);
        let first = store.create("alice", Some("first")).await.unwrap();
        store.create("alice", Some("second")).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store
            .append("alice", first.id, Message::user("bump"))
            .await
            .unwrap();

        let summaries = store.list("alice").await.unwrap();
        let names: Vec<_> = summaries.iter().map(|s| s.name.as_str()).collect();

        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(summaries[0].message_count, 1);
    }

    #[sqlx::test]
    #[ignore = "requires DATABASE_URL"]
    async fn test_conversations_are_isolated_per_user(pool: PgPool) {
        let store = PostgresThreadStore::new(pool);
        let alice = store.create("alice", Some("mine")).await.unwrap();

        assert!(matches!(
            store.get("bob", alice.id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(store.list("bob").await.unwrap().is_empty());
        assert!(matches!(
            store.rename("bob", alice.id, "stolen").await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.append("bob", alice.id, Message::user("hi")).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("bob", alice.id).await,
            Err(AppError::NotFound(_))
        ));

        let loaded = store.get("alice", alice.id).await.unwrap();
        assert_eq!(loaded.name, "mine");
        assert!(loaded.messages.is_empty());

        store.delete("alice", alice.id).await.unwrap();
        assert!(matches!(
            store.get("alice", alice.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_message_row_unknown_role() {
        assert!(matches!(
            Message::try_from(row("system", false)),
            Err(AppError::Storage(_))
        ));
    }
}
