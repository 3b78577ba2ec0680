use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{not_found, LockArena, ThreadStore};
use crate::core::error::{AppError, Result};
use crate::features::conversations::models::{
    sort_summaries, Conversation, ConversationSummary, Message,
};

/// One JSON document per conversation under `<root>/<user_id>/<id>.json`.
///
/// Records are written to a temporary sibling and renamed into place, so
/// readers never observe a partial write and take no lock.
pub struct FileThreadStore {
    root: PathBuf,
    locks: LockArena,
}

/// Listing view of a stored record; message bodies are skipped, only counted
#[derive(Deserialize)]
struct RecordHeader {
    id: Uuid,
    user_id: String,
    name: String,
    #[serde(default)]
    messages: Vec<IgnoredAny>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    total_tokens: i64,
    #[serde(default)]
    total_cost: Decimal,
}

impl From<RecordHeader> for ConversationSummary {
    fn from(header: RecordHeader) -> Self {
        Self {
            id: header.id,
            name: header.name,
            created_at: header.created_at,
            updated_at: header.updated_at,
            message_count: header.messages.len() as i64,
            total_tokens: header.total_tokens,
            total_cost: header.total_cost,
        }
    }
}

#[derive(Deserialize)]
struct RecordOwner {
    user_id: String,
}

impl FileThreadStore {
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create storage directory {}: {}",
                root.display(),
                e
            ))
        })?;

        tracing::info!("File thread store at {}", root.display());

        Ok(Self {
            root,
            locks: LockArena::new(),
        })
    }

    fn user_dir(&self, user_id: &str) -> PathBuf {
        self.root.join(user_id)
    }

    fn record_path(&self, user_id: &str, conversation_id: Uuid) -> PathBuf {
        self.user_dir(user_id)
            .join(format!("{}.json", conversation_id))
    }

    async fn read_raw(path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path).await {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        let Some(raw) = Self::read_raw(path).await? else {
            return Ok(None);
        };

        serde_json::from_slice(&raw).map(Some).map_err(|e| {
            AppError::Storage(format!("Corrupt conversation record {}: {}", path.display(), e))
        })
    }

    async fn load(&self, user_id: &str, conversation_id: Uuid) -> Result<Conversation> {
        let path = self.record_path(user_id, conversation_id);
        match Self::read_record::<Conversation>(&path).await? {
            Some(conversation) if conversation.user_id == user_id => Ok(conversation),
            _ => Err(not_found(conversation_id)),
        }
    }

    async fn write_record(&self, conversation: &Conversation) -> Result<()> {
        let dir = self.user_dir(&conversation.user_id);
        fs::create_dir_all(&dir).await?;

        let path = self.record_path(&conversation.user_id, conversation.id);
        let tmp = dir.join(format!(
            ".{}.{}.tmp",
            conversation.id,
            Uuid::new_v4().simple()
        ));

        let body = serde_json::to_vec_pretty(conversation)
            .map_err(|e| AppError::Storage(format!("Failed to encode conversation: {}", e)))?;

        // Durable before it becomes visible under the record name
        let mut file = fs::File::create(&tmp).await?;
        let written = async {
            file.write_all(&body).await?;
            file.sync_all().await
        }
        .await;
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        Ok(())
    }
}

#[async_trait]
impl ThreadStore for FileThreadStore {
    async fn insert(&self, conversation: &Conversation) -> Result<()> {
        let _guard = self.locks.acquire(conversation.id).await;

        let path = self.record_path(&conversation.user_id, conversation.id);
        if fs::try_exists(&path).await? {
            return Err(AppError::Storage(format!(
                "Conversation {} already exists",
                conversation.id
            )));
        }

        self.write_record(conversation).await?;
        tracing::debug!(
            "Stored conversation {} for user {}",
            conversation.id,
            conversation.user_id
        );
        Ok(())
    }

    async fn get(&self, user_id: &str, conversation_id: Uuid) -> Result<Conversation> {
        self.load(user_id, conversation_id).await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<ConversationSummary>> {
        let mut entries = match fs::read_dir(self.user_dir(user_id)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match Self::read_record::<RecordHeader>(&path).await {
                Ok(Some(header)) if header.user_id == user_id => summaries.push(header.into()),
                Ok(_) => {}
                Err(e) => tracing::warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        sort_summaries(&mut summaries);
        Ok(summaries)
    }

    async fn append_all(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        messages: Vec<Message>,
    ) -> Result<Conversation> {
        let _guard = self.locks.acquire(conversation_id).await;

        // Re-read under the lock; a delete that won the race surfaces as NotFound
        let mut conversation = self.load(user_id, conversation_id).await?;
        conversation.apply_append(messages);
        self.write_record(&conversation).await?;

        Ok(conversation)
    }

    async fn rename(
        &self,
        user_id: &str,
        conversation_id: Uuid,
        name: &str,
    ) -> Result<Conversation> {
        let _guard = self.locks.acquire(conversation_id).await;

        let mut conversation = self.load(user_id, conversation_id).await?;
        conversation.rename(name);
        self.write_record(&conversation).await?;

        Ok(conversation)
    }

    async fn delete(&self, user_id: &str, conversation_id: Uuid) -> Result<()> {
        let _guard = self.locks.acquire(conversation_id).await;

        let path = self.record_path(user_id, conversation_id);
        let raw = Self::read_raw(&path)
            .await?
            .ok_or_else(|| not_found(conversation_id))?;

        // Unparseable records under the caller's directory are still removed
        match serde_json::from_slice::<RecordOwner>(&raw) {
            Ok(owner) if owner.user_id != user_id => return Err(not_found(conversation_id)),
            Ok(_) => {}
            Err(e) => tracing::warn!("Deleting unreadable record {}: {}", path.display(), e),
        }

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(conversation_id)),
            Err(e) => Err(e.into()),
        }
    }
}
