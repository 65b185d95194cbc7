//! Conversations as JSON documents on disk.
//!
//! Layout: one `conversation-<id>.json` per conversation in the store
//! directory. Every write goes to a hidden temp file first and is renamed
//! into place, so a crash never leaves a half-written document.

use super::{ConversationStore, StoreError, sort_overviews};
use crate::conversation::{Conversation, ConversationId, ConversationOverview, Message};
use chrono::Utc;
use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const FILE_PREFIX: &str = "conversation-";
const FILE_SUFFIX: &str = ".json";

#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    next_id: AtomicU64,
    /// Serializes read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`. New ids continue
    /// after the highest one already on disk.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let mut highest = 0;
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(id) = parse_file_name(&entry.file_name().to_string_lossy()) {
                highest = highest.max(id);
            }
        }
        debug!("Opened conversation store at {} (highest id {highest})", dir.display());
        Ok(Self {
            dir,
            next_id: AtomicU64::new(highest + 1),
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: ConversationId) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}{FILE_SUFFIX}"))
    }

    async fn read(&self, id: ConversationId) -> Result<Conversation, StoreError> {
        let json = match tokio::fs::read_to_string(self.path_for(id)).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    async fn write(&self, conversation: &Conversation) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(conversation)?;
        let tmp_path = self.dir.join(format!(".{FILE_PREFIX}{}{FILE_SUFFIX}.tmp", conversation.id));
        tokio::fs::write(&tmp_path, json).await?;
        tokio::fs::rename(&tmp_path, self.path_for(conversation.id)).await?;
        Ok(())
    }
}

fn parse_file_name(name: &str) -> Option<ConversationId> {
    name.strip_prefix(FILE_PREFIX)?
        .strip_suffix(FILE_SUFFIX)?
        .parse()
        .ok()
}

impl ConversationStore for JsonFileStore {
    fn create_conversation<'a>(
        &'a self,
        owner: &'a str,
        title: &'a str,
    ) -> BoxFuture<'a, Result<Conversation, StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let conversation = Conversation::new(id, owner, title);
            self.write(&conversation).await?;
            Ok(conversation)
        })
    }

    fn load_conversation(
        &self,
        id: ConversationId,
    ) -> BoxFuture<'_, Result<Conversation, StoreError>> {
        Box::pin(self.read(id))
    }

    fn append_messages(
        &self,
        id: ConversationId,
        messages: Vec<Message>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            let mut conversation = self.read(id).await?;
            conversation.messages.extend(messages);
            conversation.updated_at = Utc::now();
            self.write(&conversation).await
        })
    }

    fn list_conversations<'a>(
        &'a self,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ConversationOverview>, StoreError>> {
        Box::pin(async move {
            let mut overviews = Vec::new();
            let mut entries = tokio::fs::read_dir(&self.dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let Some(id) = parse_file_name(&entry.file_name().to_string_lossy()) else {
                    continue;
                };
                match self.read(id).await {
                    Ok(c) if c.owner == owner => overviews.push(c.overview()),
                    Ok(_) => {}
                    // Deleted between read_dir and read.
                    Err(StoreError::NotFound(_)) => {}
                    Err(e) => warn!("Skipping unreadable conversation {id}: {e}"),
                }
            }
            sort_overviews(&mut overviews);
            Ok(overviews)
        })
    }

    fn delete_conversation(&self, id: ConversationId) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let _guard = self.write_lock.lock().await;
            match tokio::fs::remove_file(self.path_for(id)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound(id)),
                Err(e) => Err(e.into()),
            }
        })
    }
}
