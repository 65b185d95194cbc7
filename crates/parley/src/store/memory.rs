//! In-process conversation store.

use super::{ConversationStore, StoreError, sort_overviews};
use crate::conversation::{Conversation, ConversationId, ConversationOverview, Message};
use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Conversations held in a map behind an async lock. Ids start at 1.
#[derive(Debug)]
pub struct MemoryStore {
    conversations: RwLock<HashMap<ConversationId, Conversation>>,
    next_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            conversations: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl ConversationStore for MemoryStore {
    fn create_conversation<'a>(
        &'a self,
        owner: &'a str,
        title: &'a str,
    ) -> BoxFuture<'a, Result<Conversation, StoreError>> {
        Box::pin(async move {
            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            let conversation = Conversation::new(id, owner, title);
            self.conversations
                .write()
                .await
                .insert(id, conversation.clone());
            Ok(conversation)
        })
    }

    fn load_conversation(
        &self,
        id: ConversationId,
    ) -> BoxFuture<'_, Result<Conversation, StoreError>> {
        Box::pin(async move {
            self.conversations
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(StoreError::NotFound(id))
        })
    }

    fn append_messages(
        &self,
        id: ConversationId,
        messages: Vec<Message>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            let mut conversations = self.conversations.write().await;
            let conversation = conversations.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            conversation.messages.extend(messages);
            conversation.updated_at = Utc::now();
            Ok(())
        })
    }

    fn list_conversations<'a>(
        &'a self,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ConversationOverview>, StoreError>> {
        Box::pin(async move {
            let mut overviews: Vec<ConversationOverview> = self
                .conversations
                .read()
                .await
                .values()
                .filter(|c| c.owner == owner)
                .map(Conversation::overview)
                .collect();
            sort_overviews(&mut overviews);
            Ok(overviews)
        })
    }

    fn delete_conversation(&self, id: ConversationId) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            self.conversations
                .write()
                .await
                .remove(&id)
                .map(|_| ())
                .ok_or(StoreError::NotFound(id))
        })
    }
}
