//! Conversation persistence.
//!
//! The orchestrator never writes; the [`Gateway`](crate::gateway::Gateway)
//! loads a snapshot before a turn and appends the turn's delta afterwards
//! through a [`ConversationStore`].
//!
//! | Store | Backing |
//! |-------|---------|
//! | [`MemoryStore`] | Process memory, lost on exit |
//! | [`JsonFileStore`] | One JSON document per conversation in a directory |

pub mod file;
pub mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use crate::conversation::{Conversation, ConversationId, ConversationOverview, Message};
use futures::future::BoxFuture;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("conversation {0} not found")]
    NotFound(ConversationId),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored conversation is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable record of conversations and their messages.
///
/// `append_messages` must keep the given order and bump `updated_at`.
pub trait ConversationStore: Send + Sync {
    fn create_conversation<'a>(
        &'a self,
        owner: &'a str,
        title: &'a str,
    ) -> BoxFuture<'a, Result<Conversation, StoreError>>;

    fn load_conversation(&self, id: ConversationId)
    -> BoxFuture<'_, Result<Conversation, StoreError>>;

    fn append_messages(
        &self,
        id: ConversationId,
        messages: Vec<Message>,
    ) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Conversations owned by `owner`, most recently updated first.
    fn list_conversations<'a>(
        &'a self,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ConversationOverview>, StoreError>>;

    fn delete_conversation(&self, id: ConversationId) -> BoxFuture<'_, Result<(), StoreError>>;
}

impl<T: ConversationStore + ?Sized> ConversationStore for std::sync::Arc<T> {
    fn create_conversation<'a>(
        &'a self,
        owner: &'a str,
        title: &'a str,
    ) -> BoxFuture<'a, Result<Conversation, StoreError>> {
        (**self).create_conversation(owner, title)
    }

    fn load_conversation(
        &self,
        id: ConversationId,
    ) -> BoxFuture<'_, Result<Conversation, StoreError>> {
        (**self).load_conversation(id)
    }

    fn append_messages(
        &self,
        id: ConversationId,
        messages: Vec<Message>,
    ) -> BoxFuture<'_, Result<(), StoreError>> {
        (**self).append_messages(id, messages)
    }

    fn list_conversations<'a>(
        &'a self,
        owner: &'a str,
    ) -> BoxFuture<'a, Result<Vec<ConversationOverview>, StoreError>> {
        (**self).list_conversations(owner)
    }

    fn delete_conversation(&self, id: ConversationId) -> BoxFuture<'_, Result<(), StoreError>> {
        (**self).delete_conversation(id)
    }
}

/// Sort listing entries newest-update first.
pub(crate) fn sort_overviews(overviews: &mut [ConversationOverview]) {
    overviews.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
}
