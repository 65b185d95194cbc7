//! Caller-facing turn API.
//!
//! [`Gateway`] owns the long-lived collaborators (LLM backend, conversation
//! store, provider session, configuration) and runs one
//! [`Orchestrator`] turn per call. It is the only component that writes to the
//! store: the snapshot is loaded before the turn and the delta is appended
//! after it, so a turn that is dropped midway persists nothing.
//!
//! Turns on the same conversation are serialized; turns on different
//! conversations run concurrently.

use crate::agent::{
    EventHandler, NoopHandler, Orchestrator, OrchestratorConfig, TurnError, TurnStatus,
    generate_title,
};
use crate::api::ChatBackend;
use crate::conversation::{Conversation, ConversationId, ConversationOverview, Message};
use crate::store::{ConversationStore, StoreError};
use crate::tools::session::ProviderSession;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("message text is empty")]
    EmptyMessage,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("turn failed in conversation {conversation_id}: {source}")]
    Turn {
        conversation_id: ConversationId,
        #[source]
        source: TurnError,
    },
}

/// What a caller gets back from a completed turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReply {
    pub conversation_id: ConversationId,
    pub turn_id: String,
    pub answer: String,
    /// The messages persisted for this turn, user message first. A summary
    /// stored alongside them is not included.
    pub appended_messages: Vec<Message>,
    pub status: TurnStatus,
    pub rounds_used: u32,
}

type ConversationLock = Arc<tokio::sync::Mutex<()>>;

/// A handle on one conversation's turn lock. Dropping the last handle removes
/// the map entry, so ids that are never reused leave nothing behind.
struct LockHandle<'g> {
    locks: &'g Mutex<HashMap<ConversationId, ConversationLock>>,
    id: ConversationId,
    lock: ConversationLock,
}

impl Drop for LockHandle<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map entry and this handle.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.id);
        }
    }
}

pub struct Gateway {
    backend: Arc<dyn ChatBackend>,
    store: Arc<dyn ConversationStore>,
    session: Arc<ProviderSession>,
    config: OrchestratorConfig,
    event_handler: Arc<dyn EventHandler>,
    locks: Mutex<HashMap<ConversationId, ConversationLock>>,
}

impl Gateway {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        store: Arc<dyn ConversationStore>,
        session: Arc<ProviderSession>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            store,
            session,
            config,
            event_handler: Arc::new(NoopHandler),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<ProviderSession> {
        &self.session
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    fn conversation_lock(&self, id: ConversationId) -> LockHandle<'_> {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone();
        LockHandle {
            locks: &self.locks,
            id,
            lock,
        }
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Create a conversation titled after `first_message`, then run the first
    /// turn in it.
    ///
    /// The conversation exists even when the turn fails; its id is carried
    /// by [`GatewayError::Turn`].
    pub async fn start_conversation(
        &self,
        owner: &str,
        first_message: &str,
    ) -> Result<(ConversationOverview, TurnReply), GatewayError> {
        if first_message.trim().is_empty() {
            return Err(GatewayError::EmptyMessage);
        }
        let title = generate_title(&*self.backend, &self.config.model, first_message).await;
        let conversation = self.store.create_conversation(owner, &title).await?;
        info!(
            "Created conversation {} for {owner}: \"{title}\"",
            conversation.id
        );
        let reply = self.turn(conversation.id, first_message).await?;
        let overview = self.store.load_conversation(conversation.id).await?.overview();
        Ok((overview, reply))
    }

    /// Run one turn in an existing conversation and persist its messages.
    pub async fn turn(
        &self,
        conversation_id: ConversationId,
        user_text: &str,
    ) -> Result<TurnReply, GatewayError> {
        self.run_turn(conversation_id, user_text, None::<fn() -> bool>)
            .await
    }

    /// Like [`turn`](Self::turn), cancelling between rounds once `stop`
    /// returns `true`.
    pub async fn turn_until(
        &self,
        conversation_id: ConversationId,
        user_text: &str,
        stop: impl Fn() -> bool + Send + Sync,
    ) -> Result<TurnReply, GatewayError> {
        self.run_turn(conversation_id, user_text, Some(stop)).await
    }

    async fn run_turn(
        &self,
        conversation_id: ConversationId,
        user_text: &str,
        stop: Option<impl Fn() -> bool + Send + Sync>,
    ) -> Result<TurnReply, GatewayError> {
        if user_text.trim().is_empty() {
            return Err(GatewayError::EmptyMessage);
        }
        let handle = self.conversation_lock(conversation_id);
        let _guard = handle.lock.lock().await;

        let conversation = self.store.load_conversation(conversation_id).await?;
        let mut orchestrator = Orchestrator::new(&*self.backend, &self.session, &self.config)
            .with_event_handler(&*self.event_handler);
        if let Some(stop) = stop {
            orchestrator = orchestrator.with_stop_signal(stop);
        }

        match orchestrator.handle_turn(&conversation, user_text).await {
            Ok(outcome) => {
                self.persist(conversation_id, outcome.summary, outcome.appended_messages.clone())
                    .await?;
                Ok(TurnReply {
                    conversation_id,
                    turn_id: outcome.turn_id,
                    answer: outcome.answer,
                    appended_messages: outcome.appended_messages,
                    status: outcome.status,
                    rounds_used: outcome.rounds_used,
                })
            }
            Err(source) => {
                if !source.confirmed().is_empty() {
                    warn!(
                        "Turn in conversation {conversation_id} aborted, keeping {} confirmed message(s)",
                        source.confirmed().len()
                    );
                    self.persist(
                        conversation_id,
                        source.summary().cloned(),
                        source.confirmed().to_vec(),
                    )
                    .await?;
                }
                Err(GatewayError::Turn {
                    conversation_id,
                    source,
                })
            }
        }
    }

    /// Append the summary (if any) ahead of the delta in one write.
    async fn persist(
        &self,
        conversation_id: ConversationId,
        summary: Option<Message>,
        delta: Vec<Message>,
    ) -> Result<(), StoreError> {
        let messages: Vec<Message> = summary.into_iter().chain(delta).collect();
        self.store.append_messages(conversation_id, messages).await
    }

    pub async fn list_conversations(
        &self,
        owner: &str,
    ) -> Result<Vec<ConversationOverview>, GatewayError> {
        Ok(self.store.list_conversations(owner).await?)
    }

    pub async fn conversation(&self, id: ConversationId) -> Result<Conversation, GatewayError> {
        Ok(self.store.load_conversation(id).await?)
    }

    pub async fn delete_conversation(&self, id: ConversationId) -> Result<(), GatewayError> {
        let handle = self.conversation_lock(id);
        let _guard = handle.lock.lock().await;
        self.store.delete_conversation(id).await?;
        info!("Deleted conversation {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::check_ordering;
    use crate::agent::testing::ScriptedBackend;
    use crate::api::RetryConfig;
    use crate::conversation::MessageRole;
    use crate::store::MemoryStore;
    use crate::tools::local::{FnTool, LocalProvider};
    use crate::tools::registry::ToolDescriptor;

    async fn weather_session() -> Arc<ProviderSession> {
        let provider = LocalProvider::new().with(FnTool::new(
            ToolDescriptor::new(
                "get_weather",
                "Current weather for a city",
                serde_json::json!({
                    "type": "object",
                    "properties": {"location": {"type": "string"}},
                    "required": ["location"]
                }),
            ),
            |args: serde_json::Value| async move {
                Ok(format!("34C and clear in {}", args["location"].as_str().unwrap_or("?")))
            },
        ));
        let session = Arc::new(ProviderSession::new());
        session.connect(Arc::new(provider)).await.unwrap();
        session
    }

    async fn gateway(backend: Arc<ScriptedBackend>) -> (Gateway, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let config = OrchestratorConfig {
            retry: RetryConfig::disabled(),
            ..OrchestratorConfig::new("test-model")
        };
        let gateway = Gateway::new(backend, store.clone(), weather_session().await, config);
        (gateway, store)
    }

    #[tokio::test]
    async fn first_message_creates_titled_conversation() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_title_reply(Ok("\"Friendly Greeting\"".into()))
                .then_text("Hi there!"),
        );
        let (gateway, store) = gateway(backend).await;

        let (overview, reply) = gateway.start_conversation("ana", "Hello").await.unwrap();
        assert_eq!(overview.title, "Friendly Greeting");
        assert_eq!(overview.message_count, 2);
        assert_eq!(reply.answer, "Hi there!");

        let stored = store.load_conversation(overview.id).await.unwrap();
        assert_eq!(stored.messages, reply.appended_messages);
    }

    #[tokio::test]
    async fn weather_turn_persists_four_messages() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .then_tools(&[("call_1", "get_weather", r#"{"location":"Delhi"}"#)])
                .then_text("It's 34C and clear in Delhi."),
        );
        let (gateway, store) = gateway(backend).await;
        let conv = store.create_conversation("ana", "Weather").await.unwrap();

        let reply = gateway.turn(conv.id, "What's the weather in Delhi?").await.unwrap();
        assert_eq!(reply.status, TurnStatus::Completed);

        let stored = store.load_conversation(conv.id).await.unwrap();
        assert_eq!(stored.messages.len(), 4);
        assert_eq!(stored.messages[2].text(), "34C and clear in Delhi");
        check_ordering(&stored.messages).unwrap();
    }

    #[tokio::test]
    async fn failed_request_keeps_confirmed_rounds() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .then_tools(&[("c1", "get_weather", r#"{"location":"Pune"}"#)])
                .then_err("LLM API HTTP 400 Bad Request"),
        );
        let (gateway, store) = gateway(backend).await;
        let conv = store.create_conversation("ana", "Weather").await.unwrap();

        let err = gateway.turn(conv.id, "weather?").await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Turn {
                source: TurnError::RequestFailed { .. },
                ..
            }
        ));

        let stored = store.load_conversation(conv.id).await.unwrap();
        let roles: Vec<MessageRole> = stored.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![MessageRole::User, MessageRole::Assistant, MessageRole::Tool]
        );
        check_ordering(&stored.messages).unwrap();
    }

    #[tokio::test]
    async fn exhausted_turn_is_persisted_with_apology() {
        let mut script = ScriptedBackend::new();
        for i in 0..2 {
            let id = format!("c{i}");
            script = script.then_tools(&[(id.as_str(), "get_weather", r#"{"location":"Goa"}"#)]);
        }
        let backend = Arc::new(script);
        let store = Arc::new(MemoryStore::new());
        let config = OrchestratorConfig {
            retry: RetryConfig::disabled(),
            ..OrchestratorConfig::new("m").with_max_rounds(2)
        };
        let gateway = Gateway::new(backend, store.clone(), weather_session().await, config);
        let conv = store.create_conversation("ana", "Loop").await.unwrap();

        let reply = gateway.turn(conv.id, "loop").await.unwrap();
        assert_eq!(reply.status, TurnStatus::ExhaustedToolLoop);
        let stored = store.load_conversation(conv.id).await.unwrap();
        assert_eq!(stored.messages.len(), 1 + 2 * 2 + 1);
        assert_eq!(stored.messages.last().unwrap().text(), gateway.config().apology);
    }

    #[tokio::test]
    async fn summary_is_stored_ahead_of_the_turn() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .with_summary_reply(Ok("Earlier small talk.".into()))
                .then_text("answer"),
        );
        let (gateway, store) = gateway(backend.clone()).await;
        let conv = store.create_conversation("ana", "Long").await.unwrap();
        let history: Vec<Message> = (0..10)
            .flat_map(|i| [Message::user(format!("q{i}")), Message::assistant_text(format!("a{i}"))])
            .collect();
        store.append_messages(conv.id, history).await.unwrap();

        gateway.turn(conv.id, "one more").await.unwrap();
        assert_eq!(backend.summary_calls(), 1);

        let stored = store.load_conversation(conv.id).await.unwrap();
        assert_eq!(stored.messages.len(), 20 + 1 + 2);
        let summary = &stored.messages[20];
        assert!(summary.is_summary);
        assert_eq!(summary.summarized_through, Some(11));
        assert_eq!(stored.dialogue_len(), 22);
    }

    #[tokio::test]
    async fn stop_before_first_request_persists_the_user_message() {
        let backend = Arc::new(ScriptedBackend::new().then_text("unused"));
        let (gateway, store) = gateway(backend.clone()).await;
        let conv = store.create_conversation("ana", "Stop").await.unwrap();

        let err = gateway.turn_until(conv.id, "hi", || true).await.unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Turn {
                source: TurnError::Cancelled { .. },
                ..
            }
        ));
        assert_eq!(store.load_conversation(conv.id).await.unwrap().messages.len(), 1);
        assert_eq!(backend.remaining(), 1);
    }

    #[tokio::test]
    async fn same_conversation_turns_do_not_interleave() {
        let backend = Arc::new(
            ScriptedBackend::new()
                .then_tools(&[("a", "get_weather", r#"{"location":"Delhi"}"#)])
                .then_text("first")
                .then_tools(&[("b", "get_weather", r#"{"location":"Pune"}"#)])
                .then_text("second"),
        );
        let (gateway, store) = gateway(backend).await;
        let conv = store.create_conversation("ana", "Race").await.unwrap();

        let (one, two) = tokio::join!(gateway.turn(conv.id, "one"), gateway.turn(conv.id, "two"));
        one.unwrap();
        two.unwrap();

        let stored = store.load_conversation(conv.id).await.unwrap();
        assert_eq!(stored.messages.len(), 8);
        check_ordering(&stored.messages).unwrap();
    }

    #[tokio::test]
    async fn rejects_blank_text_and_unknown_conversations() {
        let backend = Arc::new(ScriptedBackend::new());
        let (gateway, _store) = gateway(backend).await;
        assert!(matches!(
            gateway.turn(1, "   ").await,
            Err(GatewayError::EmptyMessage)
        ));
        assert!(matches!(
            gateway.turn(99, "hi").await,
            Err(GatewayError::Store(StoreError::NotFound(99)))
        ));
        assert!(matches!(
            gateway.delete_conversation(99).await,
            Err(GatewayError::Store(StoreError::NotFound(99)))
        ));
    }

    #[tokio::test]
    async fn turn_locks_are_released_after_use() {
        let backend = Arc::new(ScriptedBackend::new().then_text("hi"));
        let (gateway, store) = gateway(backend).await;
        for id in 100..150 {
            assert!(gateway.turn(id, "hi").await.is_err());
        }
        assert_eq!(gateway.lock_entries(), 0);

        let conv = store.create_conversation("ana", "Locks").await.unwrap();
        gateway.turn(conv.id, "hello").await.unwrap();
        assert_eq!(gateway.lock_entries(), 0);
        gateway.delete_conversation(conv.id).await.unwrap();
        assert_eq!(gateway.lock_entries(), 0);
    }
}
