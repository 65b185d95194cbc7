//! Conversation records: messages, tool calls, tool results and the
//! transient context window.
//!
//! These are the types persisted by a [`ConversationStore`](crate::store::ConversationStore)
//! and exchanged with the orchestrator. They never carry the LLM provider's
//! native response shape; [`ChatCompletion::into_message`](crate::ChatCompletion::into_message)
//! maps a response into a [`Message`] at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a persisted conversation.
pub type ConversationId = u64;

// ── Message ────────────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the model.
///
/// `arguments` is the serialized JSON payload exactly as the model emitted it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl ToolCall {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }
}

/// A single conversation record.
///
/// `tool_calls` is non-empty only on assistant messages that request tools;
/// `tool_call_id` is set only on tool-role messages. Summary messages are
/// system-role rows flagged with `is_summary` and carry the number of leading
/// non-summary messages they condense in `summarized_through`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default)]
    pub is_summary: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarized_through: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: MessageRole, content: Option<String>) -> Self {
        Self {
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            is_summary: false,
            summarized_through: None,
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::System, Some(content.into()))
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::User, Some(content.into()))
    }

    pub fn assistant_text(content: impl Into<String>) -> Self {
        Self::with_role(MessageRole::Assistant, Some(content.into()))
    }

    /// Assistant message requesting tools. `content` may be absent.
    pub fn assistant_tool_calls(content: Option<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            ..Self::with_role(MessageRole::Assistant, content)
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(call_id.into()),
            ..Self::with_role(MessageRole::Tool, Some(content.into()))
        }
    }

    /// A running summary covering the first `summarized_through` non-summary
    /// messages of the conversation.
    pub fn summary(content: impl Into<String>, summarized_through: usize) -> Self {
        Self {
            is_summary: true,
            summarized_through: Some(summarized_through),
            ..Self::with_role(MessageRole::System, Some(content.into()))
        }
    }

    /// Whether this is an assistant message carrying tool calls.
    pub fn requests_tools(&self) -> bool {
        self.role == MessageRole::Assistant && !self.tool_calls.is_empty()
    }

    /// Message text, or the empty string when absent.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

// ── Conversation ───────────────────────────────────────────────────

/// A persisted conversation snapshot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: ConversationId,
    pub owner: String,
    pub title: String,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(id: ConversationId, owner: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner: owner.into(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Number of messages that are not summaries.
    pub fn dialogue_len(&self) -> usize {
        self.messages.iter().filter(|m| !m.is_summary).count()
    }

    /// Lightweight listing entry for this conversation.
    pub fn overview(&self) -> ConversationOverview {
        ConversationOverview {
            id: self.id,
            owner: self.owner.clone(),
            title: self.title.clone(),
            message_count: self.dialogue_len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Listing entry returned by
/// [`ConversationStore::list_conversations`](crate::store::ConversationStore::list_conversations).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConversationOverview {
    pub id: ConversationId,
    pub owner: String,
    pub title: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Context window ─────────────────────────────────────────────────

/// The bounded message sequence sent to the model for one request.
///
/// Never persisted as such.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContextWindow {
    pub summary: Option<Message>,
    pub recent: Vec<Message>,
}

impl ContextWindow {
    /// Summary first (when present), then the recent tail.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.summary.iter().chain(self.recent.iter())
    }

    pub fn len(&self) -> usize {
        self.recent.len() + usize::from(self.summary.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_none() && self.recent.is_empty()
    }
}

// ── Tool result ────────────────────────────────────────────────────

/// Outcome of one tool invocation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub content: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            success: true,
            error: None,
        }
    }

    /// A failed invocation. The content handed to the model is a small JSON
    /// object so it can react to the failure.
    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            tool_call_id: tool_call_id.into(),
            content: serde_json::json!({ "success": false, "error": error }).to_string(),
            success: false,
            error: Some(error),
        }
    }

    /// The tool-role message answering the originating call.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.tool_call_id, &self.content)
    }
}
