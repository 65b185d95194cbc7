//! Convenience re-exports for common `parley` types.
//!
//! ```ignore
//! use parley::prelude::*;
//! ```
//!
//! Covers what a typical gateway program needs: the LLM client, message
//! types, the gateway and orchestrator with their config, event handlers,
//! providers and stores. Protocol internals (JSON-RPC frames, wire tool
//! calls) are left out; import them from their modules when needed.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::conversation::{
    Conversation, ConversationId, ConversationOverview, Message, MessageRole, ToolCall, ToolResult,
};
pub use crate::{ChatRequest, OpenAiClient, ToolDef, json_schema_for};

// ── Turn runtime ────────────────────────────────────────────────────
pub use crate::agent::{
    CompositeEventHandler, EventHandler, FnEventHandler, LoggingHandler, NoopHandler, Orchestrator,
    OrchestratorConfig, TurnError, TurnEvent, TurnOutcome, TurnStatus,
};
pub use crate::api::{ChatBackend, RetryConfig};
pub use crate::gateway::{Gateway, GatewayError, TurnReply};
pub use crate::settings::{GatewaySettings, StoreSettings};

// ── Context management ──────────────────────────────────────────────
pub use crate::context::{SummarizerConfig, WindowConfig};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    CapabilityProvider, FnTool, LocalProvider, LocalTool, ProviderError, ProviderSession,
    ProviderSpec, ToolDescriptor, ToolRegistry,
};

// ── Persistence ─────────────────────────────────────────────────────
pub use crate::store::{ConversationStore, JsonFileStore, MemoryStore, StoreError};
