//! Turn events, handlers and the turn outcome.
//!
//! The orchestrator reports progress through [`TurnEvent`]s. Callers plug in
//! an [`EventHandler`] to log, render or measure a turn.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests, fire-and-forget turns |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures |
//! | [`CompositeEventHandler`] | Several handlers in order |

use crate::conversation::Message;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

// ── Events ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum TurnEvent<'a> {
    /// A turn is starting.
    TurnStart { turn_id: &'a str, user_text: &'a str },
    /// A new model request is about to be sent.
    RoundStart {
        round: u32,
        max_rounds: u32,
        window_len: usize,
    },
    /// The window builder produced a new running summary.
    Summarized { summarized_through: usize },
    /// The model returned text (final answer, or preamble to tool calls).
    Text(&'a str),
    ToolCallsReceived { round: u32, count: usize },
    ToolExecuting { name: &'a str, arguments: &'a str },
    ToolResult {
        name: &'a str,
        call_id: &'a str,
        success: bool,
        content: &'a str,
    },
    /// The model produced a final answer.
    Finished { rounds_used: u32 },
    /// The round bound was hit before a final answer.
    RoundLimitReached { max_rounds: u32 },
}

/// Observer of turn events.
///
/// ```ignore
/// struct Printer;
///
/// impl EventHandler for Printer {
///     fn on_event(&self, event: &TurnEvent<'_>) {
///         if let TurnEvent::ToolExecuting { name, .. } = event {
///             println!("calling {name}...");
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &TurnEvent<'_>) {
        let _ = event;
    }
}

pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&TurnEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&TurnEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&TurnEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &TurnEvent<'_>) {
        (self.0)(event)
    }
}

/// Dispatches every event to each inner handler in registration order.
#[derive(Default)]
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }

    pub fn with_opt(self, handler: Option<impl EventHandler + 'static>) -> Self {
        match handler {
            Some(h) => self.with(h),
            None => self,
        }
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &TurnEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// Logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &TurnEvent<'_>) {
        match event {
            TurnEvent::TurnStart { turn_id, user_text } => {
                let preview: String = user_text.chars().take(80).collect();
                debug!("[{turn_id}] user: {preview}");
            }
            TurnEvent::RoundStart {
                round,
                max_rounds,
                window_len,
            } => {
                info!("[round {round}/{max_rounds}] window={window_len} message(s)");
            }
            TurnEvent::Summarized { summarized_through } => {
                info!("Running summary now covers {summarized_through} message(s)");
            }
            TurnEvent::Text(text) => {
                let preview: String = text.chars().take(200).collect();
                debug!(
                    "LLM text: {preview}{}",
                    if text.chars().count() > 200 { "..." } else { "" }
                );
            }
            TurnEvent::ToolCallsReceived { round, count } => {
                debug!("{count} tool call(s) in round {round}");
            }
            TurnEvent::ToolExecuting { name, .. } => {
                debug!("Executing tool: {name}");
            }
            TurnEvent::ToolResult {
                name,
                success,
                content,
                ..
            } => {
                debug!(
                    "Tool {name} {}: {} bytes",
                    if *success { "succeeded" } else { "failed" },
                    content.len()
                );
            }
            TurnEvent::Finished { rounds_used } => {
                info!("Turn finished after {rounds_used} round(s)");
            }
            TurnEvent::RoundLimitReached { max_rounds } => {
                info!("Turn hit round limit ({max_rounds})");
            }
        }
    }
}

// ── Turn outcome ───────────────────────────────────────────────────

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// The model produced a final answer.
    Completed,
    /// The round bound was hit; the answer is the apology.
    ExhaustedToolLoop,
}

/// Result of [`Orchestrator::handle_turn`](super::orchestrator::Orchestrator::handle_turn).
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn_id: String,
    pub answer: String,
    /// Messages to append to the conversation, in order, starting with the
    /// user message.
    pub appended_messages: Vec<Message>,
    /// Latest running summary produced during the turn, to be stored.
    pub summary: Option<Message>,
    pub status: TurnStatus,
    pub rounds_used: u32,
}
