//! The bounded turn loop.
//!
//! One call to [`Orchestrator::handle_turn`] takes a user utterance through
//! to a final answer:
//!
//! 1. The user message goes into a pending buffer (nothing is persisted here).
//! 2. The context window is built from the conversation snapshot plus the
//!    buffer, summarizing older messages when the conversation is long.
//! 3. The window, the system prompt and the registry's tools are sent to the
//!    model.
//! 4. A reply without tool calls is the final answer.
//! 5. Otherwise the assistant message is buffered exactly as returned, every
//!    call is executed in emission order, one tool message per call follows,
//!    and the loop goes back to 2.
//!
//! After `max_rounds` requests without a final answer the turn closes with an
//! apology. The returned delta always passes
//! [`check_ordering`](super::ordering::check_ordering).

use super::config::OrchestratorConfig;
use super::error::TurnError;
use super::events::{EventHandler, NoopHandler, TurnEvent, TurnOutcome, TurnStatus};
use super::execution::{build_round_request, execute_tool_calls, send_round_request};
use super::ordering::check_ordering;
use crate::api::{ChatBackend, generate_turn_id, round_span_id};
use crate::context::summarizer::Summarizer;
use crate::context::window::ContextWindowBuilder;
use crate::conversation::{Conversation, Message, ToolResult};
use crate::tools::invoker::CapabilityInvoker;
use crate::tools::session::ProviderSession;
use tracing::{debug, info, warn};

pub struct Orchestrator<'a> {
    backend: &'a dyn ChatBackend,
    session: &'a ProviderSession,
    config: &'a OrchestratorConfig,
    event_handler: &'a dyn EventHandler,
    /// Checked before each model request. Returning `true` cancels the turn.
    stop_signal: Option<Box<dyn Fn() -> bool + Send + Sync + 'a>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        backend: &'a dyn ChatBackend,
        session: &'a ProviderSession,
        config: &'a OrchestratorConfig,
    ) -> Self {
        Self {
            backend,
            session,
            config,
            event_handler: &NoopHandler,
            stop_signal: None,
        }
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    pub fn with_stop_signal(mut self, signal: impl Fn() -> bool + Send + Sync + 'a) -> Self {
        self.stop_signal = Some(Box::new(signal));
        self
    }

    fn stop_requested(&self) -> bool {
        self.stop_signal.as_ref().is_some_and(|signal| signal())
    }

    /// Run one turn against `conversation` (the persisted snapshot, which is
    /// not modified). Dropping the returned future discards the whole turn.
    pub async fn handle_turn(
        &self,
        conversation: &Conversation,
        user_text: &str,
    ) -> Result<TurnOutcome, TurnError> {
        let config = self.config;
        let turn_id = generate_turn_id();
        info!(
            "Turn started: turn_id={turn_id}, conversation={}, model={}, max_rounds={}",
            conversation.id, config.model, config.max_rounds
        );
        self.event_handler.on_event(&TurnEvent::TurnStart {
            turn_id: &turn_id,
            user_text,
        });

        let builder = ContextWindowBuilder::new(
            &config.window,
            Summarizer::new(self.backend, &config.summarizer, &config.model),
        );
        let invoker = CapabilityInvoker::new(self.session, &config.invoker);

        let mut buffer = vec![Message::user(user_text)];
        let mut summary: Option<Message> = None;

        for round in 1..=config.max_rounds {
            // The buffer only ever ends on a complete round here.
            if self.stop_requested() {
                info!("[{turn_id}] Stop signal received, cancelling turn");
                return Err(TurnError::Cancelled {
                    confirmed: buffer,
                    summary,
                });
            }

            let history: Vec<Message> = conversation
                .messages
                .iter()
                .chain(summary.iter())
                .chain(buffer.iter())
                .cloned()
                .collect();
            let built = builder.build(&history, &conversation.title).await;
            if let Some(new_summary) = built.new_summary {
                self.event_handler.on_event(&TurnEvent::Summarized {
                    summarized_through: new_summary.summarized_through.unwrap_or(0),
                });
                summary = Some(new_summary);
            }

            self.event_handler.on_event(&TurnEvent::RoundStart {
                round,
                max_rounds: config.max_rounds,
                window_len: built.window.len(),
            });
            let body = build_round_request(
                config,
                &built.window,
                self.session.registry().definitions(),
            );
            debug!(
                "[{}] sending {} message(s), {} tool(s)",
                round_span_id(&turn_id, round),
                body.messages.len(),
                body.tools.as_ref().map_or(0, Vec::len)
            );

            let completion = match send_round_request(config, self.backend, &body).await {
                Ok(c) => c,
                Err(reason) => {
                    warn!("[{turn_id}] LLM request failed in round {round}: {reason}");
                    return Err(TurnError::RequestFailed {
                        reason,
                        confirmed: buffer,
                        summary,
                    });
                }
            };

            let message = completion.into_message();
            if let Some(text) = message.content.as_deref().filter(|t| !t.is_empty()) {
                self.event_handler.on_event(&TurnEvent::Text(text));
            }

            if !message.requests_tools() {
                let answer = message.text().to_string();
                buffer.push(message);
                self.event_handler
                    .on_event(&TurnEvent::Finished { rounds_used: round });
                return self.finish(turn_id, answer, buffer, summary, TurnStatus::Completed, round);
            }

            self.event_handler.on_event(&TurnEvent::ToolCallsReceived {
                round,
                count: message.tool_calls.len(),
            });
            let calls = message.tool_calls.clone();
            buffer.push(message);
            let results =
                execute_tool_calls(&invoker, &calls, config.parallel_tools, self.event_handler)
                    .await;
            buffer.extend(results.iter().map(ToolResult::to_message));
        }

        warn!(
            "[{turn_id}] No final answer after {} round(s)",
            config.max_rounds
        );
        self.event_handler.on_event(&TurnEvent::RoundLimitReached {
            max_rounds: config.max_rounds,
        });
        buffer.push(Message::assistant_text(&config.apology));
        self.finish(
            turn_id,
            config.apology.clone(),
            buffer,
            summary,
            TurnStatus::ExhaustedToolLoop,
            config.max_rounds,
        )
    }

    fn finish(
        &self,
        turn_id: String,
        answer: String,
        appended_messages: Vec<Message>,
        summary: Option<Message>,
        status: TurnStatus,
        rounds_used: u32,
    ) -> Result<TurnOutcome, TurnError> {
        check_ordering(&appended_messages)?;
        info!(
            "Turn finished: turn_id={turn_id}, status={status:?}, rounds={rounds_used}, appended={}",
            appended_messages.len()
        );
        Ok(TurnOutcome {
            turn_id,
            answer,
            appended_messages,
            summary,
            status,
            rounds_used,
        })
    }
}
