//! Per-round mechanics: sending the model request and executing the round's
//! tool calls.

use super::config::OrchestratorConfig;
use super::events::{EventHandler, TurnEvent};
use crate::api::ChatBackend;
use crate::api::retry::retry_with_backoff;
use crate::conversation::{ContextWindow, ToolCall, ToolResult};
use crate::tools::invoker::CapabilityInvoker;
use crate::{ChatCompletion, ChatMessage, ChatRequest, ToolDef};
use tracing::debug;

// ── Send request ──────────────────────────────────────────────────

/// Assemble the request body: system prompt, then the window.
pub(crate) fn build_round_request(
    config: &OrchestratorConfig,
    window: &ContextWindow,
    tools: Vec<ToolDef>,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(window.len() + 1);
    if !config.system_prompt.is_empty() {
        messages.push(ChatMessage::system(&config.system_prompt));
    }
    messages.extend(window.messages().map(ChatMessage::from));
    ChatRequest {
        model: config.model.clone(),
        messages,
        max_tokens: config.max_tokens,
        temperature: Some(config.temperature),
        tools: if tools.is_empty() { None } else { Some(tools) },
    }
}

/// Send one round's request with per-attempt timeout and retry, and reject
/// unusable completions.
pub(crate) async fn send_round_request(
    config: &OrchestratorConfig,
    backend: &dyn ChatBackend,
    body: &ChatRequest,
) -> Result<ChatCompletion, String> {
    let timeout = config.request_timeout;
    let completion = retry_with_backoff(&config.retry, || async move {
        tokio::time::timeout(timeout, backend.chat(body))
            .await
            .map_err(|_| format!("LLM request timed out after {}s", timeout.as_secs()))?
    })
    .await?;
    completion.validate()?;
    Ok(completion)
}

// ── Tool execution ────────────────────────────────────────────────

/// Execute one round's tool calls. Results come back in emission order
/// whether or not the calls ran concurrently.
pub(crate) async fn execute_tool_calls(
    invoker: &CapabilityInvoker<'_>,
    calls: &[ToolCall],
    parallel: bool,
    event_handler: &dyn EventHandler,
) -> Vec<ToolResult> {
    for call in calls {
        event_handler.on_event(&TurnEvent::ToolExecuting {
            name: &call.name,
            arguments: &call.arguments,
        });
    }

    let results = if parallel && calls.len() > 1 {
        debug!("Executing {} tool calls concurrently", calls.len());
        futures::future::join_all(calls.iter().map(|call| invoker.invoke(call))).await
    } else {
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(invoker.invoke(call).await);
        }
        results
    };

    for (call, result) in calls.iter().zip(&results) {
        event_handler.on_event(&TurnEvent::ToolResult {
            name: &call.name,
            call_id: &call.id,
            success: result.success,
            content: &result.content,
        });
    }
    results
}
