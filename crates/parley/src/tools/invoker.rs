//! Executes model-emitted tool calls against the connected provider.
//!
//! [`CapabilityInvoker::invoke`] never fails: unknown tools, bad arguments,
//! provider errors and timeouts all become a [`ToolResult`] with
//! `success == false` so the model can react to them.

use super::registry::ToolDescriptor;
use super::session::ProviderSession;
use crate::conversation::{ToolCall, ToolResult};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Maximum size (in bytes) of a tool result before truncation.
pub const DEFAULT_MAX_RESULT_BYTES: usize = 30_000;

/// Default timeout of one tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Per-invocation timeout.
    pub timeout: Duration,
    /// Validate arguments against the tool's JSON Schema before calling.
    pub validate_args: bool,
    /// Results longer than this are truncated with a notice.
    pub max_result_bytes: usize,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TOOL_TIMEOUT,
            validate_args: true,
            max_result_bytes: DEFAULT_MAX_RESULT_BYTES,
        }
    }
}

pub struct CapabilityInvoker<'a> {
    session: &'a ProviderSession,
    config: &'a InvokerConfig,
}

impl<'a> CapabilityInvoker<'a> {
    pub fn new(session: &'a ProviderSession, config: &'a InvokerConfig) -> Self {
        Self { session, config }
    }

    pub async fn invoke(&self, call: &ToolCall) -> ToolResult {
        let descriptor = match self.session.registry().describe(&call.name) {
            Ok(d) => d,
            Err(e) => {
                warn!("Model requested unknown tool '{}'", call.name);
                return ToolResult::failure(&call.id, e.to_string());
            }
        };

        let arguments = match parse_arguments(&call.arguments) {
            Ok(v) => v,
            Err(e) => {
                return ToolResult::failure(
                    &call.id,
                    format!("invalid JSON arguments for tool '{}': {e}", call.name),
                );
            }
        };

        if self.config.validate_args
            && let Err(e) = validate_arguments(&descriptor, &arguments)
        {
            return ToolResult::failure(&call.id, e);
        }

        let Some(provider) = self.session.provider() else {
            return ToolResult::failure(&call.id, "no capability provider connected");
        };

        log_tool_call(&call.name, &call.arguments);
        let start = Instant::now();
        let outcome =
            tokio::time::timeout(self.config.timeout, provider.call_tool(&call.name, arguments))
                .await;
        let elapsed = start.elapsed();

        match outcome {
            Err(_) => {
                info!(
                    "Tool {} timed out after {:.1}s",
                    call.name,
                    elapsed.as_secs_f64()
                );
                ToolResult::failure(
                    &call.id,
                    format!(
                        "tool '{}' timed out after {:.0} seconds",
                        call.name,
                        self.config.timeout.as_secs_f64()
                    ),
                )
            }
            Ok(Err(e)) => {
                warn!("Tool {} failed: {e}", call.name);
                ToolResult::failure(&call.id, format!("tool '{}' failed: {e}", call.name))
            }
            Ok(Ok(content)) => {
                debug!(
                    "Tool {} completed in {:.0}ms ({} bytes)",
                    call.name,
                    elapsed.as_secs_f64() * 1000.0,
                    content.len()
                );
                trace!(
                    "Tool {} result preview: {}",
                    call.name,
                    content.chars().take(300).collect::<String>()
                );
                ToolResult::success(
                    &call.id,
                    truncate_result(content, self.config.max_result_bytes),
                )
            }
        }
    }
}

/// Parse the model's argument string. An empty string means "no arguments".
fn parse_arguments(raw: &str) -> Result<serde_json::Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(raw)
}

/// Check `arguments` against the descriptor's schema. An invalid schema skips
/// validation.
pub fn validate_arguments(
    descriptor: &ToolDescriptor,
    arguments: &serde_json::Value,
) -> Result<(), String> {
    let Ok(validator) = jsonschema::validator_for(&descriptor.input_schema) else {
        return Ok(());
    };
    let errors: Vec<String> = validator
        .iter_errors(arguments)
        .map(|e| format!("  - {}: {e}", e.instance_path()))
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "argument validation failed for tool '{}':\n{}",
            descriptor.name,
            errors.join("\n")
        ))
    }
}

fn log_tool_call(name: &str, arguments: &str) {
    let preview: String = arguments.chars().take(120).collect();
    let ellipsis = if arguments.chars().count() > 120 { "..." } else { "" };
    info!("[tool] {name}({preview}{ellipsis})");
    trace!("[tool] {name} arguments: {arguments}");
}

/// Cut `s` to at most `max` bytes on a char boundary, appending a notice.
pub fn truncate_result(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let total = s.len();
    let mut kept = String::with_capacity(max);
    for ch in s.chars() {
        if kept.len() + ch.len_utf8() > max {
            break;
        }
        kept.push(ch);
    }
    format!("{kept}...\n[truncated: {total} bytes total]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::local::{FnTool, LocalProvider};
    use std::sync::Arc;

    fn weather_schema() -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"location": {"type": "string"}},
            "required": ["location"]
        })
    }

    async fn session() -> ProviderSession {
        let provider = LocalProvider::new()
            .with(FnTool::new(
                ToolDescriptor::new("get_weather", "Weather", weather_schema()),
                |args: serde_json::Value| async move {
                    Ok(format!("34°C in {}", args["location"].as_str().unwrap_or("?")))
                },
            ))
            .with(FnTool::new(
                ToolDescriptor::new("ping", "", serde_json::json!({"type": "object"})),
                |_: serde_json::Value| async { Ok("pong".to_string()) },
            ))
            .with(FnTool::new(
                ToolDescriptor::new("broken", "", serde_json::json!({"type": "object"})),
                |_: serde_json::Value| async { Err("database offline".to_string()) },
            ))
            .with(FnTool::new(
                ToolDescriptor::new("slow", "", serde_json::json!({"type": "object"})),
                |_: serde_json::Value| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok("late".to_string())
                },
            ))
            .with(FnTool::new(
                ToolDescriptor::new("big", "", serde_json::json!({"type": "object"})),
                |_: serde_json::Value| async { Ok("é".repeat(100)) },
            ));
        let session = ProviderSession::new();
        session.connect(Arc::new(provider)).await.unwrap();
        session
    }

    #[tokio::test]
    async fn successful_call() {
        let session = session().await;
        let config = InvokerConfig::default();
        let invoker = CapabilityInvoker::new(&session, &config);
        let result = invoker
            .invoke(&ToolCall::new("1", "get_weather", r#"{"location":"Delhi"}"#))
            .await;
        assert!(result.success);
        assert_eq!(result.tool_call_id, "1");
        assert_eq!(result.content, "34°C in Delhi");
    }

    #[tokio::test]
    async fn unknown_tool_fails() {
        let session = session().await;
        let config = InvokerConfig::default();
        let result = CapabilityInvoker::new(&session, &config)
            .invoke(&ToolCall::new("1", "teleport", "{}"))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown tool"));
    }

    #[tokio::test]
    async fn empty_arguments_mean_empty_object() {
        let session = session().await;
        let config = InvokerConfig::default();
        let result = CapabilityInvoker::new(&session, &config)
            .invoke(&ToolCall::new("1", "ping", ""))
            .await;
        assert!(result.success);
        assert_eq!(result.content, "pong");
    }

    #[tokio::test]
    async fn unparseable_arguments_fail() {
        let session = session().await;
        let config = InvokerConfig::default();
        let result = CapabilityInvoker::new(&session, &config)
            .invoke(&ToolCall::new("1", "get_weather", "{location:"))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("invalid JSON arguments"));
    }

    #[tokio::test]
    async fn schema_violation_fails_before_calling() {
        let session = session().await;
        let config = InvokerConfig::default();
        let result = CapabilityInvoker::new(&session, &config)
            .invoke(&ToolCall::new("1", "get_weather", r#"{"city":"Delhi"}"#))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("argument validation failed"));
    }

    #[tokio::test]
    async fn provider_error_becomes_failed_result() {
        let session = session().await;
        let config = InvokerConfig::default();
        let result = CapabilityInvoker::new(&session, &config)
            .invoke(&ToolCall::new("9", "broken", "{}"))
            .await;
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("database offline"));
        let content: serde_json::Value = serde_json::from_str(&result.content).unwrap();
        assert_eq!(content["success"], false);
    }

    #[tokio::test]
    async fn timeout_becomes_failed_result() {
        let session = session().await;
        let config = InvokerConfig {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let result = CapabilityInvoker::new(&session, &config)
            .invoke(&ToolCall::new("1", "slow", "{}"))
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn disconnected_session_fails() {
        let session = session().await;
        session.disconnect().await.unwrap();
        let config = InvokerConfig::default();
        let result = CapabilityInvoker::new(&session, &config)
            .invoke(&ToolCall::new("1", "ping", "{}"))
            .await;
        assert!(!result.success);
    }

    #[tokio::test]
    async fn long_results_are_truncated_on_char_boundary() {
        let session = session().await;
        let config = InvokerConfig {
            max_result_bytes: 11,
            ..Default::default()
        };
        let result = CapabilityInvoker::new(&session, &config)
            .invoke(&ToolCall::new("1", "big", "{}"))
            .await;
        assert!(result.success);
        assert!(result.content.starts_with("ééééé..."));
        assert!(result.content.contains("[truncated: 200 bytes total]"));
    }

    #[test]
    fn truncate_short_is_identity() {
        assert_eq!(truncate_result("abc".into(), 10), "abc");
    }
}
