//! Conversation and tool-call orchestration core for LLM chat gateways.
//!
//! `parley` accepts a user utterance, lets the model decide whether to answer
//! directly or call tools exposed by a capability provider, executes those
//! calls, folds the results back into the conversation and returns the final
//! answer together with the exact sequence of messages to persist.
//!
//! The centerpiece is the [`Orchestrator`](agent::orchestrator::Orchestrator):
//! a bounded turn loop that keeps the message ordering the chat-completions
//! API requires (user → assistant with tool calls → tool results → final
//! assistant) and never hands back an assistant tool-call message without its
//! complete set of results.
//!
//! # Getting started
//!
//! ```ignore
//! use parley::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let api_key = std::env::var("OPENAI_API_KEY").map_err(|e| e.to_string())?;
//!     let backend = Arc::new(OpenAiClient::new(api_key)?);
//!
//!     // Connect a capability provider; its tools populate the registry.
//!     let session = Arc::new(ProviderSession::new());
//!     let provider = ProviderSpec::stdio(["python", "weather_server.py"]).open().await
//!         .map_err(|e| e.to_string())?;
//!     session.connect(provider).await.map_err(|e| e.to_string())?;
//!
//!     let gateway = Gateway::new(
//!         backend,
//!         Arc::new(MemoryStore::new()),
//!         session,
//!         OrchestratorConfig::new("gpt-4o-mini"),
//!     );
//!
//!     let (conversation, reply) = gateway
//!         .start_conversation("ana@example.com", "What's the weather in Delhi?")
//!         .await
//!         .map_err(|e| e.to_string())?;
//!     println!("[{}] {}", conversation.title, reply.answer);
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`conversation`] | [`Message`](conversation::Message), [`ToolCall`](conversation::ToolCall), [`Conversation`](conversation::Conversation), [`ContextWindow`](conversation::ContextWindow), [`ToolResult`](conversation::ToolResult) |
//! | [`agent`] | Orchestrator turn loop, config, events, ordering checks, title generation |
//! | [`context`] | Context window builder and running summarizer |
//! | [`tools`] | Tool registry, provider session, capability invoker, local and MCP providers |
//! | [`store`] | Persistence contract plus in-memory and JSON-file stores |
//! | [`gateway`] | Caller-facing turn API tying everything together |
//! | [`api`] | LLM backend trait, retry with backoff, turn ids |

pub mod agent;
pub mod api;
pub mod context;
pub mod conversation;
pub mod gateway;
pub mod prelude;
pub mod settings;
pub mod store;
pub mod tools;

use conversation::{Message, MessageRole, ToolCall};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// Re-export schemars for downstream crates.
pub use schemars;

// ── Constants ──────────────────────────────────────────────────────

/// Default base URL of an OpenAI-compatible chat completions API.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default model for all LLM calls.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Environment variable holding the API key by default.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Used to describe the arguments of in-process tools.
///
/// # Example
///
/// ```
/// use parley::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct WeatherArgs {
///     location: String,
/// }
///
/// let schema = json_schema_for::<WeatherArgs>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"location".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

// ── Request types ──────────────────────────────────────────────────

/// Chat completion request body. Unused optional fields are omitted from
/// serialization.
#[derive(Serialize, Debug, Default, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "is_zero_u32")]
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDef>>,
}

fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

/// A message in the wire format of the chat completions API.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

/// Prefix put in front of a stored summary when it is sent to the model.
pub const SUMMARY_PREFIX: &str = "Summary of the earlier conversation:\n";

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        let content = if msg.is_summary {
            Some(format!("{SUMMARY_PREFIX}{}", msg.text()))
        } else {
            msg.content.clone()
        };
        let tool_calls = if msg.tool_calls.is_empty() {
            None
        } else {
            Some(msg.tool_calls.iter().map(WireToolCall::from).collect())
        };
        Self {
            role: msg.role,
            content,
            tool_calls,
            tool_call_id: msg.tool_call_id.clone(),
        }
    }
}

// ── Tool types ─────────────────────────────────────────────────────

/// The type of a tool definition. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

/// Tool definition sent to the API (OpenAI function-calling format).
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolDef {
    #[serde(rename = "type")]
    pub tool_type: ToolType,
    pub function: FunctionDef,
}

impl ToolDef {
    /// Create a function-calling tool definition.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: ToolType::Function,
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The type of a tool call. Currently always `Function`.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum CallType {
    #[serde(rename = "function")]
    Function,
}

/// A tool call in the wire format.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: CallType,
    pub function: FunctionCallData,
}

impl WireToolCall {
    pub fn function(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            call_type: CallType::Function,
            function: FunctionCallData {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }
}

impl From<&ToolCall> for WireToolCall {
    fn from(call: &ToolCall) -> Self {
        Self::function(&call.id, &call.name, &call.arguments)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCallData {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

// ── Response types ─────────────────────────────────────────────────

/// Raw API response (internal deserialization target).
#[derive(Deserialize, Debug)]
struct RawChatResponse {
    choices: Option<Vec<RawChoice>>,
    error: Option<ApiErrorResponse>,
    #[serde(default)]
    usage: Option<UsageInfo>,
}

#[derive(Deserialize, Debug)]
struct RawChoice {
    message: RawResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct RawResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    message: String,
}

/// Clean return type of a chat completion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatCompletion {
    pub content: Option<String>,
    pub tool_calls: Vec<WireToolCall>,
    pub usage: Option<UsageInfo>,
    pub finish_reason: Option<String>,
}

impl ChatCompletion {
    /// A text-only completion.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            finish_reason: Some("stop".into()),
            ..Default::default()
        }
    }

    /// A completion requesting the given tool calls, without content.
    pub fn tool_calls(calls: Vec<WireToolCall>) -> Self {
        Self {
            tool_calls: calls,
            finish_reason: Some("tool_calls".into()),
            ..Default::default()
        }
    }

    /// Check the completion is usable: something to say or do, and tool calls
    /// with non-empty, distinct ids and names.
    pub fn validate(&self) -> Result<(), String> {
        let has_content = self.content.as_ref().is_some_and(|c| !c.is_empty());
        if !has_content && self.tool_calls.is_empty() {
            return Err("malformed response: no content and no tool calls".into());
        }
        let mut seen = std::collections::HashSet::new();
        for call in &self.tool_calls {
            if call.id.is_empty() {
                return Err("malformed response: tool call without id".into());
            }
            if call.function.name.is_empty() {
                return Err(format!(
                    "malformed response: tool call '{}' without a name",
                    call.id
                ));
            }
            if !seen.insert(call.id.as_str()) {
                return Err(format!(
                    "malformed response: duplicate tool call id '{}'",
                    call.id
                ));
            }
        }
        Ok(())
    }

    /// Map the response into an assistant [`Message`], field by field.
    ///
    /// Tool calls keep the order in which the model emitted them.
    pub fn into_message(self) -> Message {
        if self.tool_calls.is_empty() {
            return Message::assistant_text(self.content.unwrap_or_default());
        }
        let calls = self
            .tool_calls
            .into_iter()
            .map(|c| ToolCall::new(c.id, c.function.name, c.function.arguments))
            .collect();
        Message::assistant_tool_calls(self.content.filter(|c| !c.is_empty()), calls)
    }
}

/// Token usage statistics.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: Option<u32>,
    pub completion_tokens: Option<u32>,
    pub total_tokens: Option<u32>,
}

// ── Client ─────────────────────────────────────────────────────────

/// Async HTTP client for an OpenAI-compatible chat completions API.
pub struct OpenAiClient {
    pub(crate) client: reqwest::Client,
    pub(crate) api_key: String,
    pub(crate) base_url: String,
}

impl OpenAiClient {
    /// Create a client for the default OpenAI endpoint.
    pub fn new(api_key: impl Into<String>) -> Result<Self, String> {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    /// Create a client for any OpenAI-compatible endpoint
    /// (e.g. `http://localhost:11434/v1`).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Send a chat completion request.
    pub async fn chat(&self, body: &ChatRequest) -> Result<ChatCompletion, String> {
        let tool_count = body.tools.as_ref().map_or(0, |t| t.len());
        debug!(
            "LLM request: model={}, messages={}, tools={}, max_tokens={}",
            body.model,
            body.messages.len(),
            tool_count,
            body.max_tokens,
        );
        trace!(
            "Request payload size: {} bytes",
            serde_json::to_string(body).map_or(0, |s| s.len())
        );

        let start = Instant::now();

        let resp = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        if !status.is_success() {
            return Err(format!("LLM API HTTP {status}: {text}"));
        }

        let parsed: RawChatResponse = serde_json::from_str(&text)
            .map_err(|e| format!("malformed response: failed to parse: {e}"))?;

        if let Some(err) = parsed.error {
            return Err(format!("LLM API error: {}", err.message));
        }

        if let Some(ref usage) = parsed.usage {
            debug!(
                "Token usage: prompt={}, completion={}, total={}",
                usage.prompt_tokens.unwrap_or(0),
                usage.completion_tokens.unwrap_or(0),
                usage.total_tokens.unwrap_or(0),
            );
        }

        let choice = parsed
            .choices
            .and_then(|c| c.into_iter().next())
            .ok_or_else(|| "malformed response: no choices".to_string())?;

        let completion = ChatCompletion {
            content: choice.message.content,
            tool_calls: choice.message.tool_calls.unwrap_or_default(),
            usage: parsed.usage,
            finish_reason: choice.finish_reason,
        };
        debug!(
            "LLM output: {} chars text, {} tool call(s)",
            completion.content.as_ref().map_or(0, |s| s.len()),
            completion.tool_calls.len()
        );
        Ok(completion)
    }
}
