//! MCP provider reached over HTTP: every JSON-RPC message is POSTed to one
//! URL. Responses may be plain JSON or a short `text/event-stream`.

use super::protocol::{
    InitializeParams, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ToolCallParams,
    parse_tool_call, parse_tool_list,
};
use crate::tools::provider::{CapabilityProvider, ProviderError};
use crate::tools::registry::ToolDescriptor;
use futures::future::BoxFuture;
use reqwest::header;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info};

const SESSION_HEADER: &str = "mcp-session-id";

pub struct HttpMcpProvider {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
    session_id: Mutex<Option<String>>,
}

impl HttpMcpProvider {
    /// Perform the `initialize` handshake against `url`.
    pub async fn connect(url: &str) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Transport(format!("failed to build HTTP client: {e}")))?;
        let provider = Self {
            client,
            url: url.to_string(),
            next_id: AtomicU64::new(1),
            session_id: Mutex::new(None),
        };
        let params = serde_json::to_value(InitializeParams::default())?;
        let response = provider.send_request("initialize", Some(params)).await?;
        debug!("MCP provider {url} initialized: {response}");
        provider
            .post(&JsonRpcNotification::new("notifications/initialized"))
            .await?;
        info!("MCP provider {url} connected");
        Ok(provider)
    }

    async fn post(&self, message: &impl Serialize) -> Result<reqwest::Response, ProviderError> {
        let mut request = self
            .client
            .post(&self.url)
            .header(header::ACCEPT, "application/json, text/event-stream")
            .json(message);
        let session = self
            .session_id
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(session) = session {
            request = request.header(SESSION_HEADER, session);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(format!("HTTP request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transport(format!("HTTP {status}: {text}")));
        }
        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            *self
                .session_id
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(session.to_string());
        }
        Ok(response)
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let response = self.post(&JsonRpcRequest::new(id, method, params)).await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport(format!("failed to read response body: {e}")))?;
        parse_body(&content_type, &body, id)?.into_result()
    }
}

/// Extract the response carrying `id` from a JSON or SSE body.
fn parse_body(content_type: &str, body: &str, id: u64) -> Result<JsonRpcResponse, ProviderError> {
    if content_type.contains("text/event-stream") {
        return body
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .filter_map(|data| serde_json::from_str::<JsonRpcResponse>(data.trim()).ok())
            .find(|resp| resp.id == Some(id))
            .ok_or_else(|| ProviderError::Protocol("no JSON-RPC response in SSE stream".into()));
    }
    serde_json::from_str(body)
        .map_err(|e| ProviderError::Protocol(format!("failed to parse response: {e}")))
}

impl CapabilityProvider for HttpMcpProvider {
    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolDescriptor>, ProviderError>> {
        Box::pin(async move { parse_tool_list(self.send_request("tools/list", None).await?) })
    }

    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: serde_json::Value,
    ) -> BoxFuture<'a, Result<String, ProviderError>> {
        Box::pin(async move {
            let params = serde_json::to_value(ToolCallParams { name, arguments })?;
            parse_tool_call(self.send_request("tools/call", Some(params)).await?)
        })
    }
}
