//! MCP provider speaking newline-delimited JSON-RPC over a child process's
//! stdin/stdout.

use super::protocol::{
    InitializeParams, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, ToolCallParams,
    parse_tool_call, parse_tool_list,
};
use crate::tools::provider::{CapabilityProvider, ProviderError};
use crate::tools::registry::ToolDescriptor;
use futures::future::BoxFuture;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Environment variables passed through to the child. Everything else is
/// cleared so secrets such as the LLM API key do not leak into it.
const INHERITED_ENV: [&str; 5] = ["PATH", "HOME", "USER", "LANG", "TERM"];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct StdioMcpProvider {
    program: String,
    next_id: AtomicU64,
    stdin: Mutex<ChildStdin>,
    stdout: Mutex<BufReader<ChildStdout>>,
    child: Mutex<Option<Child>>,
}

impl StdioMcpProvider {
    /// Spawn `command` and perform the `initialize` handshake.
    pub async fn spawn(
        command: &[String],
        env: &HashMap<String, String>,
    ) -> Result<Self, ProviderError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| ProviderError::SpawnFailed("empty command".into()))?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .env_clear();
        for key in INHERITED_ENV {
            if let Ok(val) = std::env::var(key) {
                cmd.env(key, val);
            }
        }
        cmd.envs(env);

        let mut child = cmd
            .spawn()
            .map_err(|e| ProviderError::SpawnFailed(format!("failed to spawn '{program}': {e}")))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ProviderError::SpawnFailed("failed to capture stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProviderError::SpawnFailed("failed to capture stdout".into()))?;

        let provider = Self {
            program: program.clone(),
            next_id: AtomicU64::new(1),
            stdin: Mutex::new(stdin),
            stdout: Mutex::new(BufReader::new(stdout)),
            child: Mutex::new(Some(child)),
        };
        provider.initialize().await?;
        info!("MCP provider '{}' started", provider.program);
        Ok(provider)
    }

    async fn initialize(&self) -> Result<(), ProviderError> {
        let params = serde_json::to_value(InitializeParams::default())?;
        let response = self.send_request("initialize", Some(params)).await?;
        debug!("MCP provider '{}' initialized: {response}", self.program);
        self.write_line(&JsonRpcNotification::new("notifications/initialized"))
            .await
    }

    async fn write_line(&self, message: &impl Serialize) -> Result<(), ProviderError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');
        let mut stdin = self.stdin.lock().await;
        stdin.write_all(line.as_bytes()).await?;
        stdin.flush().await?;
        Ok(())
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Hold the reader for the whole exchange so concurrent requests
        // cannot steal each other's responses.
        let mut stdout = self.stdout.lock().await;
        self.write_line(&JsonRpcRequest::new(id, method, params))
            .await?;
        let response = tokio::time::timeout(REQUEST_TIMEOUT, read_response(&mut stdout, id))
            .await
            .map_err(|_| ProviderError::Timeout)??;
        response.into_result()
    }
}

/// Read lines until the response carrying `expected_id`. Notifications, other
/// ids and non-JSON log lines are skipped.
async fn read_response(
    stdout: &mut BufReader<ChildStdout>,
    expected_id: u64,
) -> Result<JsonRpcResponse, ProviderError> {
    let mut buf = String::new();
    loop {
        buf.clear();
        if stdout.read_line(&mut buf).await? == 0 {
            return Err(ProviderError::Transport("provider closed stdout".into()));
        }
        let trimmed = buf.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<JsonRpcResponse>(trimmed) {
            Ok(resp) if resp.id == Some(expected_id) => return Ok(resp),
            Ok(resp) => debug!("skipping JSON-RPC message with id {:?}", resp.id),
            Err(_) => debug!("ignoring non-JSON-RPC line from provider: {trimmed}"),
        }
    }
}

impl CapabilityProvider for StdioMcpProvider {
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

    fn shutdown(&self) -> BoxFuture<'_, Result<(), ProviderError>> {
        Box::pin(async move {
            if let Some(mut child) = self.child.lock().await.take() {
                let _ = child.kill().await;
                let _ = child.wait().await;
                info!("MCP provider '{}' stopped", self.program);
            }
            Ok(())
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    /// A shell script answering the handshake, one `tools/list` and one
    /// `tools/call`, with a stray log line in between.
    const FAKE_SERVER: &str = r#"
read line; echo '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{}}}'
read line
read line; echo 'weather server ready'; echo '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"get_weather","description":"Weather","inputSchema":{"type":"object","properties":{"location":{"type":"string"}}}}]}}'
read line; echo '{"jsonrpc":"2.0","id":3,"result":{"content":[{"type":"text","text":"34C and clear"}]}}'
read line
"#;

    fn command() -> Vec<String> {
        vec!["sh".into(), "-c".into(), FAKE_SERVER.into()]
    }

    #[tokio::test]
    async fn handshake_list_and_call() {
        let provider = StdioMcpProvider::spawn(&command(), &HashMap::new())
            .await
            .unwrap();

        let tools = provider.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_weather");

        let out = provider
            .call_tool("get_weather", serde_json::json!({"location": "Delhi"}))
            .await
            .unwrap();
        assert_eq!(out, "34C and clear");

        provider.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let err = StdioMcpProvider::spawn(&["/nonexistent/mcp-server".into()], &HashMap::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::SpawnFailed(_)));
    }

    #[tokio::test]
    async fn closed_stdout_is_a_transport_error() {
        let err = StdioMcpProvider::spawn(&["true".into()], &HashMap::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::Transport(_) | ProviderError::Io(_)));
    }
}
