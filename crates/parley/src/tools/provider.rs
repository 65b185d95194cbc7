//! Capability providers: the processes or services that actually run tools.
//!
//! A provider advertises its tools with [`CapabilityProvider::list_tools`] and
//! executes them with [`CapabilityProvider::call_tool`]. Three implementations
//! ship with the crate:
//!
//! - [`LocalProvider`](super::local::LocalProvider): in-process closures.
//! - [`StdioMcpProvider`](super::mcp::StdioMcpProvider): JSON-RPC over a child
//!   process's stdin/stdout.
//! - [`HttpMcpProvider`](super::mcp::HttpMcpProvider): the same JSON-RPC
//!   messages POSTed to a URL.

use super::mcp::{HttpMcpProvider, StdioMcpProvider};
use super::registry::ToolDescriptor;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("tool error: {0}")]
    Remote(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("provider spawn failed: {0}")]
    SpawnFailed(String),

    #[error("timeout waiting for provider response")]
    Timeout,

    #[error("no capability provider connected")]
    NotConnected,
}

/// Interface to a capability provider.
///
/// Uses boxed futures so the trait stays dyn-compatible and providers can be
/// swapped at runtime behind an `Arc<dyn CapabilityProvider>`.
pub trait CapabilityProvider: Send + Sync {
    /// Tools the provider exposes, in the provider's order.
    fn list_tools(&self) -> BoxFuture<'_, Result<Vec<ToolDescriptor>, ProviderError>>;

    /// Execute one tool. `arguments` is passed through unmodified; the result
    /// is the textual content the tool produced.
    fn call_tool<'a>(
        &'a self,
        name: &'a str,
        arguments: serde_json::Value,
    ) -> BoxFuture<'a, Result<String, ProviderError>>;

    /// Release the provider's resources (child process, connections).
    fn shutdown(&self) -> BoxFuture<'_, Result<(), ProviderError>> {
        Box::pin(async { Ok(()) })
    }
}

/// How to reach a remote capability provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "transport", rename_all = "snake_case")]
pub enum ProviderSpec {
    /// Spawn `command[0]` with the remaining arguments and talk over stdio.
    Stdio {
        command: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    /// POST JSON-RPC requests to `url`.
    Http { url: String },
}

impl ProviderSpec {
    pub fn stdio<I, S>(command: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Stdio {
            command: command.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
        }
    }

    pub fn http(url: impl Into<String>) -> Self {
        Self::Http { url: url.into() }
    }

    /// Start (or reach) the provider and complete its handshake.
    pub async fn open(&self) -> Result<Arc<dyn CapabilityProvider>, ProviderError> {
        match self {
            Self::Stdio { command, env } => {
                Ok(Arc::new(StdioMcpProvider::spawn(command, env).await?))
            }
            Self::Http { url } => Ok(Arc::new(HttpMcpProvider::connect(url).await?)),
        }
    }

    /// Short human-readable description for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Stdio { command, .. } => format!("stdio:{}", command.join(" ")),
            Self::Http { url } => format!("http:{url}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_deserializes_from_tagged_json() {
        let stdio: ProviderSpec = serde_json::from_value(serde_json::json!({
            "transport": "stdio",
            "command": ["python", "weather_server.py"]
        }))
        .unwrap();
        assert_eq!(stdio, ProviderSpec::stdio(["python", "weather_server.py"]));
        assert_eq!(stdio.describe(), "stdio:python weather_server.py");

        let http: ProviderSpec = serde_json::from_value(serde_json::json!({
            "transport": "http",
            "url": "http://localhost:3001/mcp"
        }))
        .unwrap();
        assert_eq!(http, ProviderSpec::http("http://localhost:3001/mcp"));
    }

    #[tokio::test]
    async fn empty_stdio_command_fails_to_open() {
        let spec = ProviderSpec::Stdio {
            command: vec![],
            env: HashMap::new(),
        };
        let err = spec.open().await.err().unwrap();
        assert!(matches!(err, ProviderError::SpawnFailed(_)));
    }
}
