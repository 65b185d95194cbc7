//! HTTP turn API for `parley` gateways.
//!
//! `parley-web` wraps a [`Gateway`](parley::gateway::Gateway) in an axum
//! server: conversations are created, listed, fetched and deleted over REST,
//! turns are posted to `/api/conversations/{id}/turn`, and the capability
//! provider can be connected or swapped at runtime.
//!
//! # Quick start
//!
//! ```ignore
//! use parley::prelude::*;
//! use parley_web::{WebConfig, spawn_web};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(Gateway::new(backend, store, session, OrchestratorConfig::default()));
//! let addr = spawn_web(gateway, WebConfig::default()).await?;
//! println!("API: http://{addr}/api/health");
//! ```
//!
//! # Routes
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | `POST` | `/api/conversations` | Create a conversation from its first message and run that turn |
//! | `GET` | `/api/conversations?owner=` | List an owner's conversations, newest first |
//! | `GET` | `/api/conversations/{id}` | One conversation with its full history |
//! | `DELETE` | `/api/conversations/{id}` | Delete a conversation |
//! | `POST` | `/api/conversations/{id}/turn` | Run a turn |
//! | `POST` | `/api/provider/connect` | Connect a stdio or HTTP MCP provider |
//! | `POST` | `/api/provider/disconnect` | Disconnect the provider |
//! | `GET` | `/api/tools` | Tools currently available to the model |
//! | `GET` | `/api/health` | Liveness and provider status |

mod api;
mod server;

pub use api::ApiError;
pub use server::build_router;

use parley::gateway::Gateway;
use std::net::SocketAddr;
use std::sync::Arc;

/// Configuration for the web server.
pub struct WebConfig {
    /// Address to bind to. Default: `127.0.0.1:3001`.
    pub bind_addr: SocketAddr,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
        }
    }
}

/// Spawn the web server on a Tokio task and return the bound address.
///
/// The server runs until the Tokio runtime shuts down. Bind to port 0 to
/// get a free port (the returned address carries the real one).
pub async fn spawn_web(gateway: Arc<Gateway>, config: WebConfig) -> std::io::Result<SocketAddr> {
    let router = server::build_router(gateway);
    server::start_server(router, config.bind_addr).await
}
