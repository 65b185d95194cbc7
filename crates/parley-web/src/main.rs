//! HTTP gateway server: the `parley` turn API over REST.
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run -p parley-web
//! OPENAI_API_KEY=sk-... cargo run -p parley-web -- --port 8080 --model gpt-4o
//! OPENAI_API_KEY=sk-... cargo run -p parley-web -- --config parley.json
//! ```
//!
//! Then, for example:
//!
//! ```bash
//! curl -X POST localhost:3001/api/provider/connect \
//!   -d '{"transport":"stdio","command":["python","weather_server.py"]}' -H 'content-type: application/json'
//! curl -X POST localhost:3001/api/conversations \
//!   -d '{"owner":"ana","message":"Weather in Delhi?"}' -H 'content-type: application/json'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use parley::prelude::*;
use parley_web::{WebConfig, spawn_web};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// HTTP server for parley conversations.
#[derive(Parser)]
#[command(about = "HTTP turn API for LLM conversations with MCP tool calling")]
struct Args {
    /// JSON settings file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Interface to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: std::net::IpAddr,

    /// Port to listen on
    #[arg(long, default_value_t = 3001)]
    port: u16,

    /// Keep conversations as JSON files in this directory
    #[arg(long)]
    store_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 1. Settings, with CLI overrides.
    let mut settings =
        GatewaySettings::load_or_default(args.config.as_deref()).map_err(|e| e.to_string())?;
    if let Some(model) = args.model {
        settings.model = model;
    }
    if let Some(dir) = args.store_dir {
        settings.store = StoreSettings::JsonFile { dir };
    }

    // 2. Collaborators.
    let client = settings.client()?;
    let store = settings.store.open().map_err(|e| e.to_string())?;
    let session = Arc::new(ProviderSession::new());
    if let Some(spec) = &settings.provider {
        info!("Connecting startup provider {}", spec.describe());
        match spec.open().await {
            Ok(provider) => {
                if let Err(e) = session.connect(provider).await {
                    warn!("Startup provider handshake failed: {e}");
                }
            }
            Err(e) => warn!("Startup provider unavailable: {e}"),
        }
    }

    // 3. Gateway and server.
    let gateway = Arc::new(
        Gateway::new(
            Arc::new(client),
            store,
            session.clone(),
            settings.orchestrator_config(),
        )
        .with_event_handler(Arc::new(LoggingHandler)),
    );
    let config = WebConfig {
        bind_addr: (args.host, args.port).into(),
    };
    let addr = spawn_web(gateway, config)
        .await
        .map_err(|e| format!("failed to bind: {e}"))?;
    println!("parley API: http://{addr}/api/health");

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for Ctrl-C: {e}"))?;
    info!("Shutting down");
    if let Err(e) = session.disconnect().await {
        warn!("Provider shutdown failed: {e}");
    }
    Ok(())
}
