//! Interactive terminal chat against an OpenAI-compatible API, with tools
//! from an MCP capability provider.
//!
//! Reads the API key from `OPENAI_API_KEY` (or the variable named in the
//! settings file).
//!
//! # Examples
//!
//! ```sh
//! # Plain chat, conversations kept in memory
//! parley
//!
//! # Tools from a stdio MCP server, history on disk
//! parley --mcp-command python --mcp-arg weather_server.py --store-dir ./conversations
//!
//! # Tools from an HTTP MCP server, settings from a file
//! parley --config parley.json --mcp-url http://localhost:8000/mcp
//!
//! # Built-in demo tools, no provider needed
//! parley --demo-tools --model gpt-4o
//! ```
//!
//! Lines starting with `/` are commands: `/new`, `/list`, `/open <id>`,
//! `/tools`, `/quit`. Ctrl-C stops the running turn after the current round.

use chrono::{FixedOffset, Utc};
use clap::Parser;
use parley::prelude::*;
use schemars::JsonSchema;
use serde::Deserialize;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Interactive chat with tool calling through an MCP capability provider.
#[derive(Parser)]
#[command(name = "parley")]
struct Cli {
    /// JSON settings file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    // ── Model ──────────────────────────────────────────────────
    /// Model identifier
    #[arg(long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum model requests per turn
    #[arg(long)]
    max_rounds: Option<u32>,

    /// Run the tool calls of one round concurrently
    #[arg(long)]
    parallel_tools: bool,

    // ── Provider ───────────────────────────────────────────────
    /// Program to spawn as a stdio MCP server
    #[arg(long, conflicts_with = "mcp_url")]
    mcp_command: Option<String>,

    /// Argument for --mcp-command (repeatable)
    #[arg(long = "mcp-arg", requires = "mcp_command")]
    mcp_args: Vec<String>,

    /// URL of an HTTP MCP server
    #[arg(long)]
    mcp_url: Option<String>,

    /// Serve a built-in clock tool instead of connecting to a provider
    #[arg(long, conflicts_with_all = ["mcp_command", "mcp_url"])]
    demo_tools: bool,

    // ── Conversations ──────────────────────────────────────────
    /// Keep conversations as JSON files in this directory
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Owner recorded on new conversations
    #[arg(long, default_value = "local")]
    owner: String,

    // ── Output ─────────────────────────────────────────────────
    /// Log filter when RUST_LOG is unset (e.g. "debug", "parley=trace")
    #[arg(long, default_value = "warn")]
    log: String,
}

impl Cli {
    fn settings(&self) -> Result<GatewaySettings, String> {
        let mut settings =
            GatewaySettings::load_or_default(self.config.as_deref()).map_err(|e| e.to_string())?;
        if let Some(model) = &self.model {
            settings.model.clone_from(model);
        }
        if let Some(url) = &self.base_url {
            settings.base_url.clone_from(url);
        }
        if let Some(rounds) = self.max_rounds {
            settings.max_rounds = rounds;
        }
        if self.parallel_tools {
            settings.parallel_tools = true;
        }
        if let Some(dir) = &self.store_dir {
            settings.store = StoreSettings::JsonFile { dir: dir.clone() };
        }
        if let Some(command) = &self.mcp_command {
            let mut argv = vec![command.clone()];
            argv.extend(self.mcp_args.iter().cloned());
            settings.provider = Some(ProviderSpec::stdio(argv));
        } else if let Some(url) = &self.mcp_url {
            settings.provider = Some(ProviderSpec::http(url));
        }
        Ok(settings)
    }
}

// ── Demo tool ──────────────────────────────────────────────────────

#[derive(Deserialize, JsonSchema)]
struct ClockArgs {
    /// Offset from UTC in whole hours, e.g. 5 or -3. Defaults to UTC.
    #[serde(default)]
    utc_offset_hours: Option<i32>,
}

fn demo_provider() -> LocalProvider {
    LocalProvider::new().with(FnTool::new(
        ToolDescriptor::new(
            "current_time",
            "Current date and time, optionally at a fixed UTC offset.",
            json_schema_for::<ClockArgs>(),
        ),
        |args: ClockArgs| async move {
            let hours = args.utc_offset_hours.unwrap_or(0);
            let offset = FixedOffset::east_opt(hours * 3600)
                .ok_or_else(|| format!("invalid UTC offset: {hours} hours"))?;
            Ok(Utc::now().with_timezone(&offset).to_rfc3339())
        },
    ))
}

// ── Chat loop ──────────────────────────────────────────────────────

fn print_tools(session: &ProviderSession) {
    let tools = session.registry().list();
    if tools.is_empty() {
        println!("(no tools available)");
    }
    for tool in tools {
        println!("  {:<24} {}", tool.name, tool.description);
    }
}

async fn print_conversations(gateway: &Gateway, owner: &str) {
    match gateway.list_conversations(owner).await {
        Ok(list) if list.is_empty() => println!("(no conversations)"),
        Ok(list) => {
            for c in list {
                println!(
                    "  #{:<5} {:<40} {} message(s), updated {}",
                    c.id,
                    c.title,
                    c.message_count,
                    c.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Err(e) => eprintln!("Error: {e}"),
    }
}

fn print_reply(reply: &TurnReply) {
    println!("\n{}\n", reply.answer);
    if reply.status == TurnStatus::ExhaustedToolLoop {
        eprintln!("  (stopped after {} rounds)", reply.rounds_used);
    }
}

async fn chat_loop(gateway: &Gateway, owner: &str, stop: Arc<AtomicBool>) {
    let mut current: Option<ConversationId> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("parley: type a message, /help for commands.");
    loop {
        eprint!("> ");
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: failed to read stdin: {e}");
                break;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            let mut parts = command.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("quit" | "exit"), _) => break,
                (Some("new"), _) => {
                    current = None;
                    println!("(new conversation starts with your next message)");
                }
                (Some("list"), _) => print_conversations(gateway, owner).await,
                (Some("open"), Some(id)) => match id.parse::<ConversationId>() {
                    Ok(id) => match gateway.conversation(id).await {
                        Ok(c) => {
                            println!("(switched to #{} \"{}\")", c.id, c.title);
                            current = Some(c.id);
                        }
                        Err(e) => eprintln!("Error: {e}"),
                    },
                    Err(_) => eprintln!("Error: '{id}' is not a conversation id"),
                },
                (Some("tools"), _) => print_tools(gateway.session()),
                _ => println!("commands: /new /list /open <id> /tools /quit"),
            }
            continue;
        }

        stop.store(false, Ordering::SeqCst);
        let result = match current {
            Some(id) => {
                let stop = stop.clone();
                gateway
                    .turn_until(id, line, move || stop.load(Ordering::SeqCst))
                    .await
            }
            None => gateway
                .start_conversation(owner, line)
                .await
                .map(|(overview, reply)| {
                    println!("(conversation #{} \"{}\")", overview.id, overview.title);
                    current = Some(overview.id);
                    reply
                }),
        };

        match result {
            Ok(reply) => print_reply(&reply),
            Err(GatewayError::Turn {
                conversation_id,
                source,
            }) => {
                current = Some(conversation_id);
                eprintln!("Error: {source}");
            }
            Err(e) => eprintln!("Error: {e}"),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = match cli.settings() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    let client = match settings.client() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to create API client: {e}");
            process::exit(1);
        }
    };

    let store = match settings.store.open() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to open conversation store: {e}");
            process::exit(1);
        }
    };

    let session = Arc::new(ProviderSession::new());
    let provider: Option<Result<Arc<dyn CapabilityProvider>, ProviderError>> = if cli.demo_tools {
        Some(Ok(Arc::new(demo_provider())))
    } else if let Some(spec) = &settings.provider {
        eprintln!("Connecting to {}...", spec.describe());
        Some(spec.open().await)
    } else {
        None
    };
    if let Some(provider) = provider {
        match provider {
            Ok(p) => match session.connect(p).await {
                Ok(tools) => eprintln!("{} tool(s) available", tools.len()),
                Err(e) => eprintln!("Warning: provider handshake failed, chatting without tools: {e}"),
            },
            Err(e) => eprintln!("Warning: could not start provider, chatting without tools: {e}"),
        }
    }

    let gateway = Gateway::new(
        Arc::new(client),
        store,
        session.clone(),
        settings.orchestrator_config(),
    )
    .with_event_handler(Arc::new(LoggingHandler));

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if ctrl_c_stop.swap(true, Ordering::SeqCst) {
                // Second Ctrl-C while already stopping.
                process::exit(130);
            }
            eprintln!("\n(stopping after the current round, Ctrl-C again to quit)");
        }
    });

    chat_loop(&gateway, &cli.owner, stop).await;

    if let Err(e) = session.disconnect().await {
        warn!("Provider shutdown failed: {e}");
    }
}
