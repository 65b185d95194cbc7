//! Local tools example: serve in-process tools to the model through a
//! `LocalProvider` and run a short conversation through the `Gateway`.
//!
//! Demonstrates:
//! - Typed argument structs with `Deserialize` + `JsonSchema`
//! - Conditional tool registration with `with_if`
//! - Observing a turn with `CompositeEventHandler`
//!
//! # Usage
//!
//! ```bash
//! OPENAI_API_KEY=sk-... cargo run --example local_tools
//! OPENAI_API_KEY=sk-... cargo run --example local_tools -- --with-converter
//! ```

use parley::prelude::*;
use parley::schemars;
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

// ── Typed argument structs ──────────────────────────────────────────

/// Arguments for the `get_weather` tool.
#[derive(Deserialize, JsonSchema)]
struct WeatherArgs {
    /// City name, e.g. "Delhi".
    location: String,
}

/// Arguments for the `convert_temperature` tool.
#[derive(Deserialize, JsonSchema)]
struct ConvertArgs {
    /// Temperature in degrees Celsius.
    celsius: f64,
}

// ── Tool constructors ───────────────────────────────────────────────

/// Canned weather lookup (a real tool would call a weather API).
fn weather_tool() -> FnTool {
    FnTool::new(
        ToolDescriptor::new(
            "get_weather",
            "Current weather for a city: temperature in Celsius and conditions.",
            json_schema_for::<WeatherArgs>(),
        ),
        |args: WeatherArgs| async move {
            if args.location.trim().is_empty() {
                return Err("location must not be empty".to_string());
            }
            Ok(serde_json::json!({
                "location": args.location,
                "temperature_c": 34,
                "conditions": "clear",
            })
            .to_string())
        },
    )
}

fn converter_tool() -> FnTool {
    FnTool::new(
        ToolDescriptor::new(
            "convert_temperature",
            "Convert a Celsius temperature to Fahrenheit.",
            json_schema_for::<ConvertArgs>(),
        ),
        |args: ConvertArgs| async move { Ok(format!("{:.1}", args.celsius * 9.0 / 5.0 + 32.0)) },
    )
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let with_converter = std::env::args().any(|a| a == "--with-converter");

    let api_key = std::env::var("OPENAI_API_KEY")
        .map_err(|_| "Set OPENAI_API_KEY to your API key".to_string())?;
    let client = OpenAiClient::new(api_key)?;

    // 1. Tools.
    let provider = LocalProvider::new()
        .with(weather_tool())
        .with_if(with_converter, converter_tool());
    let session = Arc::new(ProviderSession::new());
    let tools = session
        .connect(Arc::new(provider))
        .await
        .map_err(|e| e.to_string())?;
    println!("{} tool(s) registered", tools.len());

    // 2. Print tool activity as it happens.
    let handler = CompositeEventHandler::new()
        .with(LoggingHandler)
        .with(FnEventHandler::new(|event: &TurnEvent<'_>| {
            if let TurnEvent::ToolResult {
                name,
                success,
                content,
                ..
            } = event
            {
                println!("  [{name}] {} {content}", if *success { "ok" } else { "failed" });
            }
        }));

    // 3. Gateway over an in-memory store.
    let gateway = Gateway::new(
        Arc::new(client),
        Arc::new(MemoryStore::new()),
        session,
        OrchestratorConfig::new(parley::DEFAULT_MODEL).with_parallel_tools(true),
    )
    .with_event_handler(Arc::new(handler));

    let (conversation, reply) = gateway
        .start_conversation("example", "What's the weather in Delhi, in Fahrenheit too?")
        .await
        .map_err(|e| e.to_string())?;
    println!("[{}]\n{}\n", conversation.title, reply.answer);

    let reply = gateway
        .turn(conversation.id, "And how about Pune?")
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", reply.answer);

    let stored = gateway
        .conversation(conversation.id)
        .await
        .map_err(|e| e.to_string())?;
    println!("--- {} message(s) persisted ---", stored.messages.len());
    Ok(())
}
