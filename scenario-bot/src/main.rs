//! scenbot binary: run a demo scenario against Telegram. Config from env.

use anyhow::Result;
use clap::{Parser, Subcommand};
use sbot_core::init_tracing;
use sbot_telegram::{TelegramConfig, TelegramTransport};
use scenario::{Api, Scenario, TurnContext};
use scenario_bot::ScenarioBot;
use serde_json::{json, Value};
use session_store::{InMemoryStore, SessionStore};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "scenbot")]
#[command(about = "Scenario-driven Telegram bot", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the bot (config from env; token can override BOT_TOKEN).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { token } => run(token).await,
    }
}

async fn run(token: Option<String>) -> Result<()> {
    let config = TelegramConfig::load(token)?;
    init_tracing(config.log_file.as_deref())?;

    let scenario = Scenario::new(Arc::new(demo_api()), &demo_definition())
        .map_err(|e| anyhow::anyhow!("invalid demo scenario: {e}"))?;
    let transport = TelegramTransport::from_config(&config)?;
    let sessions = SessionStore::new(Arc::new(InMemoryStore::new()));

    let bot = ScenarioBot::new(Arc::new(transport), Arc::new(scenario), sessions);
    let handle = bot.start()?;
    info!("scenbot started");
    handle.await?;
    Ok(())
}

/// Capabilities used by the demo scenario.
fn demo_api() -> Api {
    Api::new()
        .register_fn("username", |ctx: &mut TurnContext, _args: &[Value]| {
            let name = ctx
                .from
                .first_name
                .clone()
                .or_else(|| ctx.from.username.clone())
                .unwrap_or_else(|| "stranger".to_string());
            Ok(Value::String(name))
        })
        .register_fn("checkNumber", |ctx: &mut TurnContext, _args: &[Value]| {
            // a non-empty result refuses the input and keeps the user where
            // they were
            match ctx.text.trim().parse::<i64>() {
                Ok(number) => {
                    ctx.stash.insert("guess".to_string(), json!(number));
                    Ok(Value::Null)
                }
                Err(_) => Ok(json!("Please send a number, or /cancel")),
            }
        })
        .register_fn("lastGuess", |ctx: &mut TurnContext, _args: &[Value]| {
            Ok(ctx.stash.get("guess").cloned().unwrap_or(Value::Null))
        })
}

/// A small greeter: `/guess` collects a number, `/help` shows one of two
/// blurbs.
fn demo_definition() -> Value {
    json!({
        "name": "root",
        "typing": true,
        "reply": "Hello, <% username %>! Try /guess or /help.",
        "menu": "/guess || /help",
        "commands": {
            "^/guess": {
                "name": "guess",
                "reply": "Send me a number",
                "menu": "/cancel",
                "commands": {
                    "^/cancel": { "name": "cancel", "goto": "/" },
                    ".": {
                        "name": "check",
                        "action": "<% checkNumber %>",
                        "reply": "Got it: <% lastGuess %>",
                        "goto": "/"
                    }
                }
            },
            "^/help": {
                "name": "help",
                "reply": "I am a scenario-driven demo bot.\n==\nStill a demo. Try /guess.",
                "goto": "/"
            }
        }
    })
}
