//! History Bot - Main Entry Point
//!
//! Runs the Telegram bot with its health route and keep-alive task, or dumps
//! a chat's history as JSON lines and exits.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use history_bot::app::BotRuntime;
use history_bot::config::{BotSettings, TelegramConfig};
use history_bot::history::ChatId;
use history_bot::telegram::TelegramBot;

/// Telegram bot with paginated chat history reading.
#[derive(Parser, Debug)]
#[command(name = "history_bot")]
#[command(about = "Run the Telegram bot or dump a chat's history")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Print the history of this chat (id, @username or "me") as JSON lines and exit.
    #[arg(long, value_name = "CHAT")]
    history: Option<ChatId>,

    /// Maximum number of messages to print.
    #[arg(long, default_value_t = 100, requires = "history")]
    limit: usize,

    /// Identifier of the first message to request.
    #[arg(long, default_value_t = 0, requires = "history")]
    offset: i32,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Load configurations
    let tg_config = TelegramConfig::from_env()
        .context("Failed to load Telegram configuration from environment")?;

    let settings = BotSettings::from_env_with_defaults();

    if let Some(chat) = args.history {
        return dump_history(&tg_config, &settings, chat, args.limit, args.offset).await;
    }

    let runtime = BotRuntime::start(&tg_config, &settings)
        .await
        .context("Failed to start bot")?;

    info!("Bot is running. Use Ctrl+C to stop.");

    wait_for_shutdown().await;

    info!("Shutting down...");
    runtime.stop().await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},grammers_client=error,grammers_mtsender=error,grammers_session=error"
        ))
    });

    // stdout is reserved for `--history` output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Waits for SIGINT or SIGTERM.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C"),
                    _ = sigterm.recv() => info!("Received SIGTERM"),
                }
                return;
            }
            Err(e) => debug!("Could not install SIGTERM handler: {}", e),
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    info!("Received Ctrl+C");
}

/// Prints a chat's history as JSON lines.
async fn dump_history(
    config: &TelegramConfig,
    settings: &BotSettings,
    chat: ChatId,
    limit: usize,
    offset: i32,
) -> Result<()> {
    let bot = TelegramBot::connect(config)
        .await
        .context("Failed to connect to Telegram")?;
    bot.ensure_signed_in(config)
        .await
        .context("Authentication failed")?;

    info!("Reading up to {} messages from {} starting at {}", limit, chat, offset);

    let reader = bot
        .read_history(chat, limit, offset, settings.reader_config())
        .context("Invalid history arguments")?;

    let mut messages = std::pin::pin!(reader.into_stream());
    let mut count = 0usize;

    let result: Result<()> = async {
        while let Some(message) = messages.next().await {
            let message = message.context("Failed to read history")?;
            let line = serde_json::to_string(&message)?;
            writeln!(std::io::stdout().lock(), "{line}")?;
            count += 1;
        }
        Ok(())
    }
    .await;

    info!("Printed {} messages", count);
    bot.disconnect();
    result
}
