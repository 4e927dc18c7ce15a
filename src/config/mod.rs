//! Configuration module for the bot.
//!
//! Handles loading Telegram API credentials and runtime settings
//! (health server, keep-alive, history paging) from the environment.

mod settings;

pub use settings::{BotSettings, ConfigError, TelegramConfig};
