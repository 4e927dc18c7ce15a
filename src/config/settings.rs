//! Application settings and Telegram configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::history::{ChatId, DEFAULT_BATCH_SIZE, ReaderConfig};

/// Telegram API configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Telegram API ID (obtain from <https://my.telegram.org>).
    pub api_id: i32,

    /// Telegram API hash (obtain from <https://my.telegram.org>).
    pub api_hash: String,

    /// Bot token issued by @BotFather.
    pub bot_token: String,

    /// Path to the session file.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,

    /// Delete any existing session file before connecting.
    #[serde(default = "default_reset_session")]
    pub reset_session: bool,

    /// Flood waits up to this many seconds are slept through and retried.
    #[serde(default = "default_flood_sleep_threshold")]
    pub flood_sleep_threshold_secs: u32,
}

fn default_session_path() -> PathBuf {
    PathBuf::from("bot.session")
}

const fn default_reset_session() -> bool {
    true
}

const fn default_flood_sleep_threshold() -> u32 {
    7
}

impl TelegramConfig {
    /// Creates a new Telegram configuration.
    #[must_use]
    pub fn new(api_id: i32, api_hash: String, bot_token: String) -> Self {
        Self {
            api_id,
            api_hash,
            bot_token,
            session_path: default_session_path(),
            reset_session: default_reset_session(),
            flood_sleep_threshold_secs: default_flood_sleep_threshold(),
        }
    }

    /// Creates configuration from environment variables.
    ///
    /// Expects `TG_API_ID`, `TG_API_HASH` and `TG_BOT_TOKEN` to be set.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if required keys are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_id: i32 = lookup("TG_API_ID")
            .ok_or(ConfigError::MissingEnvVar("TG_API_ID"))?
            .trim()
            .parse()
            .ok()
            .filter(|id| *id > 0)
            .ok_or(ConfigError::InvalidApiId)?;

        let api_hash = required(&lookup, "TG_API_HASH")?;
        let bot_token = required(&lookup, "TG_BOT_TOKEN")?;

        Ok(Self {
            api_id,
            api_hash,
            bot_token,
            session_path: lookup("TG_SESSION_PATH").map_or_else(default_session_path, PathBuf::from),
            reset_session: parse_or(&lookup, "TG_RESET_SESSION", default_reset_session()),
            flood_sleep_threshold_secs: parse_or(
                &lookup,
                "TG_FLOOD_SLEEP_THRESHOLD",
                default_flood_sleep_threshold(),
            ),
        })
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_id", &self.api_id)
            .field("session_path", &self.session_path)
            .field("reset_session", &self.reset_session)
            .field("flood_sleep_threshold_secs", &self.flood_sleep_threshold_secs)
            .finish_non_exhaustive()
    }
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Chat that receives the restart notice.
    #[serde(skip)]
    pub log_channel: Option<ChatId>,

    /// Address the health server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Port the health server listens on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Public URL pinged by the keep-alive task. Keep-alive is off when unset.
    pub app_url: Option<String>,

    /// Seconds between keep-alive pings.
    #[serde(default = "default_keep_alive_interval")]
    pub keep_alive_interval_secs: u64,

    /// Maximum messages requested per history batch.
    #[serde(default = "default_history_batch_size")]
    pub history_batch_size: usize,

    /// End history reads on the first short batch. When false, reads end on
    /// the first empty batch instead.
    #[serde(default = "default_history_stop_on_short_batch")]
    pub history_stop_on_short_batch: bool,

    /// UTC offset in minutes used for the restart notice timestamp.
    #[serde(default = "default_tz_offset_minutes")]
    pub tz_offset_minutes: i32,

    /// JSON string returned by the health route.
    #[serde(default = "default_health_message")]
    pub health_message: String,
}

const fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

const fn default_port() -> u16 {
    8080
}

const fn default_keep_alive_interval() -> u64 {
    7 * 60
}

const fn default_history_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

const fn default_history_stop_on_short_batch() -> bool {
    true
}

const fn default_tz_offset_minutes() -> i32 {
    5 * 60 + 30 // Asia/Kolkata
}

fn default_health_message() -> String {
    "Bot is alive".to_owned()
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            log_channel: None,
            bind_address: default_bind_address(),
            port: default_port(),
            app_url: None,
            keep_alive_interval_secs: default_keep_alive_interval(),
            history_batch_size: default_history_batch_size(),
            history_stop_on_short_batch: default_history_stop_on_short_batch(),
            tz_offset_minutes: default_tz_offset_minutes(),
            health_message: default_health_message(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates bot settings from an arbitrary key lookup.
    ///
    /// Unparseable values fall back to their defaults.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let app_url = lookup("APP_URL")
            .map(|url| url.trim().to_owned())
            .filter(|url| !url.is_empty());

        let history_batch_size = parse_or(&lookup, "HISTORY_BATCH_SIZE", default_history_batch_size());

        Self {
            log_channel: parse_log_channel(lookup("LOG_CHANNEL")),
            bind_address: parse_or(&lookup, "BIND_ADDRESS", default_bind_address()),
            port: parse_or(&lookup, "PORT", default_port()),
            app_url,
            keep_alive_interval_secs: parse_or(
                &lookup,
                "KEEP_ALIVE_INTERVAL_SECS",
                default_keep_alive_interval(),
            )
            .max(1),
            history_batch_size: if history_batch_size == 0 {
                default_history_batch_size()
            } else {
                history_batch_size
            },
            history_stop_on_short_batch: parse_or(
                &lookup,
                "HISTORY_STOP_ON_SHORT_BATCH",
                default_history_stop_on_short_batch(),
            ),
            tz_offset_minutes: parse_or(&lookup, "TZ_OFFSET_MINUTES", default_tz_offset_minutes()),
            health_message: lookup("HEALTH_MESSAGE").unwrap_or_else(default_health_message),
        }
    }

    /// Socket address of the health server.
    #[must_use]
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }

    /// Interval between keep-alive pings.
    #[must_use]
    pub fn keep_alive_interval(&self) -> Duration {
        Duration::from_secs(self.keep_alive_interval_secs)
    }

    /// Reader tunables derived from these settings.
    #[must_use]
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            batch_size: self.history_batch_size,
            stop_on_short_batch: self.history_stop_on_short_batch,
        }
    }
}

/// Parses `LOG_CHANNEL`, warning when a non-empty value is unusable.
fn parse_log_channel(value: Option<String>) -> Option<ChatId> {
    let value = value.filter(|v| !v.trim().is_empty())?;
    match value.parse() {
        Ok(chat) => Some(chat),
        Err(e) => {
            warn!("Ignoring LOG_CHANNEL={:?}: {}. Restart notices are disabled", value, e);
            None
        }
    }
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<String, ConfigError> {
    lookup(key)
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::MissingEnvVar(key))
}

fn parse_or<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Invalid API ID format (must be a positive integer)")]
    InvalidApiId,
}
