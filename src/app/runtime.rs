//! Start-up and shutdown of the bot process.
//!
//! `start` runs these steps in order:
//! 1. Connect and sign in with the bot token
//! 2. Capture the bot identity
//! 3. Post the restart notice to the log chat (best effort)
//! 4. Start the health server
//! 5. Spawn the keep-alive task if a public URL is configured
//!
//! `stop` unwinds them in reverse.

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::notice::{offset_from_minutes, restart_text};
use crate::config::{BotSettings, TelegramConfig};
use crate::keepalive::{KeepAlive, KeepAliveError, KeepAliveMessage};
use crate::telegram::{BotIdentity, LAYER, TelegramBot, TelegramError};
use crate::web::{WebError, WebServer};

/// Errors raised while starting the bot.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Web(#[from] WebError),

    #[error(transparent)]
    KeepAlive(#[from] KeepAliveError),
}

/// Handle to a running keep-alive task.
#[derive(Debug)]
struct KeepAliveHandle {
    tx: mpsc::Sender<KeepAliveMessage>,
    task: JoinHandle<()>,
}

/// A started bot with its background tasks.
#[derive(Debug)]
pub struct BotRuntime {
    bot: TelegramBot,
    identity: BotIdentity,
    web: WebServer,
    keep_alive: Option<KeepAliveHandle>,
}

impl BotRuntime {
    /// Runs the start-up sequence.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting, signing in, or binding the health
    /// server fails. A failed restart notice is only logged.
    pub async fn start(config: &TelegramConfig, settings: &BotSettings) -> Result<Self, StartError> {
        let bot = TelegramBot::connect(config).await?;
        bot.ensure_signed_in(config).await?;

        let identity = bot.fetch_identity().await?;
        info!(
            "{} (layer {}) started on {}.",
            identity.display_name(),
            LAYER,
            identity.mention()
        );

        if let Some(log_channel) = &settings.log_channel {
            let now = Utc::now().with_timezone(&offset_from_minutes(settings.tz_offset_minutes));
            if let Err(e) = bot.send_text(log_channel, &restart_text(&identity, &now)).await {
                warn!("Failed to send restart notice to {}: {}", log_channel, e);
            }
        }

        let web = match WebServer::start(settings.listen_addr(), &settings.health_message).await {
            Ok(web) => web,
            Err(e) => {
                bot.disconnect();
                return Err(e.into());
            }
        };

        let keep_alive = match settings.app_url.as_deref().map(|url| spawn_keep_alive(url, settings)) {
            Some(Ok(handle)) => Some(handle),
            Some(Err(e)) => {
                web.stop().await;
                bot.disconnect();
                return Err(e.into());
            }
            None => {
                info!("APP_URL not set, keep-alive disabled");
                None
            }
        };

        Ok(Self {
            bot,
            identity,
            web,
            keep_alive,
        })
    }

    /// Stops background tasks and disconnects.
    pub async fn stop(self) {
        if let Some(keep_alive) = self.keep_alive {
            let _ = keep_alive.tx.send(KeepAliveMessage::Shutdown).await;
            let _ = keep_alive.task.await;
        }

        self.web.stop().await;
        self.bot.disconnect();
        info!("{} stopped. Bye.", self.identity.display_name());
    }
}

fn spawn_keep_alive(url: &str, settings: &BotSettings) -> Result<KeepAliveHandle, KeepAliveError> {
    let keep_alive = KeepAlive::new(url, settings.keep_alive_interval())?;
    let (tx, rx) = mpsc::channel::<KeepAliveMessage>(8);

    let task = tokio::spawn(async move {
        keep_alive.run(rx).await;
    });

    Ok(KeepAliveHandle { tx, task })
}
