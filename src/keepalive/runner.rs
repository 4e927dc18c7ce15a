//! Keep-alive runner.
//!
//! Pings the configured URL immediately and then on every interval tick.
//! A failed ping is logged and never stops the loop; only a
//! [`KeepAliveMessage::Shutdown`] or a closed channel does.

use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// Timeout applied to a single ping request.
const PING_TIMEOUT: Duration = Duration::from_secs(30);

/// Messages that can be sent to the keep-alive task.
#[derive(Debug, Clone)]
pub enum KeepAliveMessage {
    /// Ping right away without waiting for the next tick.
    PingNow,
    /// Stop the keep-alive task.
    Shutdown,
}

/// Errors building the keep-alive task.
#[derive(Debug, Error)]
pub enum KeepAliveError {
    #[error("Invalid keep-alive URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Result of a single ping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    /// The URL answered 200.
    Healthy,
    /// The URL answered with another status.
    Unexpected(StatusCode),
    /// The request did not complete.
    Failed(String),
}

/// Periodic self-ping task.
pub struct KeepAlive {
    /// HTTP client reused across pings.
    client: reqwest::Client,

    /// URL to ping.
    url: reqwest::Url,

    /// Time between pings.
    interval: Duration,
}

impl KeepAlive {
    /// Creates a new keep-alive task.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is not an absolute http(s) URL or the HTTP
    /// client cannot be built.
    pub fn new(url: &str, interval: Duration) -> Result<Self, KeepAliveError> {
        let parsed = reqwest::Url::parse(url).map_err(|e| KeepAliveError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(KeepAliveError::InvalidUrl {
                url: url.to_owned(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let client = reqwest::Client::builder().timeout(PING_TIMEOUT).build()?;

        Ok(Self {
            client,
            url: parsed,
            interval,
        })
    }

    /// Runs the keep-alive loop.
    pub async fn run(&self, mut rx: mpsc::Receiver<KeepAliveMessage>) {
        info!("Keep-alive started for {} every {:?}", self.url, self.interval);

        let mut ping_timer = interval(self.interval);
        ping_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ping_timer.tick() => {
                    self.ping().await;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(KeepAliveMessage::PingNow) => {
                            debug!("Received ping-now message");
                            self.ping().await;
                        }
                        Some(KeepAliveMessage::Shutdown) | None => {
                            info!("Keep-alive shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Pings the URL once and logs the outcome.
    pub async fn ping(&self) -> PingOutcome {
        let outcome = match self.client.get(self.url.clone()).send().await {
            Ok(response) if response.status() == StatusCode::OK => PingOutcome::Healthy,
            Ok(response) => PingOutcome::Unexpected(response.status()),
            Err(e) => PingOutcome::Failed(e.to_string()),
        };

        match &outcome {
            PingOutcome::Healthy => info!("Keep-alive ping to {} successful", self.url),
            PingOutcome::Unexpected(status) => {
                warn!("Keep-alive ping failed. Status code: {}", status.as_u16());
            }
            PingOutcome::Failed(e) => error!("Keep-alive error: {}", e),
        }

        outcome
    }
}

impl std::fmt::Debug for KeepAlive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAlive")
            .field("url", &self.url.as_str())
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
