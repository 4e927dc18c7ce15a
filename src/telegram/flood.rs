//! Flood-wait handling for Telegram API calls.
//!
//! Telegram answers rate-limited calls with `FLOOD_WAIT_<seconds>`. Short
//! waits are slept through so callers never see them; anything above the
//! threshold is surfaced as an error.

use std::time::Duration;

use tracing::{debug, warn};

/// Policy deciding which flood waits are absorbed by sleeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloodPolicy {
    /// Longest wait that is slept through automatically.
    sleep_threshold: Duration,
}

impl FloodPolicy {
    /// Creates a policy with the specified sleep threshold.
    #[must_use]
    pub const fn new(sleep_threshold: Duration) -> Self {
        Self { sleep_threshold }
    }

    /// Creates a policy from seconds.
    #[must_use]
    pub fn from_secs(secs: u32) -> Self {
        Self::new(Duration::from_secs(u64::from(secs)))
    }

    /// Returns how long to sleep before retrying, or `None` if the wait
    /// is too long to absorb.
    #[must_use]
    pub fn sleep_for(&self, wait_seconds: u32) -> Option<Duration> {
        let wait = Duration::from_secs(u64::from(wait_seconds));
        (wait <= self.sleep_threshold).then_some(wait)
    }

    /// Sleeps through a flood wait if the policy allows it.
    ///
    /// Returns true if the caller should retry.
    pub async fn absorb(&self, wait_seconds: u32) -> bool {
        match self.sleep_for(wait_seconds) {
            Some(wait) => {
                debug!("Sleeping {:?} for flood wait before retrying", wait);
                tokio::time::sleep(wait).await;
                true
            }
            None => {
                warn!(
                    "Flood wait of {} seconds exceeds threshold of {:?}",
                    wait_seconds, self.sleep_threshold
                );
                false
            }
        }
    }
}

/// Extracts flood wait seconds from an error message.
pub(crate) fn extract_flood_wait_seconds(err_msg: &str) -> Option<u32> {
    let patterns = ["FLOOD_WAIT_", "flood wait "];
    let lowered = err_msg.to_lowercase();

    for pattern in patterns {
        if let Some(idx) = lowered.find(&pattern.to_lowercase()) {
            let start = idx + pattern.len();
            let num_str: String = lowered[start..]
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if let Ok(seconds) = num_str.parse() {
                return Some(seconds);
            }
        }
    }

    // grammers renders RPC errors as `rpc error 420: FLOOD_WAIT caused by ... (value: 30)`
    if lowered.contains("flood_wait") {
        let idx = lowered.find("value: ")?;
        let num_str: String = lowered[idx + "value: ".len()..]
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        return num_str.parse().ok();
    }

    None
}
