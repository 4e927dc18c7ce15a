//! Periodic self-ping module.
//!
//! Keeps free-tier hosts from idling the process by requesting the bot's
//! own public URL on a fixed interval.

mod runner;

pub use runner::{KeepAlive, KeepAliveError, KeepAliveMessage, PingOutcome};
