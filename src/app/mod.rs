//! Bot lifecycle: start-up, restart notice and shutdown.

mod notice;
mod runtime;

pub use notice::{offset_from_minutes, restart_text};
pub use runtime::{BotRuntime, StartError};
