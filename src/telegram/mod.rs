//! Telegram client wrapper module.
//!
//! Provides high-level abstractions for interacting with Telegram:
//! bot authentication, identity lookup, chat resolution, message
//! fetching for the history reader, and flood-wait handling.

mod client;
mod flood;
mod identity;
mod message;

pub use client::{TelegramBot, TelegramError};
pub use flood::FloodPolicy;
pub use identity::BotIdentity;
pub use message::{ChatMessage, ResolvedChat};

/// MTProto layer the client library speaks.
pub const LAYER: i32 = grammers_tl_types::LAYER;
