//! History Bot Library
//!
//! A Telegram bot that reads chat history in bounded pages.
//!
//! This crate provides the core functionality for:
//! - Reading chat history lazily, batch by batch
//! - Connecting to Telegram via `MTProto` with a bot token
//! - Serving a health route for uptime monitors
//! - Pinging its own public URL to avoid idling

pub mod app;
pub mod config;
pub mod history;
pub mod keepalive;
pub mod telegram;
pub mod web;
