//! Paginated chat history reading.
//!
//! The reader walks a chat's message identifiers in bounded batches and hands
//! each message to the caller as soon as its batch arrives. Fetching itself is
//! delegated to a [`MessageFetcher`], so the reader knows nothing about
//! Telegram.

mod chat;
mod fetcher;
mod reader;

pub use chat::{ChatId, ChatIdError};
pub use fetcher::{FetchError, MessageFetcher};
pub use reader::{HistoryError, HistoryReader, ReaderConfig};

/// Upper bound on the number of identifiers requested per batch.
pub const DEFAULT_BATCH_SIZE: usize = 200;
