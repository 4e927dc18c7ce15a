//! The fetch capability the reader depends on.

use async_trait::async_trait;

use super::ChatId;

/// Boxed error produced by a [`MessageFetcher`].
pub type FetchError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Retrieves messages of a chat by identifier.
///
/// Implementations must tolerate identifiers with no corresponding message
/// by omitting them from the result rather than failing.
#[async_trait]
pub trait MessageFetcher: Send + Sync {
    /// Message type handed through to the reader's consumer unchanged.
    type Message: Send;

    /// Fetches the messages with the given identifiers, in increasing order.
    async fn fetch(&self, chat: &ChatId, ids: &[i32]) -> Result<Vec<Self::Message>, FetchError>;
}
