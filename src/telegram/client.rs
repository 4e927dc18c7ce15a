//! Telegram client wrapper for the history bot.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use grammers_client::{Client, InvocationError, SenderPool, sender};
use grammers_session::storages::SqliteSession;
use grammers_session::types::{PeerAuth, PeerId, PeerRef};
use grammers_tl_types as tl;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::flood::{FloodPolicy, extract_flood_wait_seconds};
use super::message::{ChatMessage, ResolvedChat, collect_messages, input_message_ids, resolve_offline};
use super::BotIdentity;
use crate::config::TelegramConfig;
use crate::history::{ChatId, FetchError, HistoryError, HistoryReader, MessageFetcher, ReaderConfig};

/// Errors that can occur during Telegram operations.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Not authorized. Please sign in first.")]
    NotAuthorized,

    #[error("Sign in failed: {0}")]
    SignInFailed(String),

    #[error("Flood wait required: {0} seconds")]
    FloodWait(u32),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Chat not found: {0}")]
    ChatNotFound(String),

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(&'static str),

    #[error("API invocation error: {0}")]
    Invocation(String),
}

impl From<InvocationError> for TelegramError {
    fn from(err: InvocationError) -> Self {
        let err_str = err.to_string();

        // Check for flood wait errors
        if (err_str.contains("FLOOD_WAIT") || err_str.contains("flood"))
            && let Some(seconds) = extract_flood_wait_seconds(&err_str) {
                return Self::FloodWait(seconds);
            }

        Self::Invocation(err_str)
    }
}

/// High-level Telegram client wrapper.
pub struct TelegramBot {
    /// The underlying grammers client.
    client: Client,

    /// Handle to the sender pool for disconnection.
    handle: sender::SenderPoolHandle,

    /// Which flood waits to sleep through.
    flood: FloodPolicy,

    /// Chats already resolved to API peers.
    peers: RwLock<HashMap<ChatId, ResolvedChat>>,

    /// Background task running the sender pool.
    _pool_task: JoinHandle<()>,
}

impl TelegramBot {
    /// Connects to Telegram with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if connection fails.
    pub async fn connect(config: &TelegramConfig) -> Result<Self, TelegramError> {
        info!("Connecting to Telegram...");

        if config.reset_session {
            remove_stale_session(&config.session_path)?;
        }

        let session = Arc::new(
            SqliteSession::open(&config.session_path)
                .await
                .map_err(|e| TelegramError::Session(e.to_string()))?,
        );

        let SenderPool {
            runner,
            updates: _updates,
            handle,
        } = SenderPool::new(Arc::clone(&session), config.api_id);

        let client = Client::new(handle.clone());

        // Spawn the sender pool runner
        let pool_task = tokio::spawn(async move {
            runner.run().await;
        });

        let is_authorized = client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))?;

        info!("Connected to Telegram. Authorized: {}", is_authorized);

        Ok(Self {
            client,
            handle: handle.thin,
            flood: FloodPolicy::from_secs(config.flood_sleep_threshold_secs),
            peers: RwLock::new(HashMap::new()),
            _pool_task: pool_task,
        })
    }

    /// Checks if the client is authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if the check fails.
    pub async fn is_authorized(&self) -> Result<bool, TelegramError> {
        self.client
            .is_authorized()
            .await
            .map_err(|e| TelegramError::Connection(e.to_string()))
    }

    /// Signs in with a bot token unless the session is already authorized.
    ///
    /// # Errors
    ///
    /// Returns an error if sign in fails.
    pub async fn ensure_signed_in(&self, config: &TelegramConfig) -> Result<(), TelegramError> {
        if self.is_authorized().await? {
            debug!("Session already authorized");
            return Ok(());
        }

        info!("Signing in with bot token...");

        self.client
            .bot_sign_in(&config.bot_token, &config.api_hash)
            .await
            .map_err(|e| TelegramError::SignInFailed(e.to_string()))?;

        info!("Successfully signed in!");
        Ok(())
    }

    /// Fetches the identity of the signed-in bot.
    ///
    /// # Errors
    ///
    /// Returns an error if not authorized or the API call fails.
    pub async fn fetch_identity(&self) -> Result<BotIdentity, TelegramError> {
        if !self.is_authorized().await? {
            return Err(TelegramError::NotAuthorized);
        }

        let request = tl::functions::users::GetUsers {
            id: vec![tl::enums::InputUser::UserSelf],
        };

        let users = self.invoke(&request).await?;
        match users.first() {
            Some(tl::enums::User::User(user)) => Ok(BotIdentity::from_user(user)),
            _ => Err(TelegramError::UnexpectedResponse("users.getUsers")),
        }
    }

    /// Resolves a chat reference to an API peer, caching the result.
    ///
    /// # Errors
    ///
    /// Returns [`TelegramError::ChatNotFound`] if the chat does not exist.
    pub async fn resolve(&self, chat: &ChatId) -> Result<ResolvedChat, TelegramError> {
        if let Some(resolved) = self.peers.read().await.get(chat) {
            return Ok(*resolved);
        }

        let resolved = match (resolve_offline(chat), chat) {
            (Some(resolved), _) => resolved,
            (None, ChatId::Handle(username)) => self.resolve_username(username).await?,
            (None, ChatId::Id(_)) => return Err(TelegramError::ChatNotFound(chat.to_string())),
        };

        debug!("Resolved {} to {:?}", chat, resolved);
        let mut peers = self.peers.write().await;
        // Later lookups by numeric id reuse the resolved access hash.
        if let Some(id) = resolved.bot_api_id() {
            peers.insert(ChatId::Id(id), resolved);
        }
        peers.insert(chat.clone(), resolved);
        Ok(resolved)
    }

    async fn resolve_username(&self, username: &str) -> Result<ResolvedChat, TelegramError> {
        let request = tl::functions::contacts::ResolveUsername {
            username: username.to_owned(),
            referer: None,
        };

        let tl::enums::contacts::ResolvedPeer::Peer(resolved) = match self.invoke(&request).await {
            Ok(resolved) => resolved,
            Err(TelegramError::Invocation(e)) if e.contains("USERNAME") => {
                return Err(TelegramError::ChatNotFound(format!("@{username}")));
            }
            Err(e) => return Err(e),
        };

        ResolvedChat::from_resolved(&resolved)
            .ok_or_else(|| TelegramError::ChatNotFound(format!("@{username}")))
    }

    /// Fetches the messages with the given ids, omitting ids without a message.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat cannot be resolved or the call fails.
    pub async fn get_messages(&self, chat: &ChatId, ids: &[i32]) -> Result<Vec<ChatMessage>, TelegramError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let resolved = self.resolve(chat).await?;
        let id = input_message_ids(ids);

        let response = match resolved.input_channel() {
            Some(channel) => {
                self.invoke(&tl::functions::channels::GetMessages { channel, id })
                    .await?
            }
            None => self.invoke(&tl::functions::messages::GetMessages { id }).await?,
        };

        let messages = collect_messages(response);
        debug!("Fetched {}/{} messages from {}", messages.len(), ids.len(), chat);
        Ok(messages)
    }

    /// Creates a lazy reader over a chat's history.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are invalid.
    pub fn read_history(
        &self,
        chat: ChatId,
        limit: usize,
        offset: i32,
        config: ReaderConfig,
    ) -> Result<HistoryReader<'_, Self>, HistoryError> {
        HistoryReader::with_config(self, chat, limit, offset, config)
    }

    /// Sends a plain text message.
    ///
    /// # Errors
    ///
    /// Returns an error if the chat cannot be resolved or sending fails.
    pub async fn send_text(&self, chat: &ChatId, text: &str) -> Result<(), TelegramError> {
        let resolved = self.resolve(chat).await?;

        self.client
            .send_message(peer_ref(resolved), text)
            .await
            .map(|_| ())
            .map_err(Into::into)
    }

    /// Invokes a raw request, sleeping through short flood waits once.
    async fn invoke<R: tl::RemoteCall>(&self, request: &R) -> Result<R::Return, TelegramError> {
        match self.client.invoke(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                let err = TelegramError::from(e);
                if let TelegramError::FloodWait(seconds) = &err
                    && self.flood.absorb(*seconds).await
                {
                    return self.client.invoke(request).await.map_err(Into::into);
                }
                Err(err)
            }
        }
    }

    /// Disconnects from Telegram.
    pub fn disconnect(&self) {
        info!("Disconnecting from Telegram...");
        self.handle.quit();
    }
}

#[async_trait]
impl MessageFetcher for TelegramBot {
    type Message = ChatMessage;

    async fn fetch(&self, chat: &ChatId, ids: &[i32]) -> Result<Vec<ChatMessage>, FetchError> {
        Ok(self.get_messages(chat, ids).await?)
    }
}

impl std::fmt::Debug for TelegramBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramBot")
            .field("flood", &self.flood)
            .finish_non_exhaustive()
    }
}

/// Converts a resolved chat into the client's peer reference.
fn peer_ref(chat: ResolvedChat) -> PeerRef {
    let (id, access_hash) = match chat {
        ResolvedChat::SelfUser => (PeerId::self_user(), 0),
        ResolvedChat::User { id, access_hash } => (PeerId::user_unchecked(id), access_hash),
        ResolvedChat::Group { id } => (PeerId::chat_unchecked(id), 0),
        ResolvedChat::Channel { id, access_hash } => (PeerId::channel_unchecked(id), access_hash),
    };

    PeerRef {
        id,
        auth: PeerAuth::from_hash(access_hash),
    }
}

/// Deletes a session file left over from a previous run.
fn remove_stale_session(path: &Path) -> Result<(), TelegramError> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            info!("Removed stale session file {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!("Could not remove session file {}: {}", path.display(), e);
            Err(TelegramError::Session(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_stale_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bot.session");
        std::fs::write(&path, b"stale").unwrap();

        remove_stale_session(&path).unwrap();
        assert!(!path.exists());

        // Missing file is not an error.
        remove_stale_session(&path).unwrap();
    }

    #[test]
    fn test_error_is_boxable_fetch_error() {
        let err: FetchError = TelegramError::FloodWait(30).into();
        assert_eq!(err.to_string(), "Flood wait required: 30 seconds");
    }
}
