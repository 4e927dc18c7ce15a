//! Conversion between raw TL objects and the crate's message and peer types.

use chrono::{DateTime, Utc};
use grammers_tl_types as tl;
use serde::Serialize;

use crate::history::ChatId;

/// Offset Bot API adds to channel and supergroup ids (`-100…`).
const CHANNEL_ID_OFFSET: i64 = 1_000_000_000_000;

/// A chat message as handed out by the history reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// Message identifier, increasing within a chat.
    pub id: i32,

    /// When the message was sent.
    pub sent_at: Option<DateTime<Utc>>,

    /// Message text (empty for media without caption and service messages).
    pub text: String,

    /// Whether the bot sent this message.
    pub outgoing: bool,

    /// Whether this is a service message (join, pin, title change...).
    pub service: bool,
}

impl ChatMessage {
    /// Converts a raw message, returning `None` for empty placeholders.
    #[must_use]
    pub fn from_raw(message: tl::enums::Message) -> Option<Self> {
        match message {
            tl::enums::Message::Message(m) => Some(Self {
                id: m.id,
                sent_at: timestamp(m.date),
                text: m.message,
                outgoing: m.out,
                service: false,
            }),
            tl::enums::Message::Service(m) => Some(Self {
                id: m.id,
                sent_at: timestamp(m.date),
                text: String::new(),
                outgoing: m.out,
                service: true,
            }),
            tl::enums::Message::Empty(_) => None,
        }
    }
}

fn timestamp(date: i32) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(i64::from(date), 0)
}

/// Extracts the messages of a `messages.getMessages`-style response,
/// dropping placeholders and ordering them by id.
pub(crate) fn collect_messages(response: tl::enums::messages::Messages) -> Vec<ChatMessage> {
    let raw = match response {
        tl::enums::messages::Messages::Messages(m) => m.messages,
        tl::enums::messages::Messages::Slice(m) => m.messages,
        tl::enums::messages::Messages::ChannelMessages(m) => m.messages,
        tl::enums::messages::Messages::NotModified(_) => Vec::new(),
    };

    ordered_by_id(raw.into_iter().filter_map(ChatMessage::from_raw))
}

/// Sorts messages by id and keeps the first of any duplicates.
fn ordered_by_id(messages: impl IntoIterator<Item = ChatMessage>) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = messages.into_iter().collect();
    messages.sort_by_key(|m| m.id);
    messages.dedup_by_key(|m| m.id);
    messages
}

/// A chat resolved to the peer form the API needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedChat {
    /// The bot's own "Saved Messages".
    SelfUser,
    /// Private chat with a user.
    User { id: i64, access_hash: i64 },
    /// Basic group.
    Group { id: i64 },
    /// Channel or supergroup.
    Channel { id: i64, access_hash: i64 },
}

impl ResolvedChat {
    /// Maps a Bot API style numeric id to a peer.
    ///
    /// Bots may address peers with an access hash of zero.
    #[must_use]
    pub fn from_bot_api_id(id: i64) -> Option<Self> {
        match id {
            0 => None,
            id if id > 0 => Some(Self::User { id, access_hash: 0 }),
            id if id < -CHANNEL_ID_OFFSET => id.checked_neg().map(|n| Self::Channel {
                id: n - CHANNEL_ID_OFFSET,
                access_hash: 0,
            }),
            id if id == -CHANNEL_ID_OFFSET => None,
            id => Some(Self::Group { id: -id }),
        }
    }

    /// Picks the peer out of a `contacts.resolveUsername` result.
    #[must_use]
    pub fn from_resolved(resolved: &tl::types::contacts::ResolvedPeer) -> Option<Self> {
        match &resolved.peer {
            tl::enums::Peer::User(peer) => resolved.users.iter().find_map(|user| match user {
                tl::enums::User::User(u) if u.id == peer.user_id => Some(Self::User {
                    id: u.id,
                    access_hash: u.access_hash.unwrap_or(0),
                }),
                _ => None,
            }),
            tl::enums::Peer::Chat(peer) => Some(Self::Group { id: peer.chat_id }),
            tl::enums::Peer::Channel(peer) => resolved.chats.iter().find_map(|chat| match chat {
                tl::enums::Chat::Channel(c) if c.id == peer.channel_id => Some(Self::Channel {
                    id: c.id,
                    access_hash: c.access_hash.unwrap_or(0),
                }),
                tl::enums::Chat::ChannelForbidden(c) if c.id == peer.channel_id => {
                    Some(Self::Channel {
                        id: c.id,
                        access_hash: c.access_hash,
                    })
                }
                _ => None,
            }),
        }
    }

    /// Returns the Bot API style id of this chat, if it has one.
    #[must_use]
    pub fn bot_api_id(&self) -> Option<i64> {
        match *self {
            Self::SelfUser => None,
            Self::User { id, .. } => Some(id),
            Self::Group { id } => Some(-id),
            Self::Channel { id, .. } => Some(-(id + CHANNEL_ID_OFFSET)),
        }
    }

    /// Converts to the raw input channel, for channel-only methods.
    #[must_use]
    pub fn input_channel(&self) -> Option<tl::enums::InputChannel> {
        match *self {
            Self::Channel { id, access_hash } => {
                Some(tl::enums::InputChannel::Channel(tl::types::InputChannel {
                    channel_id: id,
                    access_hash,
                }))
            }
            _ => None,
        }
    }
}

/// Returns the peer for ids that need no network lookup.
#[must_use]
pub fn resolve_offline(chat: &ChatId) -> Option<ResolvedChat> {
    match chat {
        ChatId::Id(id) => ResolvedChat::from_bot_api_id(*id),
        handle if handle.is_self() => Some(ResolvedChat::SelfUser),
        ChatId::Handle(_) => None,
    }
}

/// Builds the raw message id list for a batch.
pub(crate) fn input_message_ids(ids: &[i32]) -> Vec<tl::enums::InputMessage> {
    ids.iter()
        .map(|&id| tl::enums::InputMessage::Id(tl::types::InputMessageId { id }))
        .collect()
}
