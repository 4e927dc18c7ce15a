//! Chat identifiers.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A chat reference as given by the user: numeric id or username handle.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatId {
    /// Numeric identifier in Bot API form (`-100…` for channels).
    Id(i64),

    /// Username or alias, stored without the leading `@`.
    Handle(String),
}

impl ChatId {
    /// Returns true for the "Saved Messages" aliases `me` and `self`.
    #[must_use]
    pub fn is_self(&self) -> bool {
        matches!(self, Self::Handle(h) if h.eq_ignore_ascii_case("me") || h.eq_ignore_ascii_case("self"))
    }
}

/// Error returned when a chat reference cannot be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatIdError {
    #[error("Chat reference is empty")]
    Empty,

    #[error("Invalid chat handle: {0}")]
    InvalidHandle(String),
}

impl FromStr for ChatId {
    type Err = ChatIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ChatIdError::Empty);
        }

        if let Ok(id) = s.parse::<i64>() {
            return Ok(Self::Id(id));
        }

        let handle = s.strip_prefix('@').unwrap_or(s);
        if handle.is_empty() || !handle.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ChatIdError::InvalidHandle(s.to_owned()));
        }

        Ok(Self::Handle(handle.to_owned()))
    }
}

impl From<i64> for ChatId {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Handle(handle) => write!(f, "@{handle}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_numeric() {
        assert_eq!("12345".parse::<ChatId>(), Ok(ChatId::Id(12345)));
        assert_eq!(
            "-1001234567890".parse::<ChatId>(),
            Ok(ChatId::Id(-1_001_234_567_890))
        );
    }

    #[test]
    fn test_parse_handle_strips_at() {
        assert_eq!(
            "@some_channel".parse::<ChatId>(),
            Ok(ChatId::Handle("some_channel".to_owned()))
        );
        assert_eq!(
            " some_channel ".parse::<ChatId>(),
            Ok(ChatId::Handle("some_channel".to_owned()))
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<ChatId>(), Err(ChatIdError::Empty));
        assert_eq!("@".parse::<ChatId>(), Err(ChatIdError::InvalidHandle("@".to_owned())));
        assert!("bad handle".parse::<ChatId>().is_err());
    }

    #[test]
    fn test_self_aliases() {
        assert!("me".parse::<ChatId>().unwrap().is_self());
        assert!("SELF".parse::<ChatId>().unwrap().is_self());
        assert!(!"meow".parse::<ChatId>().unwrap().is_self());
        assert!(!ChatId::Id(1).is_self());
    }

    #[test]
    fn test_display() {
        assert_eq!(ChatId::Id(-42).to_string(), "-42");
        assert_eq!(ChatId::Handle("durov".to_owned()).to_string(), "@durov");
    }
}
