//! The bot's own identity, captured once after sign-in.

use grammers_tl_types as tl;
use serde::Serialize;

/// Identity of the signed-in bot.
///
/// Built once during start-up and shared read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BotIdentity {
    /// Numeric user id.
    pub id: i64,

    /// Username without the leading `@`.
    pub username: Option<String>,

    /// Display name.
    pub first_name: String,
}

impl BotIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(id: i64, username: Option<String>, first_name: impl Into<String>) -> Self {
        Self {
            id,
            username,
            first_name: first_name.into(),
        }
    }

    /// Builds an identity from a raw user object.
    #[must_use]
    pub fn from_user(user: &tl::types::User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            first_name: user.first_name.clone().unwrap_or_default(),
        }
    }

    /// Returns `@username`, falling back to the numeric id.
    #[must_use]
    pub fn mention(&self) -> String {
        self.username
            .as_deref()
            .map_or_else(|| self.id.to_string(), |u| format!("@{u}"))
    }

    /// Returns a human readable name for logs.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.first_name.is_empty() {
            self.username.as_deref().unwrap_or("bot")
        } else {
            &self.first_name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_with_username() {
        let me = BotIdentity::new(1, Some("history_bot".to_owned()), "History");
        assert_eq!(me.mention(), "@history_bot");
        assert_eq!(me.display_name(), "History");
    }

    #[test]
    fn test_mention_without_username() {
        let me = BotIdentity::new(777, None, "");
        assert_eq!(me.mention(), "777");
        assert_eq!(me.display_name(), "bot");
    }
}
