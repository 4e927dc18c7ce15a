//! Restart notice text.

use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};

use crate::telegram::BotIdentity;

/// Resolves a UTC offset in minutes, falling back to UTC if out of range.
#[must_use]
pub fn offset_from_minutes(minutes: i32) -> FixedOffset {
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .unwrap_or_else(|| Utc.fix())
}

/// Formats the message posted to the log chat after each start.
#[must_use]
pub fn restart_text<Tz: TimeZone>(identity: &BotIdentity, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} restarted!\n\n📅 Date: {}\n⏰ Time: {}\n🌐 Timezone: UTC{}",
        identity.display_name(),
        now.format("%Y-%m-%d"),
        now.format("%H:%M:%S %p"),
        now.format("%:z"),
    )
}
