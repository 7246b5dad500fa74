// Moderation domain models - actions, mod log entries and argument parsing.
//
// These are pure domain types with no Discord dependencies.

use crate::core::gateway::truncate_field;
use std::time::Duration;

/// Longest mute that can be handed out.
pub const MAX_MUTE_DURATION: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Reason shown when a moderator gives none.
pub const NO_REASON: &str = "`None`";

/// A moderation action that ends up in the mod log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModAction {
    Warn,
    ClearWarns,
    Mute,
    Unmute,
}

impl std::fmt::Display for ModAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModAction::Warn => write!(f, "Warn"),
            ModAction::ClearWarns => write!(f, "Clear Warns"),
            ModAction::Mute => write!(f, "Mute"),
            ModAction::Unmute => write!(f, "Unmute"),
        }
    }
}

/// One mod log line: who did what to whom, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModLogEntry {
    pub action: ModAction,
    pub moderator_id: u64,
    pub member_id: u64,
    pub reason: String,
    /// Action specific fields, e.g. ("Time", "`10m`").
    pub extra: Vec<(String, String)>,
}

impl ModLogEntry {
    pub fn new(action: ModAction, moderator_id: u64, member_id: u64, reason: impl Into<String>) -> Self {
        Self {
            action,
            moderator_id,
            member_id,
            reason: reason.into(),
            extra: Vec::new(),
        }
    }

    pub fn extra(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.push((name.into(), value.into()));
        self
    }
}

/// Join the trailing arguments into a reason, defaulting to `None`.
pub fn reason_from_args(args: &[String]) -> String {
    let reason = args.join(" ");
    if reason.trim().is_empty() {
        NO_REASON.to_string()
    } else {
        truncate_field(&reason)
    }
}

/// Pull a user id out of a mention (`<@id>` / `<@!id>`) or a raw id.
pub fn parse_user_id(token: &str) -> Option<u64> {
    let inner = token
        .strip_prefix("<@")
        .and_then(|rest| rest.strip_suffix('>'))
        .map(|rest| rest.strip_prefix('!').unwrap_or(rest))
        .unwrap_or(token);
    inner.parse().ok().filter(|id| *id != 0)
}

/// Pull a channel id out of a mention (`<#id>`) or a raw id.
pub fn parse_channel_id(token: &str) -> Option<u64> {
    let inner = token
        .strip_prefix("<#")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(token);
    inner.parse().ok().filter(|id| *id != 0)
}

/// Pull a role id out of a mention (`<@&id>`) or a raw id.
pub fn parse_role_id(token: &str) -> Option<u64> {
    let inner = token
        .strip_prefix("<@&")
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(token);
    inner.parse().ok().filter(|id| *id != 0)
}

// ============================================================================
// DURATIONS
// ============================================================================

/// Parse a duration string like "30m", "2h", "1d" or "30 minutes".
pub fn parse_duration(input: &str) -> Option<Duration> {
    let input = input.trim().to_lowercase();

    parse_compact_format(&input).or_else(|| parse_verbose_format(&input))
}

/// Compact formats: "45s", "30m", "2h", "1d", "1w"
fn parse_compact_format(input: &str) -> Option<Duration> {
    let unit = input.chars().last()?;
    let multiplier = match unit {
        's' => 1u64,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        'w' => 604800,
        _ => return None,
    };

    let num_str = input[..input.len() - 1].trim();
    if num_str.is_empty() || !num_str.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let number: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(number.checked_mul(multiplier)?))
}

/// Verbose formats: "30 minutes", "2 hours", "1 day"
fn parse_verbose_format(input: &str) -> Option<Duration> {
    let parts: Vec<&str> = input.split_whitespace().collect();

    if parts.len() != 2 {
        return None;
    }

    let number: u64 = parts[0].parse().ok()?;
    let multiplier = match parts[1] {
        "second" | "seconds" | "sec" | "secs" => 1,
        "minute" | "minutes" | "min" | "mins" => 60,
        "hour" | "hours" | "hr" | "hrs" => 3600,
        "day" | "days" => 86400,
        "week" | "weeks" => 604800,
        _ => return None,
    };

    Some(Duration::from_secs(number.checked_mul(multiplier)?))
}

/// Short form used in fields, e.g. `90s` -> `1m`, `3600s` -> `1h`.
pub fn format_compact(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 86400 {
        format!("{}d", secs / 86400)
    } else if secs >= 3600 {
        format!("{}h", secs / 3600)
    } else if secs >= 60 {
        format!("{}m", secs / 60)
    } else {
        format!("{}s", secs)
    }
}

/// Long form used in sentences, e.g. "2 hours and 5 minutes".
pub fn format_long(duration: Duration) -> String {
    fn unit(n: u64, name: &str) -> String {
        format!("{} {}{}", n, name, if n == 1 { "" } else { "s" })
    }

    let total_secs = duration.as_secs();

    if total_secs < 60 {
        unit(total_secs, "second")
    } else if total_secs < 3600 {
        unit(total_secs / 60, "minute")
    } else if total_secs < 86400 {
        let hours = total_secs / 3600;
        let mins = (total_secs % 3600) / 60;
        if mins > 0 {
            format!("{} and {}", unit(hours, "hour"), unit(mins, "minute"))
        } else {
            unit(hours, "hour")
        }
    } else {
        let days = total_secs / 86400;
        let hours = (total_secs % 86400) / 3600;
        if hours > 0 {
            format!("{} and {}", unit(days, "day"), unit(hours, "hour"))
        } else {
            unit(days, "day")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compact_and_verbose_durations() {
        assert_eq!(parse_duration("10s"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("30m"), Some(Duration::from_secs(1800)));
        assert_eq!(parse_duration("2H"), Some(Duration::from_secs(7200)));
        assert_eq!(parse_duration("1w"), Some(Duration::from_secs(604800)));
        assert_eq!(parse_duration("5 minutes"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1 day"), Some(Duration::from_secs(86400)));
    }

    #[test]
    fn rejects_garbage_durations() {
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("m"), None);
        assert_eq!(parse_duration("-5m"), None);
        assert_eq!(parse_duration("5 fortnights"), None);
        assert_eq!(parse_duration("99999999999999999999d"), None);
    }

    #[test]
    fn formats_durations() {
        assert_eq!(format_compact(Duration::from_secs(600)), "10m");
        assert_eq!(format_compact(Duration::from_secs(45)), "45s");
        assert_eq!(format_long(Duration::from_secs(1)), "1 second");
        assert_eq!(format_long(Duration::from_secs(7500)), "2 hours and 5 minutes");
        assert_eq!(format_long(Duration::from_secs(86400 * 3)), "3 days");
    }

    #[test]
    fn parses_mentions_and_raw_ids() {
        assert_eq!(parse_user_id("<@123>"), Some(123));
        assert_eq!(parse_user_id("<@!123>"), Some(123));
        assert_eq!(parse_user_id("123"), Some(123));
        assert_eq!(parse_user_id("<#123>"), None);
        assert_eq!(parse_user_id("nobody"), None);
        assert_eq!(parse_channel_id("<#55>"), Some(55));
        assert_eq!(parse_role_id("<@&77>"), Some(77));
    }

    #[test]
    fn reasons_default_and_truncate() {
        assert_eq!(reason_from_args(&[]), NO_REASON);

        let long = vec!["x".repeat(2000)];
        let reason = reason_from_args(&long);
        assert_eq!(reason.chars().count(), 1024);
        assert!(reason.ends_with("..."));
    }
}
