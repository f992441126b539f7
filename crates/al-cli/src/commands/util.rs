//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use al_core::UserId;
use anyhow::Context;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use regex::Regex;

/// Pre-compiled regex for relative time parsing.
static RELATIVE_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)\s+(second|minute|hour|day)s?\s+ago$").expect("valid relative time pattern")
});

/// Conservative bounds for relative time parsing (~100 years in seconds).
const MAX_RELATIVE_SECONDS: i64 = 100 * 365 * 24 * 60 * 60;

/// Parse a datetime string as either RFC 3339 or relative time.
///
/// Supports:
/// - RFC 3339: "2026-01-15T10:30:00Z"
/// - Relative: "90 seconds ago", "5 minutes ago", "2 hours ago", "1 day ago"
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let Some(caps) = RELATIVE_TIME_RE.captures(s) else {
        anyhow::bail!(
            "Invalid datetime: {s}. Use RFC 3339 (e.g., 2026-01-15T10:30:00Z) or relative (e.g., '5 minutes ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative time")?;

    let seconds_per_unit = match &caps[2] {
        "second" => 1,
        "minute" => 60,
        "hour" => 60 * 60,
        "day" => 24 * 60 * 60,
        unit => anyhow::bail!("Unknown time unit: {unit}"),
    };

    if n > MAX_RELATIVE_SECONDS / seconds_per_unit {
        anyhow::bail!("Relative time value too large: {n} {}", &caps[2]);
    }

    Ok(Utc::now() - Duration::seconds(n * seconds_per_unit))
}

/// Formats a timestamp for display as RFC 3339 with whole seconds and a `Z` suffix.
pub fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parses an optional `--user` filter.
pub fn parse_user_filter(user: Option<&str>) -> anyhow::Result<Option<UserId>> {
    user.map(UserId::new)
        .transpose()
        .context("invalid --user filter")
}
