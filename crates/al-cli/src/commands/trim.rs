//! Trim command for applying the retention cap to existing history.
//!
//! The tracker trims a key whenever one of its sessions is created or closed.
//! Lowering `max_records_per_user` does not touch keys that see no new
//! activity, so this command applies the current cap to every stored key.

use std::io::Write;

use al_db::Tracker;
use anyhow::Result;

use super::util::parse_user_filter;

/// Runs the trim command.
pub fn run<W: Write>(writer: &mut W, tracker: &mut Tracker, user: Option<&str>) -> Result<()> {
    let retention = tracker.settings().retention;
    if !retention.is_enabled() {
        writeln!(writer, "Activity tracking is disabled; nothing trimmed.")?;
        return Ok(());
    }
    let Some(cap) = retention.max_records_per_user else {
        writeln!(writer, "Retention is unlimited; nothing trimmed.")?;
        return Ok(());
    };

    let user = parse_user_filter(user)?;
    let mut keys: Vec<_> = tracker
        .database()
        .list_sessions(user.as_ref())?
        .into_iter()
        .map(|session| (session.user, session.activity_type))
        .collect();
    keys.dedup();

    let mut total = 0;
    for (user, activity) in keys {
        let deleted = tracker.enforce_retention(&user, activity)?;
        if deleted > 0 {
            writeln!(writer, "- {user} {activity}: {deleted} deleted")?;
        }
        total += deleted;
    }
    writeln!(writer, "Trimmed {total} sessions (cap {cap} per user and activity).")?;
    Ok(())
}
