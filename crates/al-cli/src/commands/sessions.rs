//! Sessions command for listing raw activity sessions.

use std::io::Write;

use al_core::ActivitySession;
use al_db::Database;
use anyhow::Result;

use super::util::{format_time, parse_user_filter};

/// Runs the sessions command.
pub fn run<W: Write>(writer: &mut W, db: &Database, user: Option<&str>, json: bool) -> Result<()> {
    let user = parse_user_filter(user)?;
    let sessions = db.list_sessions(user.as_ref())?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&sessions)?)?;
    } else {
        write_table(writer, &sessions)?;
    }
    Ok(())
}

fn write_table<W: Write>(writer: &mut W, sessions: &[ActivitySession]) -> Result<()> {
    if sessions.is_empty() {
        writeln!(writer, "No activity sessions recorded.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<4}  {:<12}  {:<11}  {:<20}  {:<20}  {:<20}  {:>8}",
        "ID", "User", "Activity", "Start", "Last active", "End", "Seconds"
    )?;
    for session in sessions {
        let id = session.id.map_or_else(String::new, |id| id.to_string());
        let end = session.end_time.map_or_else(|| "(open)".to_string(), format_time);
        let seconds = session
            .total_seconds
            .map_or_else(|| "-".to_string(), |s| s.to_string());
        writeln!(
            writer,
            "{:<4}  {:<12}  {:<11}  {:<20}  {:<20}  {:<20}  {:>8}",
            id,
            session.user,
            session.activity_type,
            format_time(session.start_time),
            format_time(session.last_active_time),
            end,
            seconds
        )?;
    }
    Ok(())
}
