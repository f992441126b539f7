//! Begin, update, end and progress commands.
//!
//! These are thin wrappers over [`Tracker`]: they pass the raw user and
//! activity strings through so that parsing and validation errors come from
//! the same place they would for any other event producer.

use std::io::Write;

use al_core::{ActivitySession, DeviceContext};
use al_db::Tracker;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::util::format_time;

/// Which lifecycle event to record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Begin,
    Update,
    End,
}

impl Action {
    const fn past_tense(self) -> &'static str {
        match self {
            Self::Begin => "Began",
            Self::Update => "Updated",
            Self::End => "Ended",
        }
    }
}

/// Records one lifecycle event and reports the resulting session.
pub fn run<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    device: &DeviceContext,
    action: Action,
    user: &str,
    activity: &str,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    let result = match action {
        Action::Begin => tracker.begin(device, user, activity, at),
        Action::Update => tracker.update(device, user, activity, at),
        Action::End => tracker.end(device, user, activity, at),
    };
    let session = result.with_context(|| format!("failed to record {activity} for {user}"))?;

    let Some(session) = session else {
        writeln!(writer, "Activity tracking is disabled; nothing recorded.")?;
        return Ok(());
    };

    tracing::debug!(id = ?session.id, state = ?session.state(), "recorded activity");
    writeln!(
        writer,
        "{} {} for {}",
        action.past_tense(),
        session.activity_type,
        session.user
    )?;
    write_session(writer, &session)?;
    Ok(())
}

/// Records learning progress for `user`.
///
/// Activity tracking failures are logged by the tracker and never fail the
/// command.
pub fn progress<W: Write>(
    writer: &mut W,
    tracker: &mut Tracker,
    device: &DeviceContext,
    user: &str,
    at: Option<DateTime<Utc>>,
) -> Result<()> {
    tracker.record_progress(device, user, at);
    writeln!(writer, "Progress recorded for {user}")?;
    Ok(())
}

fn write_session<W: Write>(writer: &mut W, session: &ActivitySession) -> Result<()> {
    if let Some(id) = session.id {
        writeln!(writer, "  Session:     {id}")?;
    }
    writeln!(writer, "  Started:     {}", format_time(session.start_time))?;
    writeln!(writer, "  Last active: {}", format_time(session.last_active_time))?;
    if let Some(end) = session.end_time {
        writeln!(writer, "  Ended:       {}", format_time(end))?;
    }
    if let Some(seconds) = session.total_seconds {
        writeln!(writer, "  Duration:    {seconds}s")?;
    }
    Ok(())
}
