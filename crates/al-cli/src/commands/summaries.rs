//! Summaries command for listing per-period activity totals.

use std::io::Write;

use al_core::ActivitySummary;
use al_db::Database;
use anyhow::Result;

use super::util::{format_time, parse_user_filter};

/// Runs the summaries command.
pub fn run<W: Write>(writer: &mut W, db: &Database, user: Option<&str>, json: bool) -> Result<()> {
    let user = parse_user_filter(user)?;
    let summaries = db.list_summaries(user.as_ref())?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&summaries)?)?;
    } else {
        write_table(writer, &summaries)?;
    }
    Ok(())
}

fn write_table<W: Write>(writer: &mut W, summaries: &[ActivitySummary]) -> Result<()> {
    if summaries.is_empty() {
        writeln!(writer, "No activity summaries recorded.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<8}  {:<12}  {:<11}  {:<20}  {:<20}  {:>5}  {:>8}",
        "Device", "User", "Activity", "Period start", "Period end", "Count", "Seconds"
    )?;
    for summary in summaries {
        // Device IDs are UUIDs; the prefix is enough to tell devices apart.
        let device: String = summary.device.as_str().chars().take(8).collect();
        writeln!(
            writer,
            "{:<8}  {:<12}  {:<11}  {:<20}  {:<20}  {:>5}  {:>8}",
            device,
            summary.user,
            summary.activity_type,
            format_time(summary.period_start),
            format_time(summary.period_end),
            summary.count,
            summary.total_seconds
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use al_core::{ActivityType, DeviceContext, DeviceId, UserId};
    use al_db::{Tracker, TrackerSettings};
    use chrono::{DateTime, Utc};
    use insta::assert_snapshot;

    fn t(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn session(tracker: &mut Tracker, user: &UserId, start: &str, last: &str, end: &str) {
        let device = DeviceContext::new(
            DeviceId::new("5f0c8a1e-2b7d-4d52-9a57-0f3b8c6d1e22").unwrap(),
            "classroom",
        );
        tracker
            .begin_activity(&device, user, ActivityType::Login, t(start))
            .unwrap();
        tracker
            .update_activity(&device, user, ActivityType::Login, t(last))
            .unwrap();
        tracker
            .end_activity(&device, user, ActivityType::Login, t(end))
            .unwrap();
    }

    fn tracker_with_history() -> Tracker {
        let ada = UserId::new("ada").unwrap();
        let bob = UserId::new("bob").unwrap();
        let mut tracker =
            Tracker::new(Database::open_in_memory().unwrap(), TrackerSettings::default());
        session(
            &mut tracker,
            &ada,
            "2025-03-10T10:00:00Z",
            "2025-03-10T10:05:00Z",
            "2025-03-10T10:07:00Z",
        );
        session(
            &mut tracker,
            &ada,
            "2025-03-20T08:00:00Z",
            "2025-03-20T08:02:00Z",
            "2025-03-20T08:30:00Z",
        );
        session(
            &mut tracker,
            &ada,
            "2025-04-01T12:00:00Z",
            "2025-04-01T12:01:00Z",
            "2025-04-01T12:01:00Z",
        );
        session(
            &mut tracker,
            &bob,
            "2025-03-11T09:00:00Z",
            "2025-03-11T09:00:30Z",
            "2025-03-11T09:01:00Z",
        );
        tracker
    }

    #[test]
    fn lists_monthly_totals_per_user() {
        let tracker = tracker_with_history();
        let mut output = Vec::new();
        run(&mut output, tracker.database(), None, false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Device    User          Activity     Period start          Period end            Count   Seconds
        5f0c8a1e  ada           login        2025-03-01T00:00:00Z  2025-03-31T23:59:59Z      2       420
        5f0c8a1e  ada           login        2025-04-01T00:00:00Z  2025-04-30T23:59:59Z      1        60
        5f0c8a1e  bob           login        2025-03-01T00:00:00Z  2025-03-31T23:59:59Z      1        30
        ");
    }

    #[test]
    fn json_output_carries_full_device_id() {
        let tracker = tracker_with_history();
        let mut output = Vec::new();
        run(&mut output, tracker.database(), Some("bob"), true).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let summaries = value.as_array().unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0]["device"], "5f0c8a1e-2b7d-4d52-9a57-0f3b8c6d1e22");
        assert_eq!(summaries[0]["period_start"], "2025-03-01T00:00:00Z");
        assert_eq!(summaries[0]["count"], 1);
        assert_eq!(summaries[0]["total_seconds"], 30);
    }

    #[test]
    fn empty_database_has_a_message() {
        let db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();
        run(&mut output, &db, None, false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @"No activity summaries recorded.");
    }
}
