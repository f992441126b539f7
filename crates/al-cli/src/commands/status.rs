//! Status command for showing tracking settings and session counts.

use std::io::Write;

use al_db::Database;
use anyhow::Result;

use crate::Config;
use crate::device::DeviceIdentity;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    config: &Config,
    device: Option<&DeviceIdentity>,
) -> Result<()> {
    let settings = config.tracker_settings();

    writeln!(writer, "Activity log status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    match device {
        Some(identity) => writeln!(writer, "Device: {} ({})", identity.name, identity.device_id)?,
        None => writeln!(writer, "Device: not initialized (run 'al init')")?,
    }
    writeln!(writer, "Summary period: {}", settings.summary_period)?;
    match settings.retention.max_records_per_user {
        _ if !settings.retention.is_enabled() => writeln!(writer, "Retention: tracking disabled")?,
        Some(cap) => writeln!(writer, "Retention: {cap} sessions per user and activity")?,
        None => writeln!(writer, "Retention: unlimited")?,
    }

    let counts = db.session_counts()?;
    if counts.is_empty() {
        writeln!(writer, "No sessions recorded.")?;
        return Ok(());
    }

    writeln!(writer, "Sessions:")?;
    for count in counts {
        writeln!(
            writer,
            "- {}: {} open, {} total",
            count.activity_type, count.open, count.total
        )?;
    }

    Ok(())
}
