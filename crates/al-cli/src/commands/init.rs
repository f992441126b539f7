//! Init command for establishing device identity.

use std::io::Write;

use anyhow::Result;

use crate::device;

/// Runs the init command.
pub fn run<W: Write>(writer: &mut W, name: Option<&str>) -> Result<()> {
    let identity = device::init_device(name)?;

    writeln!(writer, "Device ID: {}", identity.device_id)?;
    writeln!(writer, "Name:      {}", identity.name)?;
    writeln!(writer, "Saved to:  {}", device::device_json_path()?.display())?;

    Ok(())
}
