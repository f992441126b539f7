//! Device identity management.
//!
//! Each device gets a persistent UUID stored in `device.json`. Summaries are
//! keyed by this ID so that rows from different devices never collide once an
//! external layer replicates them.

use std::path::{Path, PathBuf};

use al_core::{DeviceContext, DeviceId};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Device identity stored in `device.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Persistent UUID for this device.
    pub device_id: String,
    /// Human-friendly name (e.g., "classroom-3").
    pub name: String,
}

impl DeviceIdentity {
    /// Builds the context passed to tracker calls.
    pub fn context(&self) -> Result<DeviceContext> {
        let id = DeviceId::new(self.device_id.as_str())
            .context("device.json has an empty device_id")?;
        Ok(DeviceContext::new(id, self.name.as_str()))
    }
}

/// Returns the path to device.json in the XDG data directory.
pub fn device_json_path() -> Result<PathBuf> {
    let data_dir = crate::config::dirs_data_path().context("could not determine data directory")?;
    Ok(data_dir.join("device.json"))
}

/// Loads device identity from device.json.
///
/// Returns `None` if the file doesn't exist.
/// Returns an error if the file exists but is unreadable/unparseable.
pub fn load_device_identity() -> Result<Option<DeviceIdentity>> {
    load_from(&device_json_path()?)
}

fn load_from(path: &Path) -> Result<Option<DeviceIdentity>> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let identity: DeviceIdentity =
                serde_json::from_str(&content).context("failed to parse device.json")?;
            Ok(Some(identity))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).context("failed to read device.json"),
    }
}

/// Loads device identity, failing with a helpful message if not found.
///
/// Use this in commands that record activity.
pub fn require_device_identity() -> Result<DeviceIdentity> {
    load_device_identity()?.context("No device identity found. Run 'al init' first.")
}

/// Initializes device identity.
///
/// If device.json already exists, returns the existing identity
/// (renaming it if a new name is provided).
/// If it doesn't exist, generates a new UUID and writes device.json.
pub fn init_device(name: Option<&str>) -> Result<DeviceIdentity> {
    init_device_at(&device_json_path()?, name)
}

fn init_device_at(path: &Path, name: Option<&str>) -> Result<DeviceIdentity> {
    let identity = if let Some(mut existing) = load_from(path)? {
        if let Some(new_name) = name {
            existing.name = new_name.to_string();
            save_to(path, &existing)?;
        }
        existing
    } else {
        let default_name = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());
        let identity = DeviceIdentity {
            device_id: Uuid::new_v4().to_string(),
            name: name.unwrap_or(&default_name).to_string(),
        };
        save_to(path, &identity)?;
        identity
    };

    Ok(identity)
}

fn save_to(path: &Path, identity: &DeviceIdentity) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("failed to create data directory")?;
    }
    let json = serde_json::to_string_pretty(identity).context("failed to serialize identity")?;
    std::fs::write(path, json).context("failed to write device.json")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_new_identity() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");

        let identity = init_device_at(&path, Some("classroom-3")).unwrap();
        assert_eq!(identity.name, "classroom-3");
        Uuid::parse_str(&identity.device_id).unwrap();
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");

        let first = init_device_at(&path, Some("classroom-3")).unwrap();
        let second = init_device_at(&path, None).unwrap();
        assert_eq!(first.device_id, second.device_id);
        assert_eq!(first.name, second.name);
    }

    #[test]
    fn test_init_renames_device() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");

        let first = init_device_at(&path, Some("old-name")).unwrap();
        let second = init_device_at(&path, Some("new-name")).unwrap();
        assert_eq!(first.device_id, second.device_id);
        assert_eq!(second.name, "new-name");
    }

    #[test]
    fn test_load_missing_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device.json");
        assert!(load_from(&path).unwrap().is_none());
    }

    #[test]
    fn test_context_rejects_blank_device_id() {
        let identity = DeviceIdentity {
            device_id: String::new(),
            name: "classroom".to_string(),
        };
        assert!(identity.context().is_err());

        let identity = DeviceIdentity {
            device_id: "dev-1".to_string(),
            name: "classroom".to_string(),
        };
        let context = identity.context().unwrap();
        assert_eq!(context.id.as_str(), "dev-1");
        assert_eq!(context.name, "classroom");
    }
}
