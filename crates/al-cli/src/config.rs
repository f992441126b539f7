//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use al_core::{PeriodSpec, RetentionPolicy};
use al_db::TrackerSettings;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Raw sessions kept per learner and activity type.
    ///
    /// Unset keeps every session; `0` turns activity tracking off.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_records_per_user: Option<u32>,
    /// Calendar period that sessions are summarized over.
    #[serde(default)]
    pub summary_period: PeriodSpec,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("max_records_per_user", &self.max_records_per_user)
            .field("summary_period", &self.summary_period.to_string())
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("al.db"),
            max_records_per_user: None,
            summary_period: PeriodSpec::default(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// An invalid `summary_period` (weeks, multi-day periods, unsupported
    /// month/year groupings) fails here rather than on first use.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (AL_*)
        figment = figment.merge(Env::prefixed("AL_"));

        figment.extract()
    }

    /// Tracker settings derived from this configuration.
    pub const fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            retention: RetentionPolicy::new(self.max_records_per_user),
            summary_period: self.summary_period,
        }
    }
}

/// Returns the platform-specific config directory for al.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("al"))
}

/// Returns the platform-specific data directory for al.
///
/// On Linux: `~/.local/share/al`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("al"))
}
