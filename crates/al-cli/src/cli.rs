//! Command-line argument definitions.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use crate::commands::util::parse_datetime;

/// Learner activity tracker.
///
/// Records login and coach-report sessions, rolls their durations into
/// calendar-period summaries and keeps the raw history bounded.
#[derive(Debug, Parser)]
#[command(name = "al", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or rename this device's identity.
    Init {
        /// Human-friendly device name (defaults to the hostname).
        #[arg(long)]
        name: Option<String>,
    },

    /// Begin an activity session.
    Begin(ActivityArgs),

    /// Record that a learner is still active.
    Update(ActivityArgs),

    /// End an activity session and fold it into its summary.
    End(ActivityArgs),

    /// Record learning progress; activity tracking failures are only logged.
    Progress {
        /// Learner identifier.
        #[arg(long)]
        user: String,

        /// When the progress happened (RFC 3339 or "N minutes ago", defaults to now).
        #[arg(long, value_parser = parse_datetime)]
        at: Option<DateTime<Utc>>,
    },

    /// List raw activity sessions.
    Sessions(ListArgs),

    /// List periodic activity summaries.
    Summaries(ListArgs),

    /// Delete the oldest closed sessions beyond the retention cap.
    Trim {
        /// Only trim this learner's sessions.
        #[arg(long)]
        user: Option<String>,
    },

    /// Show current tracking status.
    Status,
}

/// Arguments shared by begin, update and end.
#[derive(Debug, Clone, Args)]
pub struct ActivityArgs {
    /// Learner identifier.
    #[arg(long)]
    pub user: String,

    /// Activity type: `login`, `coachreport`, or its code (1, 2).
    #[arg(long, default_value = "login")]
    pub activity: String,

    /// When the event happened (RFC 3339 or "N minutes ago", defaults to now).
    #[arg(long, value_parser = parse_datetime)]
    pub at: Option<DateTime<Utc>>,
}

/// Arguments for listing commands.
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Only show this learner.
    #[arg(long)]
    pub user: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}
