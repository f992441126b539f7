//! Activity log CLI library.
//!
//! This crate provides the `al` command-line interface over the activity
//! tracker in `al-db`.

mod cli;
pub mod commands;
mod config;
pub mod device;

pub use cli::{ActivityArgs, Cli, Commands, ListArgs};
pub use config::Config;
