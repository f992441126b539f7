//! CLI subcommand implementations.

pub mod init;
pub mod sessions;
pub mod status;
pub mod summaries;
pub mod track;
pub mod trim;
pub mod util;
