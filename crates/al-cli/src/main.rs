use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use al_cli::commands::track::{self, Action};
use al_cli::commands::{init, sessions, status, summaries, trim};
use al_cli::{ActivityArgs, Cli, Commands, Config, device};
use al_db::{Database, Tracker};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

/// Open the database and wrap it in a tracker using the configured settings.
fn open_tracker(config_path: Option<&Path>) -> Result<Tracker> {
    let (db, config) = open_database(config_path)?;
    Ok(Tracker::new(db, config.tracker_settings()))
}

fn run_activity<W: Write>(
    writer: &mut W,
    config_path: Option<&Path>,
    action: Action,
    args: &ActivityArgs,
) -> Result<()> {
    let device = device::require_device_identity()?.context()?;
    let mut tracker = open_tracker(config_path)?;
    track::run(
        writer,
        &mut tracker,
        &device,
        action,
        &args.user,
        &args.activity,
        args.at,
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config_path = cli.config.as_deref();
    let mut stdout = io::stdout();

    match &cli.command {
        Some(Commands::Init { name }) => {
            init::run(&mut stdout, name.as_deref())?;
        }
        Some(Commands::Begin(args)) => {
            run_activity(&mut stdout, config_path, Action::Begin, args)?;
        }
        Some(Commands::Update(args)) => {
            run_activity(&mut stdout, config_path, Action::Update, args)?;
        }
        Some(Commands::End(args)) => {
            run_activity(&mut stdout, config_path, Action::End, args)?;
        }
        Some(Commands::Progress { user, at }) => {
            let device = device::require_device_identity()?.context()?;
            let mut tracker = open_tracker(config_path)?;
            track::progress(&mut stdout, &mut tracker, &device, user, *at)?;
        }
        Some(Commands::Sessions(args)) => {
            let (db, _config) = open_database(config_path)?;
            sessions::run(&mut stdout, &db, args.user.as_deref(), args.json)?;
        }
        Some(Commands::Summaries(args)) => {
            let (db, _config) = open_database(config_path)?;
            summaries::run(&mut stdout, &db, args.user.as_deref(), args.json)?;
        }
        Some(Commands::Trim { user }) => {
            let mut tracker = open_tracker(config_path)?;
            trim::run(&mut stdout, &mut tracker, user.as_deref())?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(config_path)?;
            let identity = device::load_device_identity()?;
            status::run(&mut stdout, &db, &config, identity.as_ref())?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
