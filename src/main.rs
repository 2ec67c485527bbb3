use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

use raphson_sync::config::Settings;
use raphson_sync::session::DEFAULT_STATE_FILE;
use raphson_sync::sync::SyncOptions;
use raphson_sync::{handlers, logger, VerbosityLevel};

#[derive(Parser)]
#[command(name = "raphson-sync")]
#[command(about = "Mirror a playlist from a Raphson music server into a local directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Name of the playlist to sync; files go to ./<PLAYLIST>/
    playlist: String,

    /// Log in again even if a session is stored
    #[arg(long)]
    login: bool,

    /// Session state file
    #[arg(long, default_value = DEFAULT_STATE_FILE)]
    state_file: PathBuf,

    /// Number of parallel downloads (overrides config.toml)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Keep downloading other tracks when one fails
    #[arg(long)]
    continue_on_error: bool,

    /// Show what would be downloaded and deleted without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Print download sizes and debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only print changes
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = if cli.verbose {
        VerbosityLevel::Verbose
    } else if cli.quiet {
        VerbosityLevel::Quiet
    } else {
        VerbosityLevel::Normal
    };

    let log_level = match verbosity {
        VerbosityLevel::Verbose => LevelFilter::Debug,
        VerbosityLevel::Normal => LevelFilter::Info,
        VerbosityLevel::Quiet => LevelFilter::Warn,
    };
    logger::init_logger(log_level);

    let mut settings = Settings::load()?;
    if let Some(jobs) = cli.jobs {
        settings.jobs = jobs;
    }
    if cli.continue_on_error {
        settings.continue_on_error = true;
    }
    let settings = settings.normalized();

    let session =
        handlers::ensure_session(&cli.state_file, cli.login, settings.metadata_timeout())?;

    let options = SyncOptions {
        dry_run: cli.dry_run,
        verbosity,
        ..SyncOptions::from_settings(&settings, session.encoding)
    };

    let base_dir = std::env::current_dir().context("Failed to get current directory")?;
    let result = handlers::handle_sync(session, &settings, &cli.playlist, &base_dir, options);

    let summary = match result {
        Ok(summary) => summary,
        Err(e) => {
            logger::log_run_event(&format!("Sync of {} failed: {e:#}", cli.playlist));
            return Err(e);
        }
    };

    summary.print();
    summary.ensure_complete()?;

    Ok(())
}
