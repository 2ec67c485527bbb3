use anyhow::{Context, Result};
use log::LevelFilter;
use std::fs::OpenOptions;
use std::io::Write;

use crate::config::ConfigManager;

/// Maximum size of the log file before it is rotated (10MB)
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Initialize the logging system
///
/// Console logging goes to stderr so it never interleaves with the per-track
/// report lines on stdout. The level is taken from `RUST_LOG` when set,
/// otherwise from `default_level` (chosen by `--verbose` / `--quiet`).
///
/// Run-level events are additionally appended to `raphson-sync.log` in the
/// config directory:
/// - Linux: ~/.config/raphson-sync/raphson-sync.log or $XDG_CONFIG_HOME/raphson-sync/raphson-sync.log
/// - macOS: ~/Library/Application Support/raphson-sync/raphson-sync.log
/// - Windows: %APPDATA%\raphson-sync\raphson-sync.log
///
/// ```bash
/// # Show HTTP requests and planning decisions
/// RUST_LOG=debug raphson-sync Favorites
/// ```
pub fn init_logger(default_level: LevelFilter) {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<LevelFilter>().ok())
        .unwrap_or(default_level);

    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{:5}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(level)
        // Keep HTTP client internals out of the user's console
        .filter_module("reqwest", LevelFilter::Warn)
        .filter_module("hyper_util", LevelFilter::Warn)
        .target(env_logger::Target::Stderr)
        .try_init()
        .ok(); // Ignore error if logger is already initialized

    // The run log is optional; a broken config dir must not stop a sync
    if let Err(e) = ConfigManager::ensure_config_dir().and_then(|_| rotate_log_if_needed()) {
        log::warn!("Run log unavailable: {e:#}");
        return;
    }
    log_run_event(&format!("Logger initialized with level: {level:?}"));
}

/// Append a line to the run log, warning instead of failing
///
/// Used for run start/end records, which must never replace the real outcome
/// of a command.
pub fn log_run_event(message: &str) {
    if let Err(e) = log_to_file(message) {
        log::warn!("Could not write run log: {e:#}");
    }
}

/// Append a line to the log file
pub fn log_to_file(message: &str) -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open log file: {}", log_path.display()))?;

    writeln!(
        file,
        "[{}] {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        message
    )?;

    Ok(())
}

/// Rotate the log file to `.log.old` once it exceeds [`MAX_LOG_SIZE`]
pub fn rotate_log_if_needed() -> Result<()> {
    let log_path = ConfigManager::log_file_path()?;

    if log_path.exists() {
        let metadata = std::fs::metadata(&log_path)?;

        if metadata.len() > MAX_LOG_SIZE {
            let old_log_path = log_path.with_extension("log.old");

            if old_log_path.exists() {
                std::fs::remove_file(&old_log_path)?;
            }

            std::fs::rename(&log_path, &old_log_path)?;

            log::info!("Log file rotated to {}", old_log_path.display());
        }
    }

    Ok(())
}
