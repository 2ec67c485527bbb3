use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cross-platform configuration directory manager
pub struct ConfigManager;

impl ConfigManager {
    /// Get the main configuration directory path following platform conventions:
    /// - Linux: $XDG_CONFIG_HOME/raphson-sync or ~/.config/raphson-sync
    /// - macOS: ~/Library/Application Support/raphson-sync
    /// - Windows: %APPDATA%\raphson-sync
    pub fn config_dir() -> Result<PathBuf> {
        #[cfg(target_os = "linux")]
        {
            // Follow XDG Base Directory Specification
            if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
                Ok(PathBuf::from(xdg_config).join("raphson-sync"))
            } else {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                Ok(home.join(".config").join("raphson-sync"))
            }
        }

        #[cfg(target_os = "macos")]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join("Library").join("Application Support").join("raphson-sync"))
        }

        #[cfg(target_os = "windows")]
        {
            Ok(dirs::config_dir()
                .context("Failed to get Windows config directory")?
                .join("raphson-sync"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
        {
            let home = dirs::home_dir().context("Failed to get home directory")?;
            Ok(home.join(".raphson-sync"))
        }
    }

    /// Get the settings file path (config.toml)
    pub fn settings_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Get the log file path
    pub fn log_file_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("raphson-sync.log"))
    }

    /// Ensure the configuration directory exists
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir).with_context(|| {
            format!("Failed to create config directory: {}", config_dir.display())
        })?;
        Ok(config_dir)
    }
}

/// Tunables for a sync run, read from `config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of tracks downloaded in parallel
    pub jobs: usize,

    /// Extra attempts for a download that failed with a transient error
    pub retries: usize,

    /// Keep going after a track fails instead of aborting the run
    pub continue_on_error: bool,

    /// Timeout for login and listing requests
    pub metadata_timeout_secs: u64,

    /// Timeout for track downloads, which include server-side transcoding
    pub download_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            jobs: 1,
            retries: 2,
            continue_on_error: false,
            metadata_timeout_secs: 10,
            download_timeout_secs: 60,
        }
    }
}

impl Settings {
    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&ConfigManager::settings_path()?)
    }

    /// Load settings from a specific file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(settings.normalized())
    }

    /// Clamp values that would make a run impossible
    pub fn normalized(mut self) -> Self {
        self.jobs = self.jobs.max(1);
        self
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.metadata_timeout_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}
