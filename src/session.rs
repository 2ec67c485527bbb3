use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::SessionError;

/// Default name of the session state file, relative to the invocation directory
pub const DEFAULT_STATE_FILE: &str = "download-state.json";

/// Current schema version of the state file
pub const SESSION_VERSION: u32 = 1;

/// Audio encoding requested from the server when downloading tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    #[default]
    Mp3,
}

impl AudioEncoding {
    /// Transcoding profile passed as the `type` query parameter
    pub fn transcode_profile(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "mp3_with_metadata",
        }
    }

    /// Extension appended to the remote relative path for the local file
    pub fn extension(&self) -> &'static str {
        match self {
            AudioEncoding::Mp3 => "mp3",
        }
    }
}

/// Authenticated session with a music server
///
/// Created once by logging in and persisted as JSON so later invocations can
/// reuse the token. The token never expires from this tool's point of view;
/// if the server rejects it, the user has to log in again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Schema version of the persisted file
    pub version: u32,

    /// Base URL of the server, without trailing slash
    pub server: String,

    /// Opaque token sent as the `token` cookie
    pub token: String,

    /// Preferred download encoding
    #[serde(default)]
    pub encoding: AudioEncoding,
}

impl Session {
    pub fn new(server: &str, token: impl Into<String>) -> Self {
        Session {
            version: SESSION_VERSION,
            server: server.trim_end_matches('/').to_string(),
            token: token.into(),
            encoding: AudioEncoding::default(),
        }
    }

    /// Loads a session from the given state file
    ///
    /// # Errors
    ///
    /// - [`SessionError::NotFound`] if the file does not exist (a fresh login is needed)
    /// - [`SessionError::Corrupt`] if the file is not a valid session document
    /// - [`SessionError::UnsupportedVersion`] if it was written by an unknown schema version
    /// - [`SessionError::Io`] for any other read failure
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        let content = match fs::read(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SessionError::NotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(SessionError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let session: Session =
            serde_json::from_slice(&content).map_err(|source| SessionError::Corrupt {
                path: path.to_path_buf(),
                source,
            })?;

        if session.version != SESSION_VERSION {
            return Err(SessionError::UnsupportedVersion {
                path: path.to_path_buf(),
                found: session.version,
            });
        }

        log::debug!("Loaded session for {} from {}", session.server, path.display());
        Ok(session)
    }

    /// Saves the session, replacing the target file atomically
    ///
    /// The JSON is written to a temporary file next to `path` and then renamed
    /// over it, so a crash never leaves a torn state file behind.
    pub fn save(&self, path: &Path) -> Result<(), SessionError> {
        let io_err = |source| SessionError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let content = serde_json::to_string_pretty(self).map_err(|source| {
            SessionError::Corrupt {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let tmp_path = temp_path_for(path);
        fs::write(&tmp_path, content).map_err(io_err)?;

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(io_err(e));
        }

        log::debug!("Saved session to {}", path.display());
        Ok(())
    }
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string());
    path.with_file_name(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()))
}
