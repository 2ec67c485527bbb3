use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading or saving the persisted session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No session found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Session file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Session file {} has unsupported version {found}", .path.display())]
    UnsupportedVersion { path: PathBuf, found: u32 },

    #[error("Failed to access session file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures talking to the music server
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("{endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Invalid response from {endpoint}: {source}")]
    InvalidResponse {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Reading the response from {endpoint} failed: {source}")]
    Body {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write response body: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Build an error from a failed reqwest call, keeping timeouts distinct
    pub(crate) fn from_reqwest(endpoint: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            ApiError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else if source.is_decode() {
            ApiError::InvalidResponse {
                endpoint: endpoint.to_string(),
                source,
            }
        } else {
            ApiError::Transport {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }

    /// Build an error from a failed read of a streamed response body
    pub(crate) fn from_body_read(endpoint: &str, source: std::io::Error) -> Self {
        let timed_out = source.kind() == std::io::ErrorKind::TimedOut
            || source
                .get_ref()
                .and_then(|inner| inner.downcast_ref::<reqwest::Error>())
                .is_some_and(reqwest::Error::is_timeout);

        if timed_out {
            ApiError::Timeout {
                endpoint: endpoint.to_string(),
            }
        } else {
            ApiError::Body {
                endpoint: endpoint.to_string(),
                source,
            }
        }
    }

    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Timeout { .. } | ApiError::Body { .. } => true,
            ApiError::Transport { source, .. } => source.is_connect() || source.is_request(),
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::InvalidResponse { .. } | ApiError::Io(_) => false,
        }
    }

    /// Whether the server rejected our credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401 | 403, .. })
    }
}

/// Failures of a playlist sync run
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Playlist \"{0}\" not found")]
    PlaylistNotFound(String),

    #[error("Directory traversal: {relpath} is not inside {}", .root.display())]
    PathTraversal { relpath: String, root: PathBuf },

    #[error("Filesystem error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to download {relpath}: {source}")]
    Download {
        relpath: String,
        #[source]
        source: ApiError,
    },

    #[error("{} track(s) failed to download: {}", .failures.len(), .failures.join(", "))]
    DownloadsFailed { failures: Vec<String> },
}

impl SyncError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transience() {
        let server_error = ApiError::Status {
            endpoint: "/track/audio".to_string(),
            status: 502,
            body: String::new(),
        };
        assert!(server_error.is_transient());

        let not_found = ApiError::Status {
            endpoint: "/track/audio".to_string(),
            status: 404,
            body: "no such track".to_string(),
        };
        assert!(!not_found.is_transient());
        assert!(!not_found.is_unauthorized());

        let timeout = ApiError::Timeout {
            endpoint: "/track/audio".to_string(),
        };
        assert!(timeout.is_transient());

        let disk_full = ApiError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "No space left on device",
        ));
        assert!(!disk_full.is_transient());
    }

    #[test]
    fn test_body_read_timeout_detected() {
        let err = ApiError::from_body_read(
            "/track/audio",
            std::io::Error::new(std::io::ErrorKind::TimedOut, "operation timed out"),
        );
        assert!(matches!(err, ApiError::Timeout { .. }));
    }

    #[test]
    fn test_unauthorized_detection() {
        for status in [401, 403] {
            let err = ApiError::Status {
                endpoint: "/track/list".to_string(),
                status,
                body: String::new(),
            };
            assert!(err.is_unauthorized());
        }
    }

    #[test]
    fn test_error_messages_carry_context() {
        let err = SyncError::PathTraversal {
            relpath: "../../etc/passwd".to_string(),
            root: PathBuf::from("/music/Favorites"),
        };
        let msg = err.to_string();
        assert!(msg.contains("../../etc/passwd"));
        assert!(msg.contains("/music/Favorites"));

        let err = SyncError::DownloadsFailed {
            failures: vec!["rock/a".to_string(), "rock/b".to_string()],
        };
        assert_eq!(err.to_string(), "2 track(s) failed to download: rock/a, rock/b");
    }
}
