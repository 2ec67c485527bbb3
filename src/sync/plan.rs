use filetime::FileTime;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::paths::resolve_track_path;
use crate::api::PlaylistListing;
use crate::error::SyncError;
use crate::session::AudioEncoding;

/// What a sync run has to do for one track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackAction {
    /// Local file exists with the remote modification time
    UpToDate,
    /// Local file exists but its modification time differs
    OutOfDate,
    /// No local file yet
    Missing,
}

impl TrackAction {
    pub fn needs_download(self) -> bool {
        !matches!(self, TrackAction::UpToDate)
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackAction::UpToDate => "OK",
            TrackAction::OutOfDate => "Out of date",
            TrackAction::Missing => "Missing",
        }
    }
}

impl fmt::Display for TrackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One listing entry mapped onto the local filesystem
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTrack {
    pub relpath: String,
    pub local_path: PathBuf,
    pub mtime: i64,
    pub action: TrackAction,
}

/// Everything a sync run will do, computed before anything is written
#[derive(Debug, Clone)]
pub struct SyncPlan {
    /// Resolved playlist directory
    pub root: PathBuf,

    /// Tracks in listing order
    pub tracks: Vec<PlannedTrack>,

    /// Resolved local paths of every track; anything else under `root` gets pruned
    pub expected: HashSet<PathBuf>,
}

impl SyncPlan {
    /// Tracks that have to be downloaded
    pub fn pending(&self) -> impl Iterator<Item = &PlannedTrack> {
        self.tracks.iter().filter(|t| t.action.needs_download())
    }

    pub fn up_to_date_count(&self) -> usize {
        self.tracks.len() - self.pending().count()
    }
}

/// Compare the listing against the files under `root`
///
/// Every remote path is validated before anything is returned, so a single
/// traversal attempt rejects the whole listing and nothing is ever written.
pub fn plan_sync(
    listing: &PlaylistListing,
    root: &Path,
    encoding: AudioEncoding,
) -> Result<SyncPlan, SyncError> {
    let mut tracks = Vec::with_capacity(listing.tracks.len());
    let mut expected = HashSet::with_capacity(listing.tracks.len());

    for remote in &listing.tracks {
        let local_path = resolve_track_path(root, &remote.path, encoding.extension())?;

        if !expected.insert(local_path.clone()) {
            log::warn!("Duplicate track in listing: {}", remote.path);
            continue;
        }

        let action = match local_mtime(&local_path)? {
            Some(mtime) if mtime == remote.mtime => TrackAction::UpToDate,
            Some(mtime) => {
                log::debug!(
                    "{}: local mtime {} != remote mtime {}",
                    remote.path,
                    mtime,
                    remote.mtime
                );
                TrackAction::OutOfDate
            }
            None => TrackAction::Missing,
        };

        tracks.push(PlannedTrack {
            relpath: remote.path.clone(),
            local_path,
            mtime: remote.mtime,
            action,
        });
    }

    Ok(SyncPlan {
        root: root.to_path_buf(),
        tracks,
        expected,
    })
}

/// Modification time of a regular file in whole seconds, `None` if absent
fn local_mtime(path: &Path) -> Result<Option<i64>, SyncError> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => {
            Ok(Some(FileTime::from_last_modification_time(&metadata).unix_seconds()))
        }
        Ok(_) => Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SyncError::io(path, e)),
    }
}
