//! Deleting local files that are no longer in the playlist
//!
//! The walk never follows symlinks. A symlink under the root survives only
//! while the listing uses it: a file link must point at an expected track, a
//! directory link must contain one. Any other link is removed as a link; its
//! target is never touched.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use super::Reporter;
use crate::error::SyncError;

/// Files and symlinks under `root` that are not part of `expected`
pub fn find_extraneous(root: &Path, expected: &HashSet<PathBuf>) -> Result<Vec<PathBuf>, SyncError> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut extraneous = Vec::new();

    for entry in WalkDir::new(root).follow_links(false).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            SyncError::io(path, e.into())
        })?;

        if entry.file_type().is_dir() || expected.contains(entry.path()) {
            continue;
        }

        if entry.path_is_symlink() {
            if let Ok(target) = fs::canonicalize(entry.path()) {
                let in_use = if target.is_dir() {
                    expected.iter().any(|path| path.starts_with(&target))
                } else {
                    expected.contains(&target)
                };
                if in_use {
                    continue;
                }
            }
        }

        extraneous.push(entry.into_path());
    }

    Ok(extraneous)
}

/// Delete every file under `root` that is not in `expected`
///
/// Only call this once the expected set covers the whole listing. Emptied
/// directories are left in place. Returns the number of deleted files.
pub fn prune(
    root: &Path,
    expected: &HashSet<PathBuf>,
    reporter: &Reporter<'_>,
) -> Result<usize, SyncError> {
    let extraneous = find_extraneous(root, expected)?;

    for path in &extraneous {
        reporter.delete(root, path);
        remove_entry(path).map_err(|e| SyncError::io(path, e))?;
        log::debug!("Deleted {}", path.display());
    }

    Ok(extraneous.len())
}

/// Remove a file or a symlink without following it
fn remove_entry(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        // Directory symlinks on Windows have to be removed as directories
        Err(e) if cfg!(windows) && path.is_dir() => fs::remove_dir(path).map_err(|_| e),
        result => result,
    }
}

/// Path shown to the user, relative to the playlist directory when possible
pub(crate) fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
