use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::SyncError;

/// Remove `.` and `..` components without touching the filesystem
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// Resolve an absolute path that may not exist yet
///
/// The path is normalized first, then its deepest existing ancestor is
/// canonicalized so symlinks along the way are followed. The non-existent
/// remainder is appended as-is.
pub(crate) fn resolve(path: &Path) -> io::Result<PathBuf> {
    let normalized = normalize(path);

    for ancestor in normalized.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        if let Ok(canonical) = fs::canonicalize(ancestor) {
            let rest = normalized
                .strip_prefix(ancestor)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            return Ok(if rest.as_os_str().is_empty() {
                canonical
            } else {
                canonical.join(rest)
            });
        }
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no existing ancestor for {}", path.display()),
    ))
}

/// Resolve the local directory for a playlist, relative to `base`
///
/// The name has to be a plain relative path below `base`: no `..`, no root,
/// at least one real component. The directory itself may be a symlink to
/// anywhere, as long as it does not resolve to `base` or one of its
/// ancestors, since pruning deletes everything under it that is not part of
/// the playlist.
pub fn resolve_playlist_root(base: &Path, playlist_name: &str) -> Result<PathBuf, SyncError> {
    let base = resolve(base).map_err(|e| SyncError::io(base, e))?;
    let traversal = || SyncError::PathTraversal {
        relpath: playlist_name.to_string(),
        root: base.clone(),
    };

    let name = Path::new(playlist_name);
    let mut has_normal = false;
    for component in name.components() {
        match component {
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(traversal());
            }
        }
    }
    if !has_normal {
        return Err(traversal());
    }

    let candidate = base.join(name);
    let root = resolve(&candidate).map_err(|e| SyncError::io(&candidate, e))?;

    if base.starts_with(&root) {
        return Err(traversal());
    }

    Ok(root)
}

/// Map a server-supplied relative path to a local file under `root`
///
/// `root` must already be resolved. The result is fully resolved and is
/// guaranteed to be a strict descendant of `root`; anything else is reported
/// as [`SyncError::PathTraversal`].
pub fn resolve_track_path(root: &Path, relpath: &str, extension: &str) -> Result<PathBuf, SyncError> {
    let candidate = root.join(format!("{relpath}.{extension}"));
    let resolved = resolve(&candidate).map_err(|e| SyncError::io(&candidate, e))?;

    if resolved == root || !resolved.starts_with(root) {
        return Err(SyncError::PathTraversal {
            relpath: relpath.to_string(),
            root: root.to_path_buf(),
        });
    }

    Ok(resolved)
}
