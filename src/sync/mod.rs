// Module declarations
mod download;
mod paths;
mod plan;
mod prune;
mod report;

// Re-export public types and functions
pub use paths::{resolve_playlist_root, resolve_track_path};
pub use plan::{plan_sync, PlannedTrack, SyncPlan, TrackAction};
pub use prune::{find_extraneous, prune};
pub use report::Reporter;

use colored::Colorize;
use std::io::Write;
use std::path::Path;

use crate::api::PlaylistListing;
use crate::config::Settings;
use crate::error::{ApiError, SyncError};
use crate::session::AudioEncoding;

/// How much per-track output a sync run prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerbosityLevel {
    /// Only changes: downloads and deletions
    Quiet,
    /// Every track, including the ones already up to date
    #[default]
    Normal,
    /// Every track plus download sizes
    Verbose,
}

/// Anything that can stream a track's audio into a writer
///
/// Implemented by [`crate::api::ApiClient`]; the sync engine only depends on
/// this trait.
pub trait TrackSource: Send + Sync {
    fn fetch_track(&self, relpath: &str, dest: &mut dyn Write) -> Result<u64, ApiError>;
}

/// Knobs for a single sync run
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub encoding: AudioEncoding,
    pub jobs: usize,
    pub retries: usize,
    pub continue_on_error: bool,
    pub dry_run: bool,
    pub verbosity: VerbosityLevel,
}

impl Default for SyncOptions {
    fn default() -> Self {
        SyncOptions::from_settings(&Settings::default(), AudioEncoding::default())
    }
}

impl SyncOptions {
    pub fn from_settings(settings: &Settings, encoding: AudioEncoding) -> Self {
        SyncOptions {
            encoding,
            jobs: settings.jobs.max(1),
            retries: settings.retries,
            continue_on_error: settings.continue_on_error,
            dry_run: false,
            verbosity: VerbosityLevel::Normal,
        }
    }
}

/// What a sync run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub up_to_date: usize,
    pub downloaded: usize,
    pub deleted: usize,
    /// Relative paths of tracks that could not be downloaded
    pub failed: Vec<String>,
    pub dry_run: bool,
}

impl SyncSummary {
    /// Turn collected download failures into an error
    pub fn ensure_complete(&self) -> Result<(), SyncError> {
        if self.failed.is_empty() {
            Ok(())
        } else {
            Err(SyncError::DownloadsFailed {
                failures: self.failed.clone(),
            })
        }
    }

    pub fn print(&self) {
        let verb = if self.dry_run { "would be " } else { "" };
        println!();
        println!(
            "{} {} up to date, {} {}downloaded, {} {}deleted",
            "Summary:".bold(),
            self.up_to_date,
            self.downloaded,
            verb,
            self.deleted,
            verb,
        );
        if !self.failed.is_empty() {
            println!("  {} {} failed", "✗".red(), self.failed.len());
        }
    }
}

/// Mirror `listing` into `root`, reporting progress on stdout
///
/// 1. Plan: validate every remote path and compare mtimes. Nothing is written
///    if any path escapes `root`.
/// 2. Download missing and stale tracks, in listing order unless `jobs > 1`.
/// 3. Prune files under `root` that are not in the listing. This only happens
///    once every track has been handled, so an aborted run never deletes
///    anything.
pub fn sync_playlist<S: TrackSource + ?Sized>(
    listing: &PlaylistListing,
    root: &Path,
    source: &S,
    options: &SyncOptions,
) -> Result<SyncSummary, SyncError> {
    let reporter = Reporter::stdout(options.verbosity);
    sync_playlist_with(listing, root, source, options, &reporter)
}

/// [`sync_playlist`] with the progress lines going to `reporter`
pub fn sync_playlist_with<S: TrackSource + ?Sized>(
    listing: &PlaylistListing,
    root: &Path,
    source: &S,
    options: &SyncOptions,
    reporter: &Reporter<'_>,
) -> Result<SyncSummary, SyncError> {
    let plan = plan_sync(listing, root, options.encoding)?;
    log::info!(
        "Playlist {}: {} tracks, {} to download",
        listing.name,
        plan.tracks.len(),
        plan.pending().count()
    );

    if options.dry_run {
        return dry_run(&plan, reporter);
    }

    let outcome = download::execute(&plan, source, options, reporter)?;
    let deleted = prune(&plan.root, &plan.expected, reporter)?;

    Ok(SyncSummary {
        up_to_date: plan.up_to_date_count(),
        downloaded: outcome.downloaded,
        deleted,
        failed: outcome.failed,
        dry_run: false,
    })
}

fn dry_run(plan: &SyncPlan, reporter: &Reporter<'_>) -> Result<SyncSummary, SyncError> {
    for track in &plan.tracks {
        reporter.track(track);
    }

    let extraneous = find_extraneous(&plan.root, &plan.expected)?;
    for path in &extraneous {
        reporter.delete(&plan.root, path);
    }

    Ok(SyncSummary {
        up_to_date: plan.up_to_date_count(),
        downloaded: plan.pending().count(),
        deleted: extraneous.len(),
        failed: Vec::new(),
        dry_run: true,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::RemoteTrack;
    use filetime::{set_file_mtime, FileTime};
    use std::collections::HashMap;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    /// In-memory track source that counts requests
    #[derive(Default)]
    pub(crate) struct FakeSource {
        tracks: HashMap<String, Vec<u8>>,
        transient_failures: Mutex<HashMap<String, usize>>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl FakeSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_track(mut self, relpath: &str, body: &[u8]) -> Self {
            self.tracks.insert(relpath.to_string(), body.to_vec());
            self
        }

        /// Answer the first `times` requests for `relpath` with HTTP 503
        pub fn failing_first(self, relpath: &str, times: usize) -> Self {
            self.transient_failures
                .lock()
                .unwrap()
                .insert(relpath.to_string(), times);
            self
        }

        pub fn calls(&self, relpath: &str) -> usize {
            self.calls.lock().unwrap().get(relpath).copied().unwrap_or(0)
        }

        pub fn total_calls(&self) -> usize {
            self.calls.lock().unwrap().values().sum()
        }
    }

    impl TrackSource for FakeSource {
        fn fetch_track(&self, relpath: &str, dest: &mut dyn Write) -> Result<u64, ApiError> {
            *self.calls.lock().unwrap().entry(relpath.to_string()).or_default() += 1;

            if let Some(remaining) = self.transient_failures.lock().unwrap().get_mut(relpath) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(ApiError::Status {
                        endpoint: "/track/audio".to_string(),
                        status: 503,
                        body: "busy".to_string(),
                    });
                }
            }

            match self.tracks.get(relpath) {
                Some(body) => {
                    dest.write_all(body)?;
                    Ok(body.len() as u64)
                }
                None => Err(ApiError::Status {
                    endpoint: "/track/audio".to_string(),
                    status: 404,
                    body: "not found".to_string(),
                }),
            }
        }
    }

    fn favorites(tracks: &[(&str, i64)]) -> PlaylistListing {
        PlaylistListing {
            name: "Favorites".to_string(),
            tracks: tracks
                .iter()
                .map(|(path, mtime)| RemoteTrack {
                    path: path.to_string(),
                    mtime: *mtime,
                })
                .collect(),
        }
    }

    fn source_for(listing: &PlaylistListing) -> FakeSource {
        listing.tracks.iter().fold(FakeSource::new(), |source, track| {
            source.with_track(&track.path, format!("audio of {}", track.path).as_bytes())
        })
    }

    fn mtime_of(path: &Path) -> i64 {
        FileTime::from_last_modification_time(&fs::metadata(path).unwrap()).unix_seconds()
    }

    /// Every file under `root`, relative, sorted
    fn local_files(root: &Path) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| prune::display_relative(root, e.path()))
            .collect();
        files.sort();
        files
    }

    fn setup() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let root = resolve_playlist_root(temp_dir.path(), "Favorites").unwrap();
        (temp_dir, root)
    }

    fn place(root: &Path, relative: &str, mtime: i64) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"local copy").unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    fn sync_silently<S: TrackSource>(
        listing: &PlaylistListing,
        root: &Path,
        source: &S,
        options: &SyncOptions,
    ) -> Result<SyncSummary, SyncError> {
        let reporter = Reporter::new(std::io::sink(), options.verbosity);
        sync_playlist_with(listing, root, source, options, &reporter)
    }

    /// Run a sync and return what it printed
    fn sync_captured<S: TrackSource>(
        listing: &PlaylistListing,
        root: &Path,
        source: &S,
        options: &SyncOptions,
    ) -> (Result<SyncSummary, SyncError>, String) {
        colored::control::set_override(false);
        let mut out = Vec::new();
        let result = {
            let reporter = Reporter::new(&mut out, options.verbosity);
            sync_playlist_with(listing, root, source, options, &reporter)
        };
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_first_sync_reports_missing_track() {
        let (_temp_dir, root) = setup();
        let listing = favorites(&[("rock/song1", 1_700_000_000)]);
        let source = source_for(&listing);

        let (result, out) = sync_captured(&listing, &root, &source, &SyncOptions::default());

        result.unwrap();
        assert_eq!(out, "Missing: rock/song1\n");
        assert_eq!(mtime_of(&root.join("rock/song1.mp3")), 1_700_000_000);
    }

    #[test]
    fn test_up_to_date_track_reports_ok() {
        let (_temp_dir, root) = setup();
        place(&root, "rock/song1.mp3", 1_700_000_000);
        let listing = favorites(&[("rock/song1", 1_700_000_000)]);
        let source = source_for(&listing);

        let (result, out) = sync_captured(&listing, &root, &source, &SyncOptions::default());

        result.unwrap();
        assert_eq!(out, "OK: rock/song1\n");
        assert_eq!(source.total_calls(), 0);
    }

    #[test]
    fn test_delete_line_names_the_deleted_file() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1_600_000_000);
        let listing = favorites(&[("rock/song1", 1_700_000_000)]);
        let source = source_for(&listing);

        let (result, out) = sync_captured(&listing, &root, &source, &SyncOptions::default());

        result.unwrap();
        assert_eq!(out, "Missing: rock/song1\nDelete: old/track.mp3\n");
        assert!(!root.join("old/track.mp3").exists());
    }

    #[test]
    fn test_dry_run_reports_planned_changes() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1);
        place(&root, "rock/song1.mp3", 5);
        let listing = favorites(&[("rock/song1", 6)]);
        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };

        let (result, out) = sync_captured(&listing, &root, &FakeSource::new(), &options);

        result.unwrap();
        assert_eq!(out, "Out of date: rock/song1\nDelete: old/track.mp3\n");
        assert!(root.join("old/track.mp3").exists());
    }

    #[test]
    fn test_missing_track_is_downloaded() {
        let (_temp_dir, root) = setup();
        let listing = favorites(&[("rock/song1", 1_700_000_000)]);
        let source = source_for(&listing);

        let summary = sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap();

        let file = root.join("rock/song1.mp3");
        assert_eq!(fs::read(&file).unwrap(), b"audio of rock/song1");
        assert_eq!(mtime_of(&file), 1_700_000_000);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.up_to_date, 0);
    }

    #[test]
    fn test_matching_mtime_is_not_downloaded() {
        let (_temp_dir, root) = setup();
        place(&root, "rock/song1.mp3", 1_700_000_000);
        let listing = favorites(&[("rock/song1", 1_700_000_000)]);
        let source = source_for(&listing);

        let summary = sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap();

        assert_eq!(source.total_calls(), 0);
        assert_eq!(summary.up_to_date, 1);
        assert_eq!(fs::read(root.join("rock/song1.mp3")).unwrap(), b"local copy");
    }

    #[test]
    fn test_one_second_difference_is_stale() {
        let (_temp_dir, root) = setup();
        place(&root, "rock/song1.mp3", 1_699_999_999);
        let listing = favorites(&[("rock/song1", 1_700_000_000)]);
        let source = source_for(&listing);

        sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap();

        let file = root.join("rock/song1.mp3");
        assert_eq!(source.calls("rock/song1"), 1);
        assert_eq!(fs::read(&file).unwrap(), b"audio of rock/song1");
        assert_eq!(mtime_of(&file), 1_700_000_000);
    }

    #[test]
    fn test_unlisted_file_is_pruned() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1_600_000_000);
        let listing = favorites(&[("rock/song1", 1_700_000_000)]);
        let source = source_for(&listing);

        let summary = sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap();

        assert!(!root.join("old/track.mp3").exists());
        assert_eq!(summary.deleted, 1);
        assert_eq!(local_files(&root), vec!["rock/song1.mp3"]);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let (_temp_dir, root) = setup();
        let listing = favorites(&[("a/one", 1_700_000_000), ("b/two", 1_700_000_500)]);
        let source = source_for(&listing);

        sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap();
        assert_eq!(source.total_calls(), 2);

        let second = sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap();
        assert_eq!(source.total_calls(), 2);
        assert_eq!(second.downloaded, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.up_to_date, 2);
    }

    #[test]
    fn test_converges_from_any_local_state() {
        let (_temp_dir, root) = setup();
        place(&root, "a/one.mp3", 1_700_000_000);
        place(&root, "b/two.mp3", 42);
        place(&root, "c/extra.mp3", 1_700_000_000);
        place(&root, "notes.txt", 1);
        let listing = favorites(&[
            ("a/one", 1_700_000_000),
            ("b/two", 1_700_000_500),
            ("d/three", 1_700_001_000),
        ]);
        let source = source_for(&listing);

        sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap();

        assert_eq!(
            local_files(&root),
            vec!["a/one.mp3", "b/two.mp3", "d/three.mp3"]
        );
        for track in &listing.tracks {
            assert_eq!(mtime_of(&root.join(format!("{}.mp3", track.path))), track.mtime);
        }
    }

    #[test]
    fn test_traversal_aborts_before_any_write() {
        let (temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1);
        let listing = favorites(&[("rock/song1", 1), ("../../etc/passwd", 1)]);
        let source = source_for(&listing);

        let err = sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap_err();

        assert!(matches!(err, SyncError::PathTraversal { .. }));
        assert_eq!(source.total_calls(), 0);
        assert_eq!(local_files(&root), vec!["old/track.mp3"]);
        assert!(!temp_dir.path().join("etc").exists());
    }

    #[test]
    fn test_failure_aborts_without_pruning() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1);
        let listing = favorites(&[("a/one", 1), ("b/broken", 2), ("c/three", 3)]);
        let source = FakeSource::new()
            .with_track("a/one", b"1")
            .with_track("c/three", b"3");

        let err = sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap_err();

        assert!(matches!(err, SyncError::Download { ref relpath, .. } if relpath == "b/broken"));
        // Processed tracks stay updated, later ones are untouched, nothing pruned
        assert!(root.join("a/one.mp3").exists());
        assert!(!root.join("c/three.mp3").exists());
        assert!(root.join("old/track.mp3").exists());
    }

    #[test]
    fn test_continue_on_error_collects_failures() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1);
        let listing = favorites(&[("a/one", 1), ("b/broken", 2), ("c/three", 3)]);
        let source = FakeSource::new()
            .with_track("a/one", b"1")
            .with_track("c/three", b"3");
        let options = SyncOptions {
            continue_on_error: true,
            ..Default::default()
        };

        let summary = sync_silently(&listing, &root, &source, &options).unwrap();

        assert_eq!(summary.downloaded, 2);
        assert_eq!(summary.failed, vec!["b/broken"]);
        assert!(summary.ensure_complete().is_err());
        assert!(root.join("c/three.mp3").exists());
        assert!(!root.join("old/track.mp3").exists());
    }

    #[test]
    fn test_redownloaded_track_is_never_pruned() {
        let (_temp_dir, root) = setup();
        place(&root, "rock/song1.mp3", 5);
        let listing = favorites(&[("rock/song1", 6)]);
        let source = source_for(&listing);

        let summary = sync_silently(&listing, &root, &source, &SyncOptions::default()).unwrap();

        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.deleted, 0);
        assert!(root.join("rock/song1.mp3").exists());
    }

    #[test]
    fn test_parallel_downloads_converge() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1);
        let tracks: Vec<(String, i64)> = (0..20)
            .map(|i| (format!("dir{}/track{}", i % 4, i), 1_700_000_000 + i))
            .collect();
        let refs: Vec<(&str, i64)> = tracks.iter().map(|(p, m)| (p.as_str(), *m)).collect();
        let listing = favorites(&refs);
        let source = source_for(&listing);
        let options = SyncOptions {
            jobs: 4,
            ..Default::default()
        };

        let summary = sync_silently(&listing, &root, &source, &options).unwrap();

        assert_eq!(summary.downloaded, 20);
        assert_eq!(summary.deleted, 1);
        assert_eq!(source.total_calls(), 20);
        assert_eq!(local_files(&root).len(), 20);
        for track in &listing.tracks {
            assert_eq!(mtime_of(&root.join(format!("{}.mp3", track.path))), track.mtime);
        }
    }

    #[test]
    fn test_parallel_failure_keeps_unlisted_files() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1);
        let listing = favorites(&[("a/one", 1), ("b/broken", 2)]);
        let source = FakeSource::new().with_track("a/one", b"1");
        let options = SyncOptions {
            jobs: 3,
            ..Default::default()
        };

        let err = sync_silently(&listing, &root, &source, &options).unwrap_err();

        assert!(matches!(err, SyncError::Download { .. }));
        assert!(root.join("old/track.mp3").exists());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1);
        place(&root, "rock/song1.mp3", 1_700_000_000);
        let listing = favorites(&[("rock/song1", 1_700_000_000), ("rock/song2", 1)]);
        let source = source_for(&listing);
        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };

        let summary = sync_silently(&listing, &root, &source, &options).unwrap();

        assert_eq!(
            summary,
            SyncSummary {
                up_to_date: 1,
                downloaded: 1,
                deleted: 1,
                failed: vec![],
                dry_run: true,
            }
        );
        assert_eq!(source.total_calls(), 0);
        assert_eq!(local_files(&root), vec!["old/track.mp3", "rock/song1.mp3"]);
    }

    #[test]
    fn test_empty_listing_creates_root_and_prunes() {
        let (_temp_dir, root) = setup();
        place(&root, "old/track.mp3", 1);

        let summary =
            sync_silently(&favorites(&[]), &root, &FakeSource::new(), &SyncOptions::default())
                .unwrap();

        assert_eq!(summary.deleted, 1);
        assert!(root.is_dir());
        assert!(local_files(&root).is_empty());
    }
}
