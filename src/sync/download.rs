use backon::{BlockingRetryable, ExponentialBuilder};
use filetime::{set_file_times, FileTime};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::plan::{PlannedTrack, SyncPlan};
use super::{Reporter, SyncOptions, TrackSource};
use crate::error::{ApiError, SyncError};

/// First delay between download attempts; doubles on each retry
const RETRY_MIN_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(8);

/// Result of the download phase
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    pub downloaded: usize,
    pub failed: Vec<String>,
}

/// Download every pending track of `plan`
///
/// Without `continue_on_error` the first failure is returned as-is. With it,
/// failures are collected in [`Outcome::failed`] and the remaining tracks are
/// still processed.
pub(crate) fn execute<S: TrackSource + ?Sized>(
    plan: &SyncPlan,
    source: &S,
    options: &SyncOptions,
    reporter: &Reporter<'_>,
) -> Result<Outcome, SyncError> {
    fs::create_dir_all(&plan.root).map_err(|e| SyncError::io(&plan.root, e))?;

    if options.jobs <= 1 {
        run_sequential(plan, source, options, reporter)
    } else {
        run_parallel(plan, source, options, reporter)
    }
}

fn run_sequential<S: TrackSource + ?Sized>(
    plan: &SyncPlan,
    source: &S,
    options: &SyncOptions,
    reporter: &Reporter<'_>,
) -> Result<Outcome, SyncError> {
    let mut outcome = Outcome::default();

    for track in &plan.tracks {
        reporter.track(track);
        if !track.action.needs_download() {
            continue;
        }

        match fetch_to_file(source, track, options.retries) {
            Ok(bytes) => {
                reporter.downloaded(track, bytes);
                outcome.downloaded += 1;
            }
            Err(e) if options.continue_on_error => {
                log::error!("{e}");
                outcome.failed.push(track.relpath.clone());
            }
            Err(e) => return Err(e),
        }
    }

    Ok(outcome)
}

/// Download on `options.jobs` scoped worker threads
///
/// Workers pull tracks from a shared queue and send results back; the plan
/// itself is only read, so pruning later sees the complete expected set no
/// matter which downloads failed.
fn run_parallel<S: TrackSource + ?Sized>(
    plan: &SyncPlan,
    source: &S,
    options: &SyncOptions,
    reporter: &Reporter<'_>,
) -> Result<Outcome, SyncError> {
    let (work_tx, work_rx) = crossbeam_channel::unbounded::<&PlannedTrack>();
    for track in &plan.tracks {
        if track.action.needs_download() {
            // Receiver is alive until the end of this function
            let _ = work_tx.send(track);
        } else {
            reporter.track(track);
        }
    }
    drop(work_tx);

    let (result_tx, result_rx) = crossbeam_channel::unbounded();
    let abort = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..options.jobs {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            let abort = &abort;

            scope.spawn(move || {
                for track in work_rx.iter() {
                    if abort.load(Ordering::Relaxed) {
                        break;
                    }
                    reporter.track(track);

                    let result = fetch_to_file(source, track, options.retries);
                    if result.is_err() && !options.continue_on_error {
                        abort.store(true, Ordering::Relaxed);
                    }
                    if result_tx.send((track, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut outcome = Outcome::default();
    let mut first_error = None;

    for (track, result) in result_rx.iter() {
        match result {
            Ok(bytes) => {
                reporter.downloaded(track, bytes);
                outcome.downloaded += 1;
            }
            Err(e) => {
                log::error!("{e}");
                outcome.failed.push(track.relpath.clone());
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) if !options.continue_on_error => Err(e),
        _ => Ok(outcome),
    }
}

/// Download one track to its local path and stamp the remote mtime on it
///
/// Transient failures are retried with exponential backoff. Each attempt
/// truncates the file, so a partial body from a failed attempt never survives
/// a successful one.
pub(crate) fn fetch_to_file<S: TrackSource + ?Sized>(
    source: &S,
    track: &PlannedTrack,
    retries: usize,
) -> Result<u64, SyncError> {
    if let Some(parent) = track.local_path.parent() {
        fs::create_dir_all(parent).map_err(|e| SyncError::io(parent, e))?;
    }

    let attempt = || -> Result<u64, ApiError> {
        let mut file = BufWriter::new(File::create(&track.local_path)?);
        let bytes = source.fetch_track(&track.relpath, &mut file)?;
        file.flush()?;
        Ok(bytes)
    };

    let backoff = ExponentialBuilder::default()
        .with_min_delay(RETRY_MIN_DELAY)
        .with_max_delay(RETRY_MAX_DELAY)
        .with_max_times(retries);

    let bytes = attempt
        .retry(backoff)
        .sleep(std::thread::sleep)
        .when(|e: &ApiError| e.is_transient())
        .notify(|e: &ApiError, delay: Duration| {
            log::warn!("Retrying {} in {:?}: {}", track.relpath, delay, e);
        })
        .call()
        .map_err(|e| match e {
            ApiError::Io(source) => SyncError::io(&track.local_path, source),
            source => SyncError::Download {
                relpath: track.relpath.clone(),
                source,
            },
        })?;

    let mtime = FileTime::from_unix_time(track.mtime, 0);
    set_file_times(&track.local_path, FileTime::now(), mtime)
        .map_err(|e| SyncError::io(&track.local_path, e))?;

    Ok(bytes)
}
