use colored::Colorize;
use std::fmt;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use super::plan::{PlannedTrack, TrackAction};
use super::VerbosityLevel;

/// Per-track progress lines of a sync run
///
/// The CLI writes to stdout. Download workers share one reporter, so every
/// line is written under a lock and lines never interleave.
pub struct Reporter<'a> {
    out: Mutex<Box<dyn Write + Send + 'a>>,
    verbosity: VerbosityLevel,
}

impl<'a> Reporter<'a> {
    pub fn new(out: impl Write + Send + 'a, verbosity: VerbosityLevel) -> Self {
        Reporter {
            out: Mutex::new(Box::new(out)),
            verbosity,
        }
    }

    pub fn stdout(verbosity: VerbosityLevel) -> Reporter<'static> {
        Reporter::new(io::stdout(), verbosity)
    }

    /// `OK:`, `Out of date:` or `Missing:` for one planned track
    pub fn track(&self, track: &PlannedTrack) {
        let label = format!("{}:", track.action.label());
        match track.action {
            TrackAction::UpToDate if self.verbosity == VerbosityLevel::Quiet => {}
            TrackAction::UpToDate => self.line(format_args!("{} {}", label.green(), track.relpath)),
            TrackAction::OutOfDate => self.line(format_args!("{} {}", label.yellow(), track.relpath)),
            TrackAction::Missing => self.line(format_args!("{} {}", label.cyan(), track.relpath)),
        }
    }

    pub fn downloaded(&self, track: &PlannedTrack, bytes: u64) {
        if self.verbosity == VerbosityLevel::Verbose {
            self.line(format_args!(
                "  {} {} ({:.1} MB)",
                "✓".green(),
                track.relpath,
                bytes as f64 / (1024.0 * 1024.0)
            ));
        }
    }

    /// `Delete:` with the removed file's own path relative to `root`
    pub fn delete(&self, root: &Path, path: &Path) {
        self.line(format_args!(
            "{} {}",
            "Delete:".red(),
            super::prune::display_relative(root, path)
        ));
    }

    fn line(&self, args: fmt::Arguments<'_>) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        // A closed stdout must not abort the sync
        let _ = writeln!(out, "{args}");
    }
}
