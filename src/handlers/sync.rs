//! Playlist sync handler

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use crate::api::{self, ApiClient};
use crate::config::Settings;
use crate::logger;
use crate::session::Session;
use crate::sync::{self, SyncOptions, SyncSummary, VerbosityLevel};

/// Fetch the listing, find `playlist_name` and mirror it under `base_dir`
pub fn handle_sync(
    session: Session,
    settings: &Settings,
    playlist_name: &str,
    base_dir: &Path,
    mut options: SyncOptions,
) -> Result<SyncSummary> {
    options.encoding = session.encoding;

    let client = ApiClient::new(
        session,
        settings.metadata_timeout(),
        settings.download_timeout(),
    )
    .context("Failed to create HTTP client")?;

    let listings = client.fetch_listing().map_err(|e| {
        let hint = if e.is_unauthorized() {
            " (the session may have expired; run again with --login)"
        } else {
            ""
        };
        anyhow::Error::new(e).context(format!("Failed to fetch track list{hint}"))
    })?;

    let playlist = api::find_by_name(listings, playlist_name)?;
    let root = sync::resolve_playlist_root(base_dir, playlist_name)?;

    if options.verbosity != VerbosityLevel::Quiet {
        println!(
            "{} {} ({} tracks) into {}",
            if options.dry_run { "Checking" } else { "Syncing" }.cyan().bold(),
            playlist.name,
            playlist.tracks.len(),
            root.display()
        );
    }

    logger::log_run_event(&format!(
        "Sync of {} from {} started",
        playlist.name,
        client.session().server
    ));

    let summary = sync::sync_playlist(&playlist, &root, &client, &options)?;

    logger::log_run_event(&format!(
        "Sync of {} finished: {} up to date, {} downloaded, {} deleted, {} failed{}",
        playlist.name,
        summary.up_to_date,
        summary.downloaded,
        summary.deleted,
        summary.failed.len(),
        if summary.dry_run { " (dry run)" } else { "" }
    ));

    Ok(summary)
}
