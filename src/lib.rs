//! # raphson-sync
//!
//! A command-line tool that mirrors a playlist from a Raphson music server into
//! a local directory.
//!
//! ## Overview
//!
//! `raphson-sync <playlist>` logs in once, remembers the session in
//! `download-state.json`, and on every run brings `./<playlist>/` in line with
//! the server: missing tracks are downloaded, tracks whose modification time
//! changed are downloaded again, and files that are no longer in the playlist
//! are deleted. Local changes are never pushed back; the server always wins.
//!
//! ## Architecture
//!
//! - Session persistence ([`session`])
//! - Server access: login, listing, track download ([`api`])
//! - Planning, downloading and pruning ([`sync`])
//! - Settings and logging ([`config`], [`logger`])
//! - Interactive login and command handlers ([`onboarding`], [`handlers`])

/// Platform-agnostic configuration directory and `config.toml` settings.
pub mod config;

/// Typed errors for sessions, server calls and sync runs.
pub mod error;

/// HTTP client for the music server.
///
/// Covers the three endpoints the tool needs: login, the playlist listing and
/// the transcoded audio stream. All requests use explicit timeouts.
pub mod api;

/// Command handler functions used by the binary.
pub mod handlers;

/// Logging configuration and utilities.
///
/// Console logging is configurable via `RUST_LOG`; run-level events are also
/// appended to a log file in the config directory, rotated above 10MB.
pub mod logger;

/// Interactive first-time login prompt.
pub mod onboarding;

/// Persisted session: server URL, token and preferred encoding.
pub mod session;

/// Core synchronization logic.
///
/// Plans every track before writing anything, validates that server-supplied
/// paths stay inside the playlist directory, downloads missing and stale
/// tracks (optionally in parallel), then prunes files the server no longer
/// lists.
pub mod sync;

pub use sync::VerbosityLevel;
