//! Session handlers
//!
//! Loads the persisted session, or runs the interactive login when there is
//! none (or when a fresh login was requested) and saves the result.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::time::Duration;

use crate::api;
use crate::error::SessionError;
use crate::logger;
use crate::onboarding;
use crate::session::Session;

/// Return a usable session, logging in first if needed
pub fn ensure_session(state_path: &Path, force_login: bool, timeout: Duration) -> Result<Session> {
    if !force_login {
        match Session::load(state_path) {
            Ok(session) => return Ok(session),
            Err(SessionError::NotFound(_)) => {
                log::info!("No session at {}", state_path.display());
            }
            Err(e) => {
                return Err(e).context("Stored session is unusable; run again with --login");
            }
        }
    }

    let answers = onboarding::prompt_login().context("Login cancelled or failed")?;
    login_and_save(&answers.server, &answers.credentials, state_path, timeout)
}

/// Exchange credentials for a session and persist it at `state_path`
pub fn login_and_save(
    server: &str,
    credentials: &api::Credentials,
    state_path: &Path,
    timeout: Duration,
) -> Result<Session> {
    let session = api::login(server, credentials, timeout)
        .with_context(|| format!("Failed to log in to {server}"))?;
    println!("{}", "✓ Logged in successfully".green());

    session
        .save(state_path)
        .context("Failed to save session")?;
    logger::log_run_event(&format!(
        "Logged in to {} as {}",
        session.server, credentials.username
    ));

    Ok(session)
}
