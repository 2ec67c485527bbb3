use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use inquire::{Password, PasswordDisplayMode, Text};

use crate::api::Credentials;

/// Answers collected by the first-time login prompt
#[derive(Debug)]
pub struct LoginPrompt {
    pub server: String,
    pub credentials: Credentials,
}

/// Check if we're running in an interactive terminal
pub fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// Ask for the server URL, user name and password
pub fn prompt_login() -> Result<LoginPrompt> {
    if !is_interactive() {
        return Err(anyhow!(
            "Not configured and not running in a terminal; run raphson-sync interactively once to log in"
        ));
    }

    println!("\n{}", "Not configured, please log in".cyan().bold());
    println!();

    let server = Text::new("Server URL:")
        .with_placeholder("https://music.example.com")
        .with_validator(|input: &str| {
            if is_valid_server_url(input) {
                Ok(inquire::validator::Validation::Valid)
            } else {
                Ok(inquire::validator::Validation::Invalid(
                    "URL must start with 'http://' or 'https://'".into(),
                ))
            }
        })
        .prompt()
        .context("Failed to get server URL")?;

    let username = Text::new("User name:")
        .prompt()
        .context("Failed to get user name")?;

    let password = Password::new("Password:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to get password")?;

    Ok(LoginPrompt {
        server: server.trim().trim_end_matches('/').to_string(),
        credentials: Credentials { username, password },
    })
}

fn is_valid_server_url(url: &str) -> bool {
    let url = url.trim();
    url.starts_with("https://") || url.starts_with("http://")
}
