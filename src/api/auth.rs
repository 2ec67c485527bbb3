use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::{build_client, check_status};
use crate::error::ApiError;
use crate::session::Session;

const LOGIN_ENDPOINT: &str = "/auth/login";

/// Username and password for the music server
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

/// Log in to `server` and return a fresh session
///
/// The session is not persisted; the caller decides whether to save it.
pub fn login(server: &str, credentials: &Credentials, timeout: Duration) -> Result<Session, ApiError> {
    let server = server.trim_end_matches('/');
    let client = build_client(timeout)?;

    log::debug!("Logging in to {} as {}", server, credentials.username);

    let response = client
        .post(format!("{server}{LOGIN_ENDPOINT}"))
        .json(credentials)
        .send()
        .map_err(|e| ApiError::from_reqwest(LOGIN_ENDPOINT, e))?;

    let response: LoginResponse = check_status(LOGIN_ENDPOINT, response)?
        .json()
        .map_err(|e| ApiError::from_reqwest(LOGIN_ENDPOINT, e))?;

    Ok(Session::new(server, response.token))
}
