//! HTTP client for the music server
//!
//! The server exposes a fixed contract:
//! - `POST /auth/login` exchanges credentials for a token
//! - `GET /track/list` returns every playlist with its tracks
//! - `GET /track/audio` streams a transcoded track
//!
//! Authenticated requests carry the token as a `token` cookie.

mod auth;
mod playlist;
mod track;

pub use auth::{login, Credentials};
pub use playlist::{find_by_name, PlaylistListing, RemoteTrack};

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::COOKIE;
use std::time::Duration;

use crate::error::ApiError;
use crate::session::Session;

/// Authenticated client bound to one [`Session`]
///
/// Holds two HTTP clients because metadata calls and track downloads use very
/// different timeouts: transcoding a track server-side can take a while.
pub struct ApiClient {
    session: Session,
    metadata: Client,
    download: Client,
}

impl ApiClient {
    pub fn new(
        session: Session,
        metadata_timeout: Duration,
        download_timeout: Duration,
    ) -> Result<Self, ApiError> {
        Ok(ApiClient {
            session,
            metadata: build_client(metadata_timeout)?,
            download: build_client(download_timeout)?,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.session.server, endpoint)
    }

    fn authenticated(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(COOKIE, format!("token={}", self.session.token))
    }
}

/// Build a blocking HTTP client with a whole-request timeout
pub(crate) fn build_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|source| ApiError::Transport {
            endpoint: "client setup".to_string(),
            source,
        })
}

/// Turn a non-2xx response into [`ApiError::Status`], keeping the body for diagnosis
pub(crate) fn check_status(endpoint: &str, response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(ApiError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}
