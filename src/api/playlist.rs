use serde::{Deserialize, Serialize};

use super::{check_status, ApiClient};
use crate::error::{ApiError, SyncError};

const LIST_ENDPOINT: &str = "/track/list";

/// A track as listed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTrack {
    /// Server-assigned POSIX-style path, relative to the playlist
    pub path: String,

    /// Last modification time of the source audio, in unix seconds
    pub mtime: i64,
}

/// A named playlist and its tracks, in server order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistListing {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<RemoteTrack>,
}

#[derive(Deserialize)]
struct ListResponse {
    playlists: Vec<PlaylistListing>,
}

impl ApiClient {
    /// Fetch every playlist visible to this session
    pub fn fetch_listing(&self) -> Result<Vec<PlaylistListing>, ApiError> {
        log::info!("Downloading track list");

        let response = self
            .authenticated(self.metadata.get(self.url(LIST_ENDPOINT)))
            .send()
            .map_err(|e| ApiError::from_reqwest(LIST_ENDPOINT, e))?;

        let listing: ListResponse = check_status(LIST_ENDPOINT, response)?
            .json()
            .map_err(|e| ApiError::from_reqwest(LIST_ENDPOINT, e))?;

        log::debug!("Server returned {} playlists", listing.playlists.len());
        Ok(listing.playlists)
    }
}

/// Select the playlist whose name matches `name` exactly
pub fn find_by_name(listings: Vec<PlaylistListing>, name: &str) -> Result<PlaylistListing, SyncError> {
    listings
        .into_iter()
        .find(|playlist| playlist.name == name)
        .ok_or_else(|| SyncError::PlaylistNotFound(name.to_string()))
}
