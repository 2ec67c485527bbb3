use std::io::{self, Read, Write};

use super::{check_status, ApiClient};
use crate::error::ApiError;
use crate::sync::TrackSource;

const AUDIO_ENDPOINT: &str = "/track/audio";

/// Size of the buffer used to stream a track body into the destination
const COPY_BUFFER_SIZE: usize = 64 * 1024;

impl ApiClient {
    /// Stream one track, transcoded to the session's encoding, into `dest`
    ///
    /// The body is copied as it arrives; the track is never held in memory.
    /// Returns the number of bytes written. Failures reading the body are
    /// server-side errors, failures writing `dest` come back as [`ApiError::Io`].
    pub fn fetch_track<W: Write + ?Sized>(&self, relpath: &str, dest: &mut W) -> Result<u64, ApiError> {
        let profile = self.session.encoding.transcode_profile();
        log::debug!("GET {AUDIO_ENDPOINT} path={relpath} type={profile}");

        let response = self
            .authenticated(self.download.get(self.url(AUDIO_ENDPOINT)))
            .query(&[("path", relpath), ("type", profile)])
            .send()
            .map_err(|e| ApiError::from_reqwest(AUDIO_ENDPOINT, e))?;

        let mut response = check_status(AUDIO_ENDPOINT, response)?;
        copy_body(&mut response, dest)
    }
}

/// Copy a response body into `dest`, keeping read and write failures apart
fn copy_body<R: Read + ?Sized, W: Write + ?Sized>(body: &mut R, dest: &mut W) -> Result<u64, ApiError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    let mut written = 0u64;

    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ApiError::from_body_read(AUDIO_ENDPOINT, e)),
        };
        dest.write_all(&buf[..n])?;
        written += n as u64;
    }

    Ok(written)
}

impl TrackSource for ApiClient {
    fn fetch_track(&self, relpath: &str, dest: &mut dyn Write) -> Result<u64, ApiError> {
        ApiClient::fetch_track(self, relpath, dest)
    }
}
