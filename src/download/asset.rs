//! Single-asset download with retry, size verification and resume-skip.

use std::fs;
use std::io::Read;
use std::path::Path;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER, USER_AGENT};
use tracing::{debug, info, warn};

use super::error::FetchError;
use crate::base_system::context::FetchSettings;
use crate::base_system::retry::{RetryFailure, Sleeper};
use crate::network_parser::transport::HttpTransport;

/// Upper bound for the up-front buffer reservation.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded { bytes: u64 },
    /// A file of the declared size was already at the destination.
    AlreadyPresent,
}

pub struct AssetDownloader<'a> {
    transport: &'a dyn HttpTransport,
    sleeper: &'a dyn Sleeper,
    settings: &'a FetchSettings,
}

impl<'a> AssetDownloader<'a> {
    pub fn new(
        transport: &'a dyn HttpTransport,
        sleeper: &'a dyn Sleeper,
        settings: &'a FetchSettings,
    ) -> Self {
        Self {
            transport,
            sleeper,
            settings,
        }
    }

    /// Writes `url` to `dest`. On failure the error of the last attempt is returned;
    /// `NotFound` and non-transient local I/O errors end the loop at once.
    pub fn fetch(&self, url: &str, referer: &str, dest: &Path) -> Result<DownloadOutcome, FetchError> {
        let headers = self.request_headers(referer)?;
        self.settings
            .retry
            .run(self.sleeper, |attempt| {
                let result = self.attempt(url, headers.clone(), dest);
                match &result {
                    Err(FetchError::NotFound { .. }) => warn!("{} not found", url),
                    Err(err) => warn!("attempt {} for {} failed: {}", attempt, url, err),
                    Ok(_) => {}
                }
                result
            })
            .map_err(RetryFailure::into_last)
    }

    fn attempt(
        &self,
        url: &str,
        headers: HeaderMap,
        dest: &Path,
    ) -> Result<DownloadOutcome, FetchError> {
        let mut fetched = self.transport.get(url, headers)?;
        let declared = fetched.content_length;

        if let Some(expected) = declared
            && existing_len(dest) == Some(expected)
        {
            info!("{} already exists, skipping", dest.display());
            return Ok(DownloadOutcome::AlreadyPresent);
        }

        let mut body = Vec::with_capacity(declared.unwrap_or(0).min(MAX_PREALLOC) as usize);
        fetched
            .body
            .read_to_end(&mut body)
            .map_err(|e| FetchError::transient(url, format!("incomplete read: {e}")))?;

        fs::write(dest, &body).map_err(|e| FetchError::io(dest, e))?;
        let written = fs::metadata(dest)
            .map_err(|e| FetchError::io(dest, e))?
            .len();

        match declared {
            Some(expected) if expected != written => Err(FetchError::SizeMismatch {
                path: dest.to_path_buf(),
                expected,
                actual: written,
            }),
            _ => {
                debug!("wrote {} bytes to {}", written, dest.display());
                Ok(DownloadOutcome::Downloaded { bytes: written })
            }
        }
    }

    fn request_headers(&self, referer: &str) -> Result<HeaderMap, FetchError> {
        let invalid = |what: &str| FetchError::Resolution {
            url: referer.to_string(),
            reason: format!("{what} is not a valid header value"),
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&self.settings.user_agent).map_err(|_| invalid("user agent"))?,
        );
        headers.insert(
            REFERER,
            HeaderValue::from_str(referer).map_err(|_| invalid("referer"))?,
        );
        headers.insert(
            HeaderName::from_static("sec-fetch-mode"),
            HeaderValue::from_static("no-cors"),
        );
        Ok(headers)
    }
}

fn existing_len(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|m| m.is_file())
        .map(|m| m.len())
}
