//! Gallery manifest retrieval.
//!
//! The endpoint serves a script, not JSON: `var galleryinfo = {...}`. Only the
//! object after the prefix is parsed.

use reqwest::header::HeaderMap;
use serde::Deserialize;
use tracing::{debug, warn};

use super::error::FetchError;
use super::models::AssetDescriptor;
use crate::base_system::context::FetchSettings;
use crate::base_system::retry::{RetryFailure, Sleeper};
use crate::network_parser::transport::HttpTransport;

#[derive(Debug, Deserialize)]
struct Manifest {
    files: Vec<AssetDescriptor>,
}

pub struct MetadataFetcher<'a> {
    transport: &'a dyn HttpTransport,
    sleeper: &'a dyn Sleeper,
    settings: &'a FetchSettings,
}

impl<'a> MetadataFetcher<'a> {
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

    /// Descriptors in manifest order.
    pub fn fetch(&self, gallery_id: &str) -> Result<Vec<AssetDescriptor>, FetchError> {
        let url = self.settings.metadata_url(gallery_id);
        let payload = self
            .settings
            .retry
            .run(self.sleeper, |attempt| {
                debug!("manifest {} (attempt {})", url, attempt);
                let text = self
                    .transport
                    .get(&url, HeaderMap::new())
                    .and_then(|fetched| fetched.read_text(&url));
                if let Err(err) = &text {
                    warn!("manifest attempt {} failed: {}", attempt, err);
                }
                text
            })
            .map_err(|failure| match failure {
                RetryFailure::Fatal(err) => err,
                RetryFailure::Exhausted { attempts, last } => FetchError::Exhausted {
                    url: url.clone(),
                    attempts,
                    last: Box::new(last),
                },
            })?;

        parse_manifest(&url, &payload, &self.settings.metadata_prefix)
    }
}

pub fn parse_manifest(
    url: &str,
    payload: &str,
    prefix: &str,
) -> Result<Vec<AssetDescriptor>, FetchError> {
    let parse_err = |reason: String| FetchError::Parse {
        url: url.to_string(),
        reason,
    };

    let start = payload
        .find(prefix)
        .ok_or_else(|| parse_err(format!("prefix {prefix:?} not found")))?;
    let json = payload[start + prefix.len()..].trim();
    // Tolerate a trailing statement terminator after the object.
    let json = json.strip_suffix(';').unwrap_or(json);

    let manifest: Manifest =
        serde_json::from_str(json).map_err(|e| parse_err(e.to_string()))?;
    Ok(manifest.files)
}
