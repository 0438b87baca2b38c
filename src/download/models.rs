//! Data carried through one gallery's processing.

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use super::error::FetchError;
use crate::base_system::gallery_id::parse_gallery_id;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Gallery {
    id: String,
    source_url: String,
    title: String,
}

impl Gallery {
    /// `source_url` must carry the numeric id right before `.html`.
    pub fn from_url(source_url: &str, title: &str) -> Result<Self, FetchError> {
        let id = parse_gallery_id(source_url).ok_or_else(|| FetchError::Resolution {
            url: source_url.to_string(),
            reason: "no gallery id in url".to_string(),
        })?;
        Ok(Self {
            id,
            source_url: source_url.trim().to_string(),
            title: title.trim().to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

/// One `files[]` entry of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AssetDescriptor {
    pub name: String,
    #[serde(rename = "hash")]
    pub content_hash: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(rename = "haswebp", default, deserialize_with = "flag_from_int_or_bool")]
    pub has_alt_format: bool,
}

impl AssetDescriptor {
    /// File name used inside the temp dir and the archive: the last `/` segment.
    pub fn local_file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub descriptor: AssetDescriptor,
    pub url: String,
    pub local_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCategory {
    NotFound,
    OtherFailure,
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("Not Found"),
            Self::OtherFailure => f.write_str("Failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    pub category: FailureCategory,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub failures: Vec<FailureRecord>,
    pub archived: Vec<PathBuf>,
    pub skipped: Vec<String>,
}

impl BatchReport {
    pub fn not_found(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failures
            .iter()
            .filter(|f| f.category == FailureCategory::NotFound)
    }

    pub fn other_failures(&self) -> impl Iterator<Item = &FailureRecord> {
        self.failures
            .iter()
            .filter(|f| f.category == FailureCategory::OtherFailure)
    }
}

fn flag_from_int_or_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(i64),
        Null(()),
    }

    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(b) => b,
        Flag::Int(n) => n != 0,
        Flag::Null(()) => false,
    })
}
