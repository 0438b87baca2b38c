//! Failure taxonomy shared by the fetch components.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use super::models::FailureCategory;
use crate::base_system::retry::Retryable;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Remote resource is absent. Never retried.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Connection trouble, a non-404 HTTP status or a body cut short.
    #[error("transient failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    #[error("size mismatch for {}: wrote {actual} bytes, expected {expected}", path.display())]
    SizeMismatch {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("io error at {}: {source}", path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("unparseable manifest from {url}: {reason}")]
    Parse { url: String, reason: String },

    #[error("could not resolve gallery from {url}: {reason}")]
    Resolution { url: String, reason: String },

    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    pub fn transient(url: &str, reason: impl ToString) -> Self {
        Self::Transient {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Exhausted { last, .. } => last.is_not_found(),
            _ => false,
        }
    }

    pub fn category(&self) -> FailureCategory {
        if self.is_not_found() {
            FailureCategory::NotFound
        } else {
            FailureCategory::OtherFailure
        }
    }
}

impl Retryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Transient { .. } | Self::SizeMismatch { .. } => true,
            Self::Io { source, .. } => is_transient_io(source),
            Self::NotFound { .. }
            | Self::Parse { .. }
            | Self::Resolution { .. }
            | Self::Exhausted { .. } => false,
        }
    }
}

/// Local I/O problems that another attempt will not fix: bad paths and permissions.
fn is_transient_io(err: &io::Error) -> bool {
    !matches!(
        err.kind(),
        io::ErrorKind::PermissionDenied
            | io::ErrorKind::NotFound
            | io::ErrorKind::InvalidInput
            | io::ErrorKind::AlreadyExists
            | io::ErrorKind::Unsupported
            | io::ErrorKind::IsADirectory
            | io::ErrorKind::NotADirectory
            | io::ErrorKind::ReadOnlyFilesystem
    )
}
