//! Gallery download pipeline: manifest -> shard URLs -> assets -> archive.
//!
//! Everything here is sequential and blocking; one gallery, one asset at a time.

pub mod archive;
pub mod asset;
pub mod batch;
pub mod error;
pub mod metadata;
pub mod models;
mod progress;
pub mod shard;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use batch::BatchOrchestrator;
pub use error::FetchError;
