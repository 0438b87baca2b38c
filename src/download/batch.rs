//! Drives a list of gallery URLs to archives, one gallery at a time.
//!
//! A failing gallery is recorded and skipped; only set-up problems with the
//! output directory abort the batch.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::archive::{ArchiveError, build_archive};
use super::asset::{AssetDownloader, DownloadOutcome};
use super::error::FetchError;
use super::metadata::MetadataFetcher;
use super::models::{
    AssetDescriptor, BatchReport, FailureCategory, FailureRecord, Gallery, ResolvedAsset,
};
use super::progress::GalleryProgress;
use super::shard;
use crate::base_system::context::{FetchSettings, safe_fs_name};
use crate::base_system::retry::Sleeper;
use crate::network_parser::index_page::IndexResolver;
use crate::network_parser::transport::HttpTransport;

const MAX_TITLE_BYTES: usize = 200;

#[derive(Debug, Error)]
enum GalleryError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("could not create temp dir: {0}")]
    Workspace(io::Error),
}

impl GalleryError {
    fn category(&self) -> FailureCategory {
        match self {
            Self::Fetch(err) => err.category(),
            Self::Archive(_) | Self::Workspace(_) => FailureCategory::OtherFailure,
        }
    }
}

enum GalleryOutcome {
    Archived(PathBuf),
    AlreadyArchived(String),
}

pub struct BatchOrchestrator<'a> {
    index: &'a dyn IndexResolver,
    transport: &'a dyn HttpTransport,
    sleeper: &'a dyn Sleeper,
    settings: &'a FetchSettings,
    show_progress: bool,
    workspace_root: Option<PathBuf>,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        index: &'a dyn IndexResolver,
        transport: &'a dyn HttpTransport,
        sleeper: &'a dyn Sleeper,
        settings: &'a FetchSettings,
    ) -> Self {
        Self {
            index,
            transport,
            sleeper,
            settings,
            show_progress: false,
            workspace_root: None,
        }
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Where per-gallery temp dirs are created; the system temp dir by default.
    pub fn workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = Some(root.into());
        self
    }

    pub fn run(&self, urls: &[String], output_dir: &Path) -> Result<BatchReport> {
        fs::create_dir_all(output_dir)
            .with_context(|| format!("cannot create output directory {}", output_dir.display()))?;
        tempfile::NamedTempFile::new_in(output_dir)
            .with_context(|| format!("output directory {} is not writable", output_dir.display()))?;

        let mut report = BatchReport::default();
        for url in urls {
            info!("Start {}", url);
            match self.process(url, output_dir) {
                Ok(GalleryOutcome::Archived(path)) => {
                    info!("Saved to {}", path.display());
                    report.archived.push(path);
                }
                Ok(GalleryOutcome::AlreadyArchived(title)) => report.skipped.push(title),
                Err(err) => {
                    error!("{} failed: {}", url, err);
                    report.failures.push(FailureRecord {
                        url: url.clone(),
                        category: err.category(),
                    });
                }
            }
        }
        Ok(report)
    }

    fn process(&self, url: &str, output_dir: &Path) -> Result<GalleryOutcome, GalleryError> {
        let entry = self.index.resolve(url)?;
        let gallery = Gallery::from_url(&entry.target_url, &entry.title)?;

        let file_stem = safe_fs_name(gallery.title(), "_", MAX_TITLE_BYTES);
        if file_stem != gallery.title() {
            debug!("title renamed to {}", file_stem);
        }
        info!("Fetching: {}", file_stem);

        let dest = output_dir.join(format!("{file_stem}.zip"));
        if dest.exists() {
            info!("{} already exists. Skipping.", dest.display());
            return Ok(GalleryOutcome::AlreadyArchived(gallery.title().to_string()));
        }

        // Dropping the guard removes the directory and whatever was downloaded,
        // on every path out of this function.
        let workspace = self.make_workspace().map_err(GalleryError::Workspace)?;
        self.download_gallery(&gallery, workspace.path())?;
        build_archive(workspace.path(), &dest)?;

        if let Err(err) = workspace.close() {
            warn!("could not remove temp dir: {}", err);
        }
        Ok(GalleryOutcome::Archived(dest))
    }

    fn make_workspace(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("gallery-");
        match &self.workspace_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    fn download_gallery(&self, gallery: &Gallery, dir: &Path) -> Result<(), FetchError> {
        let descriptors =
            MetadataFetcher::new(self.transport, self.sleeper, self.settings).fetch(gallery.id())?;
        let assets = resolve_assets(&descriptors, &self.settings.cdn_host, dir);
        debug!(
            "{} assets for gallery {} ({})",
            assets.len(),
            gallery.id(),
            gallery.source_url()
        );

        let referer = self.settings.referer_url(gallery.id());
        let downloader = AssetDownloader::new(self.transport, self.sleeper, self.settings);
        let progress = GalleryProgress::new(assets.len(), self.show_progress);

        for asset in &assets {
            let file_name = asset
                .local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            progress.start_asset(&file_name);
            let d = &asset.descriptor;
            debug!(
                "Download url={} To file={} ({}x{}, alt format: {})",
                asset.url,
                asset.local_path.display(),
                d.width,
                d.height,
                d.has_alt_format
            );
            match downloader.fetch(&asset.url, &referer, &asset.local_path) {
                Ok(DownloadOutcome::Downloaded { .. }) | Ok(DownloadOutcome::AlreadyPresent) => {
                    progress.finish_asset();
                }
                Err(err) => {
                    progress.abandon(if err.is_not_found() {
                        "not found"
                    } else {
                        "failed"
                    });
                    return Err(err);
                }
            }
        }
        progress.done();
        Ok(())
    }
}

/// One `ResolvedAsset` per descriptor, same order. Names that collide once
/// flattened get a ` (2)`, ` (3)`, ... suffix before the extension.
pub fn resolve_assets(
    descriptors: &[AssetDescriptor],
    cdn_host: &str,
    dir: &Path,
) -> Vec<ResolvedAsset> {
    let mut taken = HashSet::new();
    descriptors
        .iter()
        .map(|d| {
            let name = unique_local_name(d.local_file_name(), &mut taken);
            if name != d.local_file_name() {
                warn!("{} collides with an earlier file, saving as {}", d.name, name);
            }
            ResolvedAsset {
                url: shard::derive_url(&d.content_hash, &d.name, cdn_host),
                local_path: dir.join(name),
                descriptor: d.clone(),
            }
        })
        .collect()
}

/// Case-insensitive, so the result also holds on case-folding filesystems.
fn unique_local_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_lowercase()) {
        return name.to_string();
    }
    let (stem, ext) = match name.rfind('.') {
        Some(dot) if dot > 0 => name.split_at(dot),
        _ => (name, ""),
    };
    (2..)
        .map(|n| format!("{stem} ({n}){ext}"))
        .find(|candidate| taken.insert(candidate.to_lowercase()))
        .unwrap_or_else(|| name.to_string())
}
