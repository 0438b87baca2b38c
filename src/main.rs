//! Gallery archiver.
//!
//! Resolves gallery pages to their image manifests, downloads every image from
//! the sharded CDN and packs each gallery into `<title>.zip`.
//!
//! Layout:
//! - `base_system`: config, logging, retry policy, id parsing
//! - `network_parser`: HTTP transport and index-page lookup
//! - `download`: manifest, shard resolution, asset download, archive, batch driver
//! - `ui`: end-of-run report

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::{debug, info};

mod base_system;
mod download;
mod network_parser;
mod ui;

use base_system::config::load_or_create;
use base_system::context::Config;
use base_system::gallery_id::parse_url_list;
use base_system::logging::LogSystem;
use base_system::retry::ThreadSleeper;
use download::BatchOrchestrator;
use network_parser::index_page::{IndexMode, WebIndexResolver};
use network_parser::transport::ReqwestTransport;

#[derive(Debug, Parser)]
#[command(name = "gallery-archiver", version)]
#[command(about = "Download image galleries into zip archives")]
struct Cli {
    /// Gallery or index page URLs
    #[arg(value_name = "URLS")]
    urls: Vec<String>,

    /// File with one URL per line
    #[arg(short = 'f', long = "file")]
    file: Option<PathBuf>,

    /// Output directory (overrides save_path from the config)
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Enable debug logging on the console
    #[arg(short = 'v', long, default_value_t = false)]
    verbose: bool,

    /// How to read the given pages
    #[arg(long, value_enum, default_value_t = IndexMode::Auto)]
    index: IndexMode,

    /// Config file path (default: <data-dir>/config.yml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for config.yml and logs
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.as_deref();
    let _log = LogSystem::init(cli.verbose, data_dir).map_err(|e| anyhow!(e))?;

    let config: Config = load_or_create(cli.config.as_deref(), data_dir)
        .map_err(|e| anyhow!(e.to_string()))?;

    let urls = collect_urls(cli.file.as_deref(), &cli.urls)?;
    if urls.is_empty() {
        info!("no URLs given, nothing to do");
        return Ok(());
    }
    // Echo the list so it can be copied back if needed.
    for url in &urls {
        println!("{url}");
    }

    let output_dir = cli.output.unwrap_or_else(|| config.default_save_dir());
    debug!("output directory: {}", output_dir.display());

    let settings = config.fetch_settings();
    let transport = ReqwestTransport::new(&settings).context("failed to build HTTP client")?;
    let sleeper = ThreadSleeper;
    let index = WebIndexResolver::new(&transport, &sleeper, &settings, cli.index);

    let report = BatchOrchestrator::new(&index, &transport, &sleeper, &settings)
        .show_progress(config.show_progress)
        .run(&urls, &output_dir)?;

    ui::report::print_report(&report);
    Ok(())
}

fn collect_urls(file: Option<&Path>, positional: &[String]) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    if let Some(path) = file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("cannot read URL list {}", path.display()))?;
        urls.extend(parse_url_list(&text));
    }
    urls.extend(
        positional
            .iter()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty()),
    );
    Ok(urls)
}
