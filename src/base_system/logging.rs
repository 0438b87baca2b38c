//! Console plus file logging for one run.
//!
//! The console layer writes to stderr so the progress bar and the failure
//! table keep stdout. `logs/latest.log` always records DEBUG and is packed
//! into `logs/log_<timestamp>.zip` when the run ends.

use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::{panic, thread, time::Duration};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, info};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zip::CompressionMethod;
use zip::write::FileOptions;

const LATEST_LOG: &str = "latest.log";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
/// Time given to the appender thread to flush before the log is packed.
const FLUSH_GRACE: Duration = Duration::from_millis(300);

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("subscriber init failed: {0}")]
    SubscriberInit(#[from] tracing_subscriber::util::TryInitError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("time formatting failed: {0}")]
    Time(#[from] time::error::Format),
}

/// Keeps the file writer alive; dropping it flushes and archives the log.
pub struct LogSystem {
    session: Arc<LogSession>,
}

impl LogSystem {
    /// `verbose` lowers the console level to DEBUG. Logs go under
    /// `<base_dir>/logs`, or `./logs` without a base dir.
    pub fn init(verbose: bool, base_dir: Option<&Path>) -> Result<Self, LogError> {
        let dir = base_dir.map_or_else(|| PathBuf::from("logs"), |d| d.join("logs"));
        fs::create_dir_all(&dir)?;
        let latest = dir.join(LATEST_LOG);
        rotate_oversized(&latest, &dir)?;

        let (file_writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .finish(rolling::never(&dir, LATEST_LOG));

        let console = fmt::layer()
            .with_target(false)
            .with_ansi(io::stderr().is_terminal())
            .with_writer(io::stderr)
            .with_filter(if verbose {
                LevelFilter::DEBUG
            } else {
                LevelFilter::INFO
            });
        let file = fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(false)
            .with_writer(file_writer)
            .with_filter(LevelFilter::DEBUG);

        tracing_subscriber::registry()
            .with(console)
            .with(file)
            .try_init()
            .map_err(|e| {
                if e.to_string().contains("already") {
                    LogError::AlreadyInitialized
                } else {
                    LogError::SubscriberInit(e)
                }
            })?;

        let session = Arc::new(LogSession {
            dir,
            latest,
            guard: Mutex::new(Some(guard)),
            closed: AtomicBool::new(false),
        });
        session.exit_on_interrupt();
        session.close_on_panic();
        Ok(Self { session })
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.session.close();
    }
}

struct LogSession {
    dir: PathBuf,
    latest: PathBuf,
    guard: Mutex<Option<WorkerGuard>>,
    closed: AtomicBool,
}

impl LogSession {
    fn exit_on_interrupt(self: &Arc<Self>) {
        let session = Arc::clone(self);
        let _ = ctrlc::set_handler(move || {
            // process::exit skips destructors: the scratch dir of the gallery in
            // flight stays in the system temp dir and its zip is never written.
            eprintln!("interrupted");
            session.close();
            std::process::exit(130);
        });
    }

    fn close_on_panic(self: &Arc<Self>) {
        let session = Arc::clone(self);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            error!("panic: {info}");
            session.close();
            previous(info);
        }));
    }

    /// Flushes the writer and packs the log. Only the first call does anything.
    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
        thread::sleep(FLUSH_GRACE);
        if let Err(err) = pack_log(&self.latest, &self.dir) {
            eprintln!("failed to archive log: {err}");
        }
    }
}

/// A log left over from an earlier run is packed away before it grows further.
fn rotate_oversized(latest: &Path, dir: &Path) -> Result<(), LogError> {
    match fs::metadata(latest) {
        Ok(meta) if meta.len() >= ROTATE_AT_BYTES => pack_log(latest, dir).map(drop),
        _ => Ok(()),
    }
}

/// Moves `latest` into `dir/log_<timestamp>.zip`. Empty logs are just removed.
fn pack_log(latest: &Path, dir: &Path) -> Result<Option<PathBuf>, LogError> {
    let size = match fs::metadata(latest) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if size == 0 {
        fs::remove_file(latest)?;
        return Ok(None);
    }

    let stamp = OffsetDateTime::now_utc().format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    let target = dir.join(format!("log_{stamp}.zip"));

    let mut zip = zip::ZipWriter::new(File::create(&target)?);
    zip.start_file(
        format!("{stamp}.log"),
        FileOptions::default().compression_method(CompressionMethod::Deflated),
    )?;
    io::copy(&mut File::open(latest)?, &mut zip)?;
    zip.finish()?;
    fs::remove_file(latest)?;

    info!("log archived to {}", target.display());
    Ok(Some(target))
}
