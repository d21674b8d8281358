//! Run-level and per-operation log files.
//!
//! Every run writes a log file of its own, and each fetch or organize step
//! additionally duplicates its events into a dedicated operation log. The
//! duplication goes through [`LogRouter`], a `MakeWriter` whose target file
//! is swapped in and out by [`OperationLog`] guards.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use camino::{Utf8Path, Utf8PathBuf};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::error::HcpError;

#[derive(Debug, Clone, Default)]
pub struct LogRouter {
    slot: Arc<Mutex<Option<File>>>,
}

impl LogRouter {
    fn attach(&self, file: File) {
        if let Ok(mut guard) = self.slot.lock() {
            *guard = Some(file);
        }
    }

    fn detach(&self) {
        if let Ok(mut guard) = self.slot.lock() {
            if let Some(mut file) = guard.take() {
                let _ = file.flush();
            }
        }
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().map(|guard| guard.is_some()).unwrap_or(false)
    }
}

pub struct RoutedWriter {
    slot: Arc<Mutex<Option<File>>>,
}

impl Write for RoutedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| io::Error::other("operation log lock poisoned"))?;
        if let Some(file) = guard.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .slot
            .lock()
            .map_err(|_| io::Error::other("operation log lock poisoned"))?;
        match guard.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for LogRouter {
    type Writer = RoutedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RoutedWriter {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Installs the global subscriber: stderr, the run log file, and the operation router.
///
/// Returns the router to hand to [`OperationLogger`] and the run log path.
pub fn init(log_dir: &Utf8Path, run_name: &str) -> Result<(LogRouter, Utf8PathBuf), HcpError> {
    fs::create_dir_all(log_dir.as_std_path())
        .map_err(|err| HcpError::Filesystem(format!("create {log_dir}: {err}")))?;
    let run_log = log_dir.join(format!("{run_name}_{}.log", timestamp()));
    let run_file = open_log(&run_log)?;
    let router = LogRouter::default();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    layered(filter, run_file, router.clone()).init();

    Ok((router, run_log))
}

/// `RUST_LOG` only narrows stderr; both log files always record INFO and up.
fn layered(
    stderr_filter: EnvFilter,
    run_file: File,
    router: LogRouter,
) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(io::stderr)
                .with_filter(stderr_filter),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(run_file))
                .with_filter(LevelFilter::INFO),
        )
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(router)
                .with_filter(LevelFilter::INFO),
        )
}

/// Opens per-operation log files under a log directory.
#[derive(Debug, Clone, Default)]
pub struct OperationLogger {
    log_dir: Option<Utf8PathBuf>,
    router: LogRouter,
}

impl OperationLogger {
    pub fn new(log_dir: Utf8PathBuf, router: LogRouter) -> Self {
        Self {
            log_dir: Some(log_dir),
            router,
        }
    }

    /// Logger that writes no files; start/completed events still go to the subscriber.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn start(&self, subject: &str, data_type: &str, operation: &str) -> OperationLog<'_> {
        let data_type = data_type.replace('/', "_");
        let path = self.log_dir.as_ref().map(|dir| {
            dir.join(format!(
                "{operation}_{subject}_{data_type}_{}.log",
                timestamp()
            ))
        });

        if let Some(path) = &path {
            match open_log(path) {
                Ok(file) => self.router.attach(file),
                Err(err) => tracing::warn!("Could not open operation log {path}: {err}"),
            }
        }

        tracing::info!("Starting {operation}: Subject {subject}, Data type {data_type}");
        if let Some(path) = &path {
            tracing::info!("Operation log file: {path}");
        }

        OperationLog {
            router: &self.router,
            subject: subject.to_string(),
            data_type,
            operation: operation.to_string(),
            path,
        }
    }
}

/// Active operation; events are duplicated into its file until dropped.
pub struct OperationLog<'a> {
    router: &'a LogRouter,
    subject: String,
    data_type: String,
    operation: String,
    path: Option<Utf8PathBuf>,
}

impl OperationLog<'_> {
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }
}

impl Drop for OperationLog<'_> {
    fn drop(&mut self) {
        tracing::info!(
            "Completed {} for Subject {}, Data type {}",
            self.operation,
            self.subject,
            self.data_type
        );
        self.router.detach();
    }
}

pub fn timestamp() -> String {
    chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn open_log(path: &Utf8Path) -> Result<File, HcpError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .map_err(|err| HcpError::Filesystem(format!("open {path}: {err}")))
}
