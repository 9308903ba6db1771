//! Log output wiring.
//!
//! Every stage of the pipeline emits structured `tracing` events (`stage`,
//! `attempt`, `outcome` fields); this module decides where they land. Events
//! always go to stdout through a compact formatter. They are additionally
//! appended to a log file whose path comes from the configuration, through a
//! non-blocking writer so ingestion hot paths never wait on disk.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Keeps the non-blocking writer's worker alive for the process lifetime.
static WRITER_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Install the global subscriber.
///
/// Filtering follows `RUST_LOG` (default `info`). `log_file` is the
/// configured log path; when unset, logs land in `logs/notewave.log`. If the
/// file cannot be opened the server still runs with stdout logging only.
pub fn init_tracing(log_file: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry().with(filter).with(stdout);

    match open_file_writer(&resolve_log_path(log_file)) {
        Some(writer) => {
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        None => registry.init(),
    }
}

/// The configured log file, or `logs/notewave.log` relative to the working
/// directory.
fn resolve_log_path(configured: Option<&str>) -> PathBuf {
    configured
        .map(PathBuf::from)
        .unwrap_or_else(|| Path::new("logs").join("notewave.log"))
}

fn open_file_writer(path: &Path) -> Option<NonBlocking> {
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if let Err(err) = std::fs::create_dir_all(dir) {
            eprintln!("Failed to create log directory {}: {err}", dir.display());
            return None;
        }
    }

    match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
    {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let _ = WRITER_GUARD.set(guard);
            Some(writer)
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", path.display());
            None
        }
    }
}
