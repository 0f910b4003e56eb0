//! Tracing setup for the server and CLI.
//!
//! Logs go to stdout (compact) and to a file: `RUSTY_RAG_LOG_FILE` when set, otherwise
//! `logs/rusty-rag.log`. File output goes through a non-blocking writer.
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const LOG_FILE_ENV: &str = "RUSTY_RAG_LOG_FILE";
const LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "rusty-rag.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Configure tracing subscribers for stdout and optional file logging.
///
/// `RUST_LOG` controls filtering (default `info`). The writer guard lives in a static so the
/// file layer keeps flushing for the whole process. A second call only reports that a
/// subscriber is already installed.
///
/// The CLI passes `to_stderr = true` so stdout stays clean for JSON output.
pub fn init_tracing(to_stderr: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = if to_stderr {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .boxed()
    } else {
        fmt::layer().with_target(false).compact().boxed()
    };

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    let result = if let Some(writer) = configure_file_writer() {
        let file_layer = fmt::layer()
            .with_writer(writer)
            .with_target(true)
            .with_ansi(false)
            .compact();

        registry.with(file_layer).try_init()
    } else {
        registry.try_init()
    };
    if let Err(err) = result {
        eprintln!("Tracing already initialised: {err}");
    }
}

/// Build a non‑blocking writer for file logging.
///
/// `None` when the log directory or file cannot be opened.
fn configure_file_writer() -> Option<NonBlocking> {
    if let Ok(path) = std::env::var(LOG_FILE_ENV) {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                let _ = LOG_GUARD.set(guard);
                Some(non_blocking)
            }
            Err(err) => {
                eprintln!("Failed to open log file {path}: {err}");
                None
            }
        }
    } else {
        if let Err(err) = std::fs::create_dir_all(LOG_DIR) {
            eprintln!("Failed to create logs directory: {err}");
            return None;
        }
        let file_appender = tracing_appender::rolling::never(LOG_DIR, DEFAULT_LOG_FILE);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let _ = LOG_GUARD.set(guard);
        Some(non_blocking)
    }
}
