//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! Two modes:
//! - **Session** ([`init_session`]): one JSON log per command (`test.2026-01-31.log`,
//!   `build.2026-01-31.log`), rotated daily with bounded retention, plus a
//!   console layer that stays at `warn` so progress output is not interleaved
//!   with info lines
//! - **CLI** ([`init_cli`]): console-only for quick store commands
//!
//! `RUST_LOG`, when set, overrides both layers.

use std::path::Path;

use anyhow::Context;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use uuid::Uuid;

/// File layer default: our events at `info`, chatty dependencies at `warn`.
const FILE_FILTER: &str = "info,sqlx=warn,hyper=warn,hyper_util=warn,reqwest=warn";

/// Console default during a session.
const CONSOLE_FILTER: &str = "warn";

/// Console default for store-only commands.
const CLI_FILTER: &str = "info";

/// Daily files kept per command.
const MAX_LOG_FILES: usize = 14;

/// Holds the non-blocking writer guard for file logging.
///
/// Dropping it flushes pending log entries and closes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
    session_id: String,
}

impl LoggingGuard {
    /// Id stamped on the session's first log line; correlates a console
    /// error with its log file entries.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// File name prefix for a command's log: lower-case ASCII alphanumerics and
/// dashes, `session` when nothing usable is left.
pub fn log_file_prefix(command: &str) -> String {
    let cleaned: String = command
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches('-');
    if cleaned.is_empty() {
        "session".to_owned()
    } else {
        cleaned.to_owned()
    }
}

/// Initialise session logging for `command`.
///
/// Writes JSON logs to `{logs_dir}/{command}.YYYY-MM-DD.log`, keeping the
/// last fourteen days per command.
///
/// # Errors
///
/// Returns an error if the logs directory or the log file cannot be created.
pub fn init_session(logs_dir: &Path, command: &str) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let prefix = log_file_prefix(command);
    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(prefix.as_str())
        .filename_suffix("log")
        .max_log_files(MAX_LOG_FILES)
        .build(logs_dir)
        .with_context(|| format!("failed to open {prefix} log in {}", logs_dir.display()))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(env_filter(FILE_FILTER));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(env_filter(CONSOLE_FILTER));

    tracing_subscriber::registry()
        .with(json_layer)
        .with(console_layer)
        .init();

    let session_id = Uuid::new_v4().simple().to_string();
    info!(session_id = %session_id, command = %prefix, "session logging started");

    Ok(LoggingGuard {
        _guard: guard,
        session_id,
    })
}

/// Initialise console-only logging on stderr, controlled by `RUST_LOG`.
pub fn init_cli() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(CLI_FILTER))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
