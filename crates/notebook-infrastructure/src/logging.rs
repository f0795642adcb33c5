//! Tracing subscriber setup for hosts embedding the notebook.

use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_DIRECTIVE: &str = "info";
const LOG_FILE_PREFIX: &str = "notebook.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Logs to stderr, honouring `RUST_LOG`.
///
/// Calling this when a global subscriber is already set is a no-op.
pub fn init_tracing() {
    let _ = fmt().with_env_filter(env_filter()).with_target(false).try_init();
}

/// Logs to stderr and to a daily rolling file in `log_dir`.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init_file_tracing(log_dir: &Path) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let result = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .try_init();
    if result.is_ok() {
        tracing::info!("[Logging] Writing logs to {}", log_dir.display());
    }
    guard
}
