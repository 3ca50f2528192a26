//! Tracing setup shared by the binaries

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,sqlx=warn";
const DEFAULT_LOG_DIR: &str = "logs";

/// Console logging, plus a daily-rolling file under `CRYPTO_LOG_DIR` when
/// `log_file` is given.
///
/// The returned guard flushes the file writer on drop and must be held until
/// the process exits.
pub fn init_tracing(log_file: Option<&str>) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false);

    let mut guard = None;
    let file_layer = log_file.and_then(|file_name| {
        let log_dir = std::env::var("CRYPTO_LOG_DIR").unwrap_or_else(|_| DEFAULT_LOG_DIR.to_string());

        // rolling::daily panics if the initial file cannot be created
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                log_dir, e
            );
            return None;
        }

        let file_appender = tracing_appender::rolling::daily(&log_dir, file_name);
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true),
        )
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
