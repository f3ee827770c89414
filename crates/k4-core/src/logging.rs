//! Logging initialization using the `tracing` ecosystem.
//!
//! Provides:
//! - Console output (colored, human-readable)
//! - File output (daily rotation via `tracing-appender`), plain or JSON lines
//! - Configurable log level via env var `RUST_LOG` or explicit parameter

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Where and how to write the log file.
#[derive(Debug, Clone, Copy)]
pub struct FileLog<'a> {
    pub dir: &'a str,
    /// File name prefix (e.g. `"mongo_sink"`).
    pub prefix: &'a str,
    pub json: bool,
}

/// Initialize the global tracing subscriber.
///
/// Should be called once at program start. `log_level` is the default filter
/// used when `RUST_LOG` is not set (e.g. `"info"`, `"k4_mongo=debug"`).
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(log_level: &str, file: Option<FileLog<'_>>) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let console_layer = fmt::layer().with_target(true).with_ansi(true);

    let registry = tracing_subscriber::registry().with(env_filter).with(console_layer);

    match file {
        Some(FileLog { dir, prefix, json: true }) => {
            let file_layer = fmt::layer()
                .json()
                .with_writer(tracing_appender::rolling::daily(dir, prefix))
                .with_target(true)
                .with_thread_ids(true);
            registry.with(file_layer).try_init().is_ok()
        }
        Some(FileLog { dir, prefix, json: false }) => {
            let file_layer = fmt::layer()
                .with_writer(tracing_appender::rolling::daily(dir, prefix))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true);
            registry.with(file_layer).try_init().is_ok()
        }
        None => registry.try_init().is_ok(),
    }
}
