//! Logging initialization for the binary.
//!
//! - **RUST_LOG**: filter, e.g. `info` or `tokentrim=debug`. Default: `warn`.
//! - **LOG_FILE**: when set, logs are appended there (plain text, span path on
//!   every line) through a non-blocking writer. Otherwise they go to stderr, so
//!   stdout carries only the compressed text or JSON.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::log_format::SpanPathText;

/// Installs the global subscriber. Keep the returned guard alive until exit or
/// buffered file lines are lost.
pub fn init() -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match std::env::var("LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let file_layer = tracing_subscriber::fmt::layer()
                .event_format(SpanPathText::new())
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter);
            tracing_subscriber::registry().with(file_layer).try_init()?;
            tracing::info!(path = %path, "tokentrim logging to file");
            Ok(Some(guard))
        }
        _ => {
            let stderr_layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter);
            tracing_subscriber::registry().with(stderr_layer).try_init()?;
            Ok(None)
        }
    }
}
