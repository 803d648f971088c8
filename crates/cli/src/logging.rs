//! Tracing subscriber setup
//!
//! - `RUST_LOG`: filter directives (default `mpa=info`)
//! - `MPA_LOG_FORMAT`: `pretty` (default) or `json`
//! - `MPA_LOG_DIR`: when set, also write a daily rolling log file there

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_FILTER: &str = "mpa=info";
const LOG_FILE_PREFIX: &str = "mpa.log";

/// Install the global subscriber
///
/// The returned guard flushes the file writer; keep it alive until exit.
pub fn init_logging() -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let json = std::env::var("MPA_LOG_FORMAT")
        .map(|format| format == "json")
        .unwrap_or(false);

    // Terminal layer goes to stderr so tables on stdout stay clean
    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().pretty().with_writer(std::io::stderr).boxed()
    };

    let (file_layer, guard) = match std::env::var_os("MPA_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}
