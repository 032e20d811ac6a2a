//! Log setup: stderr plus an optional file, filtered by the configured level.

use crate::error::{Error, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Map a configured level name to a tracing filter directive
///
/// Accepts tracing names and the loguru-style names older configs use
/// (`WARNING`, `CRITICAL`, `SUCCESS`).
pub fn level_directive(level: &str) -> Result<&'static str> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" | "success" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" | "critical" => Ok("error"),
        "off" => Ok("off"),
        other => Err(Error::Config(format!("unknown log_level `{other}`"))),
    }
}

/// Install the global subscriber
///
/// `verbosity` (from `-v` flags) raises the level above the configured one.
/// `RUST_LOG` overrides both.
pub fn init_logging(level: &str, verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let directive = match verbosity {
        0 => level_directive(level)?,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ghchain={directive}")));

    let file_layer = log_file
        .map(|path| {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    Error::Config(format!("cannot open log_file {}: {e}", path.display()))
                })?;
            Ok::<_, Error>(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        })
        .transpose()?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("failed to install logger: {e}")))
}
