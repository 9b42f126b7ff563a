//! Tracing subscriber setup.

use anyhow::Context;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Installs the global subscriber.
///
/// Output goes to stdout, or is appended to `log_file` without ANSI colours.
pub fn init(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));

    let (stdout_layer, file_layer) = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (Some(fmt::layer().with_target(true)), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    Ok(())
}
