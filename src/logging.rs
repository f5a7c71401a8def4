//! Logging setup: `tracing` events formatted to stderr, printed around any active progress
//! bar so bars are not torn by log lines.

use crate::runner::bars;
use anyhow::{Context, Result};
use std::io::{self, Write};
use std::sync::OnceLock;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// stderr writer that hides progress bars while a line is written.
struct BarAwareWriter;

impl Write for BarAwareWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        bars().suspend(|| io::stderr().write_all(buf))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

/// `-q` wins over `-v`.
pub fn level_for(quiet: bool, verbose: bool) -> Level {
    if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Directives used when RUST_LOG is not set.
pub fn default_directives(level: Level) -> String {
    format!("bmmc={},reqwest=warn,hyper=warn", level)
}

/// Install the global subscriber. RUST_LOG overrides `level`. Later calls are no-ops.
pub fn init(level: Level) -> Result<()> {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    if INSTALLED.get().is_some() {
        return Ok(());
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_thread_names(false)
        .with_writer(|| BarAwareWriter);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;
    let _ = INSTALLED.set(());

    tracing::debug!(%level, "logging initialized");
    Ok(())
}
