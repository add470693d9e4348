//! Process-wide tracing subscriber.
//!
//! Every crate logs through the `tracing` macros; only the binary installs a
//! subscriber. Output goes to the console and, when configured, to a plain
//! text log file that is truncated at startup.

use std::fs::File;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::container::config::LoggingConfig;

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid log level {:?}", config.level))
}

/// Install the global subscriber. Fails when one is already installed or
/// the log file cannot be created.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_ansi(true);

    let file_layer = if config.file.is_empty() {
        None
    } else {
        let file = File::create(&config.file)
            .with_context(|| format!("failed to create log file {}", config.file))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;

    tracing::info!(
        level = %config.level,
        file = %config.file,
        "logging initialized"
    );
    Ok(())
}
