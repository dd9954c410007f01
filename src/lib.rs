//! vSphere exporter library
//!
//! This crate exposes vSphere host, datastore and virtual machine statistics
//! in Prometheus text format. One resource kind is served per process; each
//! scrape targets a single resource addressed by datacenter and name.

pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod resource;
pub mod server;
pub mod session;
pub mod stats;
pub mod vsphere;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{LogFormat, LogLevel};

/// Initialize the logging subsystem
///
/// `RUST_LOG` takes precedence over `level` when set.
///
/// # Errors
/// Returns an error if the logging system fails to initialize
pub fn init_logging(level: LogLevel, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let registry = tracing_subscriber::registry().with(filter);
    let initialized = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };

    initialized.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
