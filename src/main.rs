//! vSphere exporter - Prometheus exporter for vSphere statistics
//!
//! Serves the metrics route of one resource kind (ESX host, datastore or
//! virtual machine) backed by a vCenter/ESX SOAP endpoint.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use vsphere_exporter::{cli::Cli, config::Config, server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    vsphere_exporter::init_logging(cli.effective_log_level(), cli.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting vsphere-exporter"
    );

    let mut config = Config::load_or_default(&cli.config)?;
    config.apply_cli(&cli);
    config.validate()?;

    if cli.validate {
        print_summary(&config)?;
        return Ok(());
    }

    server::run(config).await?;

    Ok(())
}

fn print_summary(config: &Config) -> Result<()> {
    let kind = config.resource_kind()?;
    let connection = config.connection()?;

    println!("Configuration is valid");
    println!("  endpoint:      {}", connection.endpoint);
    println!("  insecure:      {}", connection.insecure);
    println!("  timeout:       {}ms", config.vsphere.timeout_ms);
    println!("  resource type: {}", kind);
    println!(
        "  listen:        {}:{}",
        config.server.bind_address, config.server.port
    );
    println!("  metrics route: {}", kind.route_display());
    Ok(())
}
