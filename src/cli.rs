//! CLI argument parsing for vsphere-exporter
//!
//! This module provides the command-line interface using clap derive macros.
//!
//! # Options
//!
//! - `--config` / `-c`: Configuration file path (default: config.yaml, env: VSPHERE_EXPORTER_CONFIG)
//! - `--log-level` / `-l`: Log level (trace/debug/info/warn/error, env: LOG_LEVEL)
//! - `--log-format`: Log output format (text/json, env: LOG_FORMAT)
//! - `--debug`: Force debug logging (env: DEBUG)
//! - `--rest-port` / `-p`: Server port (env: REST_PORT)
//! - `--bind-address`: Server bind address (env: BIND_ADDRESS)
//! - `--vsphere-hostname`: vCenter Server hostname (env: VSPHERE_HOSTNAME)
//! - `--vsphere-port`: vCenter Server port (env: VSPHERE_PORT)
//! - `--vsphere-insecure`: Skip TLS verification (env: VSPHERE_INSECURE)
//! - `--vsphere-username`: vCenter Server username (env: VSPHERE_USERNAME)
//! - `--vsphere-password`: vCenter Server password (env: VSPHERE_PASSWORD)
//! - `--vsphere-type`: Kind of object to export (esx/datastore/virtualmachine, env: VSPHERE_TYPE)
//! - `--vsphere-timeout`: Upstream round-trip timeout in milliseconds (env: VSPHERE_TIMEOUT_MS)
//! - `--validate`: Validate configuration without starting server
//!
//! The dotted spellings of the legacy flags (`--rest.port`, `--vsphere.hostname`, ...)
//! are accepted as aliases.
//!
//! # Precedence
//!
//! Configuration values are resolved in the following order (highest to lowest priority):
//! 1. CLI arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::resource::ResourceKind;

/// vsphere-exporter - Prometheus exporter for VMware vSphere
///
/// Polls a vCenter Server (or ESX host) on every scrape and exposes host,
/// datastore or virtual machine statistics in Prometheus format.
///
/// Environment variables can be used for all configuration options.
/// CLI arguments take precedence over environment variables,
/// which take precedence over config file values.
#[derive(Parser, Debug)]
#[command(name = "vsphere-exporter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config.yaml",
        env = "VSPHERE_EXPORTER_CONFIG"
    )]
    pub config: PathBuf,

    /// Log level
    #[arg(
        short,
        long,
        value_enum,
        default_value = "info",
        ignore_case = true,
        alias = "loglevel",
        env = "LOG_LEVEL"
    )]
    pub log_level: LogLevel,

    /// Log output format
    #[arg(long, value_enum, default_value = "text", env = "LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Debug mode (forces the debug log level)
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Port to serve the REST endpoint on (overrides config file)
    #[arg(
        short,
        long = "rest-port",
        value_name = "PORT",
        alias = "rest.port",
        env = "REST_PORT"
    )]
    pub port: Option<u16>,

    /// Server bind address (overrides config file)
    #[arg(long, value_name = "ADDRESS", env = "BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// vCenter Server hostname
    #[arg(
        long,
        value_name = "HOST",
        alias = "vsphere.hostname",
        env = "VSPHERE_HOSTNAME"
    )]
    pub vsphere_hostname: Option<String>,

    /// vCenter Server port (0 uses the default HTTPS port)
    #[arg(
        long,
        value_name = "PORT",
        alias = "vsphere.port",
        env = "VSPHERE_PORT"
    )]
    pub vsphere_port: Option<u16>,

    /// Skip vCenter Server TLS certificate verification
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        alias = "vsphere.insecure",
        env = "VSPHERE_INSECURE"
    )]
    pub vsphere_insecure: Option<bool>,

    /// vCenter Server username
    #[arg(
        long,
        value_name = "USERNAME",
        alias = "vsphere.username",
        env = "VSPHERE_USERNAME"
    )]
    pub vsphere_username: Option<String>,

    /// vCenter Server password
    #[arg(
        long,
        value_name = "PASSWORD",
        alias = "vsphere.password",
        env = "VSPHERE_PASSWORD",
        hide_env_values = true
    )]
    pub vsphere_password: Option<String>,

    /// What kind of objects to export
    #[arg(
        long,
        value_enum,
        ignore_case = true,
        alias = "vsphere.type",
        env = "VSPHERE_TYPE"
    )]
    pub vsphere_type: Option<ResourceKind>,

    /// Upstream round-trip timeout in milliseconds
    #[arg(long, value_name = "MS", env = "VSPHERE_TIMEOUT_MS")]
    pub vsphere_timeout: Option<u64>,

    /// Validate configuration without starting server
    #[arg(long)]
    pub validate: bool,
}

impl Cli {
    /// Log level after applying `--debug`
    pub fn effective_log_level(&self) -> LogLevel {
        if self.debug && self.log_level != LogLevel::Trace {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }
}

/// Log level options
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level - default
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log output format
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text output
    Text,
    /// One JSON object per line
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}
