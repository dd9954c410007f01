//! Configuration management for vsphere-exporter
//!
//! Handles loading configuration from YAML files, layering CLI/environment
//! overrides on top, and validating the result into a [`ConnectionConfig`].

use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::cli::Cli;
use crate::resource::ResourceKind;

/// Version reported by `/version` in integer form
pub const VERSION_INT: u32 = 1;

/// Version reported by `/version` in string form
pub const VERSION_STR: &str = env!("CARGO_PKG_VERSION");

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// vSphere endpoint configuration
    #[serde(default)]
    pub vsphere: VsphereConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// vSphere endpoint configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct VsphereConfig {
    /// vCenter Server or ESX hostname
    #[serde(default)]
    pub hostname: String,

    /// vCenter Server port (0 uses the provider default)
    #[serde(default)]
    pub port: u16,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub insecure: bool,

    /// Username for the SOAP login
    #[serde(default)]
    pub username: String,

    /// Password for the SOAP login
    #[serde(default)]
    pub password: String,

    /// Which kind of object this process exports
    #[serde(default, rename = "type")]
    pub resource_kind: Option<ResourceKind>,

    /// Upstream round-trip timeout in milliseconds
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Server bind address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

// Default value functions
fn default_timeout() -> u64 {
    10_000
}

fn default_port() -> u16 {
    9444
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

impl Default for VsphereConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            port: 0,
            insecure: false,
            username: String::new(),
            password: String::new(),
            resource_kind: None,
            timeout_ms: default_timeout(),
        }
    }
}

impl fmt::Debug for VsphereConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VsphereConfig")
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("insecure", &self.insecure)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("resource_kind", &self.resource_kind)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
        }
    }
}

/// Everything needed to open a vSphere session, built once from validated input
#[derive(Clone)]
pub struct ConnectionConfig {
    /// SOAP endpoint, e.g. `https://vcenter.example.com/sdk`
    pub endpoint: Url,
    pub username: String,
    pub password: String,
    /// Skip TLS certificate verification
    pub insecure: bool,
    /// Per round-trip deadline
    pub timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(
        endpoint: Url,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint,
            username: username.into(),
            password: password.into(),
            insecure: false,
            timeout: Duration::from_millis(default_timeout()),
        }
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("insecure", &self.insecure)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to defaults if not found
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Layer CLI arguments (which already carry environment fallbacks) over the file
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(ref bind_address) = cli.bind_address {
            self.server.bind_address = bind_address.clone();
        }
        if let Some(ref hostname) = cli.vsphere_hostname {
            self.vsphere.hostname = hostname.clone();
        }
        if let Some(port) = cli.vsphere_port {
            self.vsphere.port = port;
        }
        if let Some(insecure) = cli.vsphere_insecure {
            self.vsphere.insecure = insecure;
        }
        if let Some(ref username) = cli.vsphere_username {
            self.vsphere.username = username.clone();
        }
        if let Some(ref password) = cli.vsphere_password {
            self.vsphere.password = password.clone();
        }
        if let Some(kind) = cli.vsphere_type {
            self.vsphere.resource_kind = Some(kind);
        }
        if let Some(timeout_ms) = cli.vsphere_timeout {
            self.vsphere.timeout_ms = timeout_ms;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        self.bind_ip()?;
        self.resource_kind()?;

        if self.vsphere.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "vSphere timeout must be greater than 0".to_string(),
            ));
        }

        self.connection()?;
        Ok(())
    }

    /// The active resource kind
    pub fn resource_kind(&self) -> Result<ResourceKind, ConfigError> {
        self.vsphere.resource_kind.ok_or_else(|| {
            ConfigError::ValidationError(
                "vSphere resource type is required (esx, datastore or virtualmachine)".to_string(),
            )
        })
    }

    /// Parsed bind address; "localhost" maps to the IPv4 loopback
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        let bind_address = self.server.bind_address.as_str();
        if bind_address == "localhost" {
            return Ok(IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
        }
        bind_address.parse().map_err(|e| {
            ConfigError::ValidationError(format!(
                "Invalid bind_address '{}': {}. Use an IP address (e.g., '0.0.0.0', '127.0.0.1') or 'localhost'.",
                bind_address, e
            ))
        })
    }

    /// Build the structured connection value used by the session manager
    pub fn connection(&self) -> Result<ConnectionConfig, ConfigError> {
        let hostname = self.vsphere.hostname.trim();
        if hostname.is_empty() {
            return Err(ConfigError::ValidationError(
                "vSphere hostname is required".to_string(),
            ));
        }

        // Bare IPv6 literals need brackets inside a URL authority.
        let host = if hostname.contains(':') && !hostname.starts_with('[') {
            format!("[{}]", hostname)
        } else {
            hostname.to_string()
        };
        let authority = if self.vsphere.port > 0 {
            format!("{}:{}", host, self.vsphere.port)
        } else {
            host
        };

        let endpoint = Url::parse(&format!("https://{}/sdk", authority)).map_err(|e| {
            ConfigError::ValidationError(format!("Invalid vSphere hostname '{}': {}", hostname, e))
        })?;
        if endpoint.path() != "/sdk" || endpoint.query().is_some() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid vSphere hostname '{}'",
                hostname
            )));
        }

        Ok(ConnectionConfig::new(
            endpoint,
            self.vsphere.username.clone(),
            self.vsphere.password.clone(),
        )
        .with_insecure(self.vsphere.insecure)
        .with_timeout(Duration::from_millis(self.vsphere.timeout_ms)))
    }
}
