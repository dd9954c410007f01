//! Metric registry and text exposition
//!
//! # Metrics
//!
//! Every counter of the active [`Catalog`](crate::catalog::Catalog) is exported
//! as a gauge named `vsphere_<subsystem>_<id>_<key>` with the labels
//! `datacenter` and `host` / `datastore` / `vm`.
//!
//! The scrape handler appends exporter self-metrics:
//! - `vsphere_exporter_info{version="..."}` - Always 1
//! - `vsphere_exporter_scrape_duration_seconds` - Time spent on the scrape
//! - `vsphere_exporter_metrics_observed` - Gauges written by the scrape
//! - `vsphere_exporter_metrics_skipped` - Counters without a value in the scrape

mod formatter;
mod registry;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

pub use formatter::PrometheusFormatter;
pub use registry::{MetricHandle, MetricRegistry};

/// Content type of the text exposition format
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Prometheus metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetricType {
    /// A value that can go up and down
    Gauge,
    /// Type not specified
    #[default]
    Untyped,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Untyped => "untyped",
        }
    }
}

/// A single sample ready for exposition
#[derive(Debug, Clone, PartialEq)]
pub struct PrometheusMetric {
    pub name: String,
    pub metric_type: MetricType,
    pub help: Option<String>,
    pub labels: HashMap<String, String>,
    pub value: f64,
}

impl PrometheusMetric {
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            metric_type: MetricType::Untyped,
            help: None,
            labels: HashMap::new(),
            value,
        }
    }

    pub fn with_type(mut self, metric_type: MetricType) -> Self {
        self.metric_type = metric_type;
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Thread-safe gauge using atomic operations
#[derive(Debug)]
pub struct Gauge {
    /// Stored as bits of f64
    value: AtomicU64,
}

impl Gauge {
    pub fn new(v: f64) -> Self {
        Self {
            value: AtomicU64::new(v.to_bits()),
        }
    }

    /// Overwrite the current value
    pub fn set(&self, v: f64) {
        self.value.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.value.load(Ordering::Relaxed))
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new(0.0)
    }
}
