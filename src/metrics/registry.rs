//! Metric registry
//!
//! One [`MetricHandle`] per (resource kind, counter id), created at startup
//! from the active catalog and never recreated. The registry is built with
//! `&mut` access, then shared read-only; per-label series storage inside each
//! handle is synchronized so concurrent scrapes can write safely.

use std::collections::{BTreeMap, HashMap};
use std::sync::{OnceLock, RwLock};

use regex::Regex;

use super::{Gauge, MetricType, PrometheusFormatter, PrometheusMetric};
use crate::catalog::{Catalog, CounterDescriptor};
use crate::resource::ResourceKind;

fn metric_name_re() -> &'static Regex {
    static METRIC_NAME_RE: OnceLock<Regex> = OnceLock::new();
    METRIC_NAME_RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z_:][a-zA-Z0-9_:]*$").expect("invalid metric name regex")
    })
}

/// Exported gauge family of one counter
#[derive(Debug)]
pub struct MetricHandle {
    name: String,
    help: String,
    label_names: Vec<&'static str>,
    /// Label values (in `label_names` order) -> gauge
    series: RwLock<HashMap<Vec<String>, Gauge>>,
}

impl MetricHandle {
    fn new(name: String, help: String, label_names: Vec<&'static str>) -> Self {
        Self {
            name,
            help,
            label_names,
            series: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn help(&self) -> &str {
        &self.help
    }

    pub fn label_names(&self) -> &[&'static str] {
        &self.label_names
    }

    /// Set the gauge for exactly this label combination, replacing any prior value
    ///
    /// # Panics
    /// If the number of label values does not match the label names.
    pub fn observe(&self, label_values: &[&str], value: f64) {
        assert_eq!(
            label_values.len(),
            self.label_names.len(),
            "label cardinality mismatch for {}",
            self.name
        );

        {
            let series = self.series.read().expect("RwLock poisoned");
            if let Some(gauge) = series.get(&to_key(label_values)) {
                gauge.set(value);
                return;
            }
        }

        let mut series = self.series.write().expect("RwLock poisoned");
        series
            .entry(to_key(label_values))
            .and_modify(|gauge| gauge.set(value))
            .or_insert_with(|| Gauge::new(value));
    }

    /// Current value for a label combination, if it was ever observed
    pub fn value(&self, label_values: &[&str]) -> Option<f64> {
        let series = self.series.read().expect("RwLock poisoned");
        series.get(&to_key(label_values)).map(Gauge::get)
    }

    /// Number of label combinations observed so far
    pub fn series_count(&self) -> usize {
        self.series.read().expect("RwLock poisoned").len()
    }

    fn collect_into(&self, out: &mut Vec<PrometheusMetric>) {
        let series = self.series.read().expect("RwLock poisoned");

        let mut entries: Vec<_> = series.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

        for (values, gauge) in entries {
            let mut metric = PrometheusMetric::new(self.name.as_str(), gauge.get())
                .with_type(MetricType::Gauge)
                .with_help(self.help.as_str());
            for (name, value) in self.label_names.iter().zip(values) {
                metric = metric.with_label(*name, value.as_str());
            }
            out.push(metric);
        }
    }
}

fn to_key(label_values: &[&str]) -> Vec<String> {
    label_values.iter().map(|v| v.to_string()).collect()
}

/// Process-wide registry of exported gauges
#[derive(Debug, Default)]
pub struct MetricRegistry {
    handles: BTreeMap<(ResourceKind, u32), MetricHandle>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the handle for a counter
    ///
    /// # Panics
    /// If `(kind, id)` is already registered or the metric name is invalid.
    /// Both can only come from a catalog bug.
    pub fn register(&mut self, descriptor: &CounterDescriptor) -> &MetricHandle {
        let key = (descriptor.kind, descriptor.id);
        if self.handles.contains_key(&key) {
            panic!(
                "counter {} of kind {} registered twice",
                descriptor.id, descriptor.kind
            );
        }

        let name = descriptor.metric_name();
        assert!(
            metric_name_re().is_match(&name),
            "invalid metric name '{}'",
            name
        );

        let handle = MetricHandle::new(
            name,
            descriptor.help.clone(),
            descriptor.kind.label_names().to_vec(),
        );
        self.handles.entry(key).or_insert(handle)
    }

    /// Register every counter of a catalog
    pub fn register_catalog(&mut self, catalog: &Catalog) {
        for descriptor in catalog.descriptors() {
            self.register(descriptor);
        }
    }

    /// Handle for `(kind, id)`; absent is not an error
    pub fn lookup(&self, kind: ResourceKind, id: u32) -> Option<&MetricHandle> {
        self.handles.get(&(kind, id))
    }

    /// Look up and set in one step; returns false if no handle exists
    pub fn observe(&self, kind: ResourceKind, id: u32, label_values: &[&str], value: f64) -> bool {
        match self.lookup(kind, id) {
            Some(handle) => {
                handle.observe(label_values, value);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Snapshot of all observed series, ordered by kind, counter id and labels
    pub fn gather(&self) -> Vec<PrometheusMetric> {
        let mut out = Vec::new();
        for handle in self.handles.values() {
            handle.collect_into(&mut out);
        }
        out
    }

    /// Render the whole registry in text exposition format
    pub fn render(&self) -> String {
        PrometheusFormatter::new().format(&self.gather())
    }
}
