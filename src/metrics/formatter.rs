//! Prometheus text exposition format (version 0.0.4)
//!
//! ```text
//! # HELP <metric_name> <help_text>
//! # TYPE <metric_name> <type>
//! <metric_name>{<label1>="<value1>",<label2>="<value2>"} <value>
//! ```

use std::collections::HashMap;
use std::fmt::Write;

use super::PrometheusMetric;

/// Renders [`PrometheusMetric`] samples as exposition text
///
/// HELP/TYPE lines are written once per metric name, samples sharing a name
/// are grouped under the first occurrence and labels are sorted by name.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusFormatter;

impl PrometheusFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(&self, metrics: &[PrometheusMetric]) -> String {
        let mut out = String::with_capacity(metrics.len() * 96);

        for group in group_by_name(metrics) {
            let head = group[0];
            if let Some(help) = &head.help {
                let _ = writeln!(out, "# HELP {} {}", head.name, escape_help(help));
            }
            let _ = writeln!(out, "# TYPE {} {}", head.name, head.metric_type.as_str());

            for metric in group {
                write_sample(&mut out, metric);
            }
        }

        out
    }
}

/// Group by name, in order of first occurrence
fn group_by_name(metrics: &[PrometheusMetric]) -> Vec<Vec<&PrometheusMetric>> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&PrometheusMetric>> = Vec::new();

    for metric in metrics {
        match index.get(metric.name.as_str()) {
            Some(&i) => groups[i].push(metric),
            None => {
                index.insert(metric.name.as_str(), groups.len());
                groups.push(vec![metric]);
            }
        }
    }

    groups
}

fn write_sample(out: &mut String, metric: &PrometheusMetric) {
    out.push_str(&metric.name);

    if !metric.labels.is_empty() {
        let mut labels: Vec<_> = metric.labels.iter().collect();
        labels.sort_unstable_by(|a, b| a.0.cmp(b.0));

        out.push('{');
        for (i, (name, value)) in labels.into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{}=\"{}\"", name, escape_label_value(value));
        }
        out.push('}');
    }

    out.push(' ');
    out.push_str(&format_value(metric.value));
    out.push('\n');
}

/// Integral values print without a fraction, huge or tiny ones in scientific notation
fn format_value(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "+Inf" } else { "-Inf" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    if value.abs() >= 1e15 || value.abs() < 1e-3 {
        return format!("{:e}", value);
    }
    value.to_string()
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}
