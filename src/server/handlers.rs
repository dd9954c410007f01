//! HTTP request handlers

use std::time::Instant;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, instrument};

use super::AppState;
use crate::config::{VERSION_INT, VERSION_STR};
use crate::metrics::{MetricType, PrometheusFormatter, PrometheusMetric, TEXT_CONTENT_TYPE};
use crate::resource::ResourceLocator;
use crate::stats::ScrapeReport;

/// Version response
#[derive(Debug, Serialize)]
pub struct VersionResponse {
    #[serde(rename = "VersionInt")]
    version_int: u32,
    #[serde(rename = "VersionStr")]
    version_str: &'static str,
}

/// Root endpoint - displays basic info
pub async fn root(State(state): State<AppState>) -> Html<String> {
    let kind = state.collector.kind();
    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>vSphere Exporter</title>
</head>
<body>
    <h1>vSphere Exporter</h1>
    <p>Version: {}</p>
    <p>Resource type: {}</p>
    <ul>
        <li><a href="/version">Version</a></li>
        <li><code>{}</code></li>
    </ul>
</body>
</html>"#,
        VERSION_STR,
        kind,
        kind.route_display()
    );
    Html(html)
}

/// Version endpoint
pub async fn version() -> Json<VersionResponse> {
    Json(VersionResponse {
        version_int: VERSION_INT,
        version_str: VERSION_STR,
    })
}

/// Metrics endpoint - scrapes one resource and returns the whole registry
#[instrument(
    skip(state),
    name = "metrics_handler",
    fields(kind = %state.collector.kind())
)]
pub async fn metrics(
    State(state): State<AppState>,
    Path((datacenter, resource)): Path<(String, String)>,
) -> Response {
    let start = Instant::now();
    let locator = ResourceLocator::new(datacenter, resource);

    let report = match state.collector.scrape(&locator).await {
        Ok(report) => report,
        // Converted here so the failure is logged inside this span
        Err(e) => return e.into_response(),
    };

    let mut output = state.collector.registry().render();
    let duration = start.elapsed().as_secs_f64();
    output.push_str(&PrometheusFormatter::new().format(&self_metrics(duration, report)));

    debug!(
        duration_ms = start.elapsed().as_millis() as u64,
        observed = report.observed,
        skipped = report.skipped,
        "Metrics collection complete"
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)],
        output,
    )
        .into_response()
}

fn self_metrics(duration: f64, report: ScrapeReport) -> Vec<PrometheusMetric> {
    vec![
        PrometheusMetric::new("vsphere_exporter_info", 1.0)
            .with_type(MetricType::Gauge)
            .with_help("vSphere exporter information")
            .with_label("version", VERSION_STR),
        PrometheusMetric::new("vsphere_exporter_scrape_duration_seconds", duration)
            .with_type(MetricType::Gauge)
            .with_help("Time spent scraping the resource"),
        PrometheusMetric::new("vsphere_exporter_metrics_observed", report.observed as f64)
            .with_type(MetricType::Gauge)
            .with_help("Counters written by the last scrape"),
        PrometheusMetric::new("vsphere_exporter_metrics_skipped", report.skipped as f64)
            .with_type(MetricType::Gauge)
            .with_help("Counters without a value in the last scrape"),
    ]
}
