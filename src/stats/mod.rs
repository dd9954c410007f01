//! Stats collection
//!
//! A scrape runs in four stages:
//! 1. Resolve - obtain a live session from the [`SessionManager`]
//! 2. Locate - find the datacenter, then the resource
//! 3. Fetch - read the resource `summary` (plus a performance query for hosts)
//! 4. Populate - write every counter that has a value into the registry
//!
//! The first failing stage aborts the scrape before anything is written.
//! Counters without a value or without a handle are skipped, not fatal.

pub mod host;
pub mod locate;

use std::sync::Arc;

use tracing::{debug, info};

use crate::catalog::{Catalog, CounterDescriptor, Extract};
use crate::error::{AppError, AppResult, CatalogUnavailable};
use crate::metrics::MetricRegistry;
use crate::resource::{ResourceKind, ResourceLocator};
use crate::session::SessionManager;
use crate::vsphere::{PropertySet, Session};

pub use host::SampleSet;
pub use locate::Located;

/// Summary property fetched for every kind
const SUMMARY_PROPERTY: &str = "summary";

/// Outcome of a successful scrape
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeReport {
    /// Gauges written
    pub observed: usize,
    /// Counters with no value or no handle
    pub skipped: usize,
}

/// Data fetched for one resource
#[derive(Debug, Clone, Default)]
pub struct Fetched {
    pub properties: PropertySet,
    pub samples: SampleSet,
}

impl Fetched {
    /// Value of a counter in this data, if present
    pub fn value_of(&self, descriptor: &CounterDescriptor) -> Option<f64> {
        match descriptor.extract {
            Extract::Field(path) => self.properties.get(path),
            Extract::Linear(terms) => self.properties.linear(terms),
            Extract::Sample => self.samples.get(descriptor.id),
        }
    }
}

/// Stats collector for the active resource kind
pub struct StatsCollector {
    kind: ResourceKind,
    sessions: Arc<SessionManager>,
    registry: Arc<MetricRegistry>,
    catalog: Result<Catalog, CatalogUnavailable>,
}

impl StatsCollector {
    pub fn new(
        kind: ResourceKind,
        sessions: Arc<SessionManager>,
        registry: Arc<MetricRegistry>,
        catalog: Result<Catalog, CatalogUnavailable>,
    ) -> Self {
        Self {
            kind,
            sessions,
            registry,
            catalog,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> Result<&Catalog, &CatalogUnavailable> {
        self.catalog.as_ref()
    }

    /// Scrape one resource into the registry
    pub async fn scrape(&self, locator: &ResourceLocator) -> AppResult<ScrapeReport> {
        let catalog = self
            .catalog
            .as_ref()
            .map_err(|e| AppError::CatalogUnavailable(e.clone()))?;

        info!(
            kind = %self.kind,
            datacenter = %locator.datacenter,
            resource = %locator.name,
            "Scraping resource"
        );

        let session = self.sessions.ensure_connected().await?;
        let located = locate::locate(&session, self.kind, locator).await?;
        let fetched = self.fetch(&session, &located, locator).await?;

        let report = populate(&self.registry, catalog, locator, &fetched);
        debug!(
            kind = %self.kind,
            observed = report.observed,
            skipped = report.skipped,
            "Scrape complete"
        );
        Ok(report)
    }

    async fn fetch(
        &self,
        session: &Session,
        located: &Located,
        locator: &ResourceLocator,
    ) -> AppResult<Fetched> {
        let fetch_error = |source| AppError::PropertyFetch {
            object: self.kind.managed_type(),
            name: locator.name.clone(),
            source,
        };

        let properties = session
            .retrieve_property(&located.resource, SUMMARY_PROPERTY)
            .await
            .map_err(fetch_error)?
            .map(|summary| PropertySet::from_node(&summary))
            .unwrap_or_default();

        let samples = match self.kind {
            ResourceKind::Esx => host::sample(session, &located.resource)
                .await
                .map_err(fetch_error)?,
            ResourceKind::Datastore | ResourceKind::VirtualMachine => SampleSet::default(),
        };

        Ok(Fetched {
            properties,
            samples,
        })
    }
}

/// Write every resolvable counter of `catalog` into the registry
pub fn populate(
    registry: &MetricRegistry,
    catalog: &Catalog,
    locator: &ResourceLocator,
    fetched: &Fetched,
) -> ScrapeReport {
    let labels = locator.label_values();
    let mut report = ScrapeReport::default();

    for descriptor in catalog.descriptors() {
        let Some(value) = fetched.value_of(descriptor) else {
            debug!(counter = %descriptor.metric_name(), "No value for counter, skipping");
            report.skipped += 1;
            continue;
        };

        match registry.lookup(descriptor.kind, descriptor.id) {
            Some(handle) => {
                handle.observe(&labels, value);
                report.observed += 1;
            }
            None => {
                debug!(counter = %descriptor.metric_name(), "Counter not registered, skipping");
                report.skipped += 1;
            }
        }
    }

    report
}
