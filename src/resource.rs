//! Resource kinds and per-request resource locators
//!
//! The exporter serves exactly one kind of vSphere object per process. The
//! kind decides which counter catalog, label schema and route are active.

use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// The class of vSphere object a process exports metrics for
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// ESX host systems (counters discovered from the performance manager)
    #[value(name = "esx")]
    Esx,
    /// Datastores (static summary table)
    #[value(name = "datastore")]
    Datastore,
    /// Virtual machines (static quick-stats table)
    #[value(name = "virtualmachine")]
    VirtualMachine,
}

impl ResourceKind {
    /// All kinds, in declaration order
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Esx,
        ResourceKind::Datastore,
        ResourceKind::VirtualMachine,
    ];

    /// Configuration value for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Esx => "esx",
            ResourceKind::Datastore => "datastore",
            ResourceKind::VirtualMachine => "virtualmachine",
        }
    }

    /// Metric subsystem, the middle part of every exported metric name
    pub fn subsystem(&self) -> &'static str {
        match self {
            ResourceKind::Esx => "esx",
            ResourceKind::Datastore => "datastore",
            ResourceKind::VirtualMachine => "vm",
        }
    }

    /// Label (and route segment) naming the individual resource
    pub fn resource_label(&self) -> &'static str {
        match self {
            ResourceKind::Esx => "host",
            ResourceKind::Datastore => "datastore",
            ResourceKind::VirtualMachine => "vm",
        }
    }

    /// vim25 managed object type of the resource
    pub fn managed_type(&self) -> &'static str {
        match self {
            ResourceKind::Esx => "HostSystem",
            ResourceKind::Datastore => "Datastore",
            ResourceKind::VirtualMachine => "VirtualMachine",
        }
    }

    /// Label names every gauge of this kind carries, in label-value order
    pub fn label_names(&self) -> [&'static str; 2] {
        ["datacenter", self.resource_label()]
    }

    /// Axum route template for the metrics endpoint of this kind
    pub fn route(&self) -> String {
        let segment = self.resource_label();
        format!("/datacenter/:datacenter/{segment}/:{segment}/metrics")
    }

    /// Human-readable route, as shown on the index page
    pub fn route_display(&self) -> String {
        let segment = self.resource_label();
        format!("/datacenter/{{datacenter}}/{segment}/{{{segment}}}/metrics")
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "unknown resource kind '{}' (expected esx, datastore or virtualmachine)",
                    s
                )
            })
    }
}

/// Identifies the resource a scrape is about; supplied per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLocator {
    /// Datacenter name (inventory path below the root folder)
    pub datacenter: String,
    /// Host, datastore or VM name
    pub name: String,
}

impl ResourceLocator {
    pub fn new(datacenter: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            datacenter: datacenter.into(),
            name: name.into(),
        }
    }

    /// Label values matching [`ResourceKind::label_names`]
    pub fn label_values(&self) -> [&str; 2] {
        [self.datacenter.as_str(), self.name.as_str()]
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.datacenter, self.name)
    }
}
