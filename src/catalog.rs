//! Counter catalog
//!
//! Resolves the set of counters exported for a resource kind. Datastores and
//! virtual machines use fixed tables over summary fields; ESX hosts use the
//! counter descriptions of the endpoint's performance manager, discovered once
//! at startup and immutable afterwards.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::error::CatalogUnavailable;
use crate::resource::ResourceKind;
use crate::session::SessionManager;
use crate::vsphere::PerfCounterInfo;

/// Namespace prefix of every exported counter
pub const NAMESPACE: &str = "vsphere";

/// First id of the datastore table
pub const DATASTORE_BASE_ID: u32 = 1024;

/// First id of the virtual machine table
pub const VM_BASE_ID: u32 = 1000;

/// How a counter's value is read from fetched data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extract {
    /// Numeric summary field at a dotted path
    Field(&'static str),
    /// Weighted sum of summary fields, absent if any input is missing
    Linear(&'static [(&'static str, f64)]),
    /// Latest performance sample for the counter id
    Sample,
}

/// One exportable counter
#[derive(Debug, Clone, PartialEq)]
pub struct CounterDescriptor {
    pub id: u32,
    /// Snake-case key, the last part of the metric name
    pub key: String,
    pub kind: ResourceKind,
    pub help: String,
    pub extract: Extract,
}

impl CounterDescriptor {
    /// `vsphere_<subsystem>_<id>_<key>`
    pub fn metric_name(&self) -> String {
        format!(
            "{}_{}_{}_{}",
            NAMESPACE,
            self.kind.subsystem(),
            self.id,
            self.key
        )
    }
}

struct StaticCounter {
    key: &'static str,
    help: &'static str,
    extract: Extract,
}

const DATASTORE_COUNTERS: &[StaticCounter] = &[
    StaticCounter {
        key: "freespace_size",
        help: "Available space of the datastore in bytes",
        extract: Extract::Field("freeSpace"),
    },
    StaticCounter {
        key: "uncommitted_size",
        help: "Additional storage that thin provisioned files may claim in bytes",
        extract: Extract::Field("uncommitted"),
    },
    StaticCounter {
        key: "usedspace_size",
        help: "Used space of the datastore in bytes",
        extract: Extract::Linear(&[("capacity", 1.0), ("freeSpace", -1.0)]),
    },
    StaticCounter {
        key: "capacity_size",
        help: "Maximum capacity of the datastore in bytes",
        extract: Extract::Field("capacity"),
    },
    StaticCounter {
        key: "provisioned_size",
        help: "Provisioned space of the datastore in bytes",
        extract: Extract::Linear(&[
            ("capacity", 1.0),
            ("freeSpace", -1.0),
            ("uncommitted", 1.0),
        ]),
    },
];

const VM_COUNTERS: &[StaticCounter] = &[
    StaticCounter {
        key: "ballooned_memory",
        help: "Memory reclaimed by the balloon driver in MB",
        extract: Extract::Field("quickStats.balloonedMemory"),
    },
    StaticCounter {
        key: "compressed_memory",
        help: "Compressed memory in KB",
        extract: Extract::Field("quickStats.compressedMemory"),
    },
    StaticCounter {
        key: "consumed_overhead_memory",
        help: "Overhead memory consumed in MB",
        extract: Extract::Field("quickStats.consumedOverheadMemory"),
    },
    StaticCounter {
        key: "distributed_cpu_entitlement",
        help: "CPU entitlement computed by the resource scheduler in MHz",
        extract: Extract::Field("quickStats.distributedCpuEntitlement"),
    },
    StaticCounter {
        key: "distributed_memory_entitlement",
        help: "Memory entitlement computed by the resource scheduler in MB",
        extract: Extract::Field("quickStats.distributedMemoryEntitlement"),
    },
    StaticCounter {
        key: "ft_log_bandwidth",
        help: "Fault tolerance log bandwidth in KB/s",
        extract: Extract::Field("quickStats.ftLogBandwidth"),
    },
    StaticCounter {
        key: "ft_secondary_latency",
        help: "Fault tolerance secondary latency in ms",
        extract: Extract::Field("quickStats.ftSecondaryLatency"),
    },
    StaticCounter {
        key: "guest_memory_usage",
        help: "Guest memory actively used in MB",
        extract: Extract::Field("quickStats.guestMemoryUsage"),
    },
    StaticCounter {
        key: "host_memory_usage",
        help: "Host memory consumed by the virtual machine in MB",
        extract: Extract::Field("quickStats.hostMemoryUsage"),
    },
    StaticCounter {
        key: "overall_cpu_demand",
        help: "CPU demand in MHz",
        extract: Extract::Field("quickStats.overallCpuDemand"),
    },
    StaticCounter {
        key: "overall_cpu_usage",
        help: "CPU usage in MHz",
        extract: Extract::Field("quickStats.overallCpuUsage"),
    },
    StaticCounter {
        key: "private_memory",
        help: "Private memory in MB",
        extract: Extract::Field("quickStats.privateMemory"),
    },
    StaticCounter {
        key: "shared_memory",
        help: "Shared memory in MB",
        extract: Extract::Field("quickStats.sharedMemory"),
    },
    StaticCounter {
        key: "ssd_swapped_memory",
        help: "Memory swapped to host cache in KB",
        extract: Extract::Field("quickStats.ssdSwappedMemory"),
    },
    StaticCounter {
        key: "static_cpu_entitlement",
        help: "Static CPU entitlement in MHz",
        extract: Extract::Field("quickStats.staticCpuEntitlement"),
    },
    StaticCounter {
        key: "static_memory_entitlement",
        help: "Static memory entitlement in MB",
        extract: Extract::Field("quickStats.staticMemoryEntitlement"),
    },
    StaticCounter {
        key: "swapped_memory",
        help: "Swapped memory in MB",
        extract: Extract::Field("quickStats.swappedMemory"),
    },
    StaticCounter {
        key: "uptime_seconds",
        help: "Time the virtual machine has been powered on in seconds",
        extract: Extract::Field("quickStats.uptimeSeconds"),
    },
];

/// Resolved counters of one resource kind
#[derive(Debug, Clone)]
pub enum Catalog {
    /// Compile-time table over summary fields
    Static(Vec<CounterDescriptor>),
    /// Built from the performance manager's counter descriptions
    Discovered(Vec<CounterDescriptor>),
}

impl Catalog {
    /// The fixed table for kinds that have one
    pub fn fixed(kind: ResourceKind) -> Option<Self> {
        let (base, table) = match kind {
            ResourceKind::Datastore => (DATASTORE_BASE_ID, DATASTORE_COUNTERS),
            ResourceKind::VirtualMachine => (VM_BASE_ID, VM_COUNTERS),
            ResourceKind::Esx => return None,
        };

        let descriptors = table
            .iter()
            .zip(base..)
            .map(|(counter, id)| CounterDescriptor {
                id,
                key: counter.key.to_string(),
                kind,
                help: counter.help.to_string(),
                extract: counter.extract,
            })
            .collect();

        Some(Catalog::Static(descriptors))
    }

    /// Build a catalog from provider counter descriptions
    ///
    /// Duplicate ids keep the first description.
    pub fn discovered(
        kind: ResourceKind,
        counters: impl IntoIterator<Item = PerfCounterInfo>,
    ) -> Self {
        let mut seen = HashSet::new();
        let mut descriptors = Vec::new();

        for counter in counters {
            if !seen.insert(counter.key) {
                debug!(
                    id = counter.key,
                    path = %counter.dotted_path(),
                    "Duplicate counter id from provider, keeping the first"
                );
                continue;
            }

            let key = to_snake_case(&counter.dotted_path().replace('.', "_"));
            let mut descriptor = CounterDescriptor {
                id: counter.key,
                key,
                kind,
                help: String::new(),
                extract: Extract::Sample,
            };
            descriptor.help = counter
                .summary
                .unwrap_or_else(|| descriptor.metric_name());
            descriptors.push(descriptor);
        }

        Catalog::Discovered(descriptors)
    }

    /// Resolve the catalog for `kind`, querying the provider if needed
    ///
    /// Runs once at startup. A failure is final for the process lifetime.
    pub async fn resolve(
        kind: ResourceKind,
        sessions: &SessionManager,
    ) -> Result<Self, CatalogUnavailable> {
        if let Some(catalog) = Self::fixed(kind) {
            return Ok(catalog);
        }

        let unavailable = |reason: String| CatalogUnavailable { kind, reason };

        let session = sessions
            .ensure_connected()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let perf_manager = session
            .content()
            .perf_manager
            .clone()
            .ok_or_else(|| unavailable("endpoint has no performance manager".to_string()))?;
        let value = session
            .retrieve_property(&perf_manager, "perfCounter")
            .await
            .map_err(|e| unavailable(e.to_string()))?
            .ok_or_else(|| unavailable("perfCounter property is unset".to_string()))?;

        let catalog = Self::discovered(kind, PerfCounterInfo::list_from_node(&value));
        info!(kind = %kind, counters = catalog.len(), "Discovered performance counters");
        Ok(catalog)
    }

    pub fn descriptors(&self) -> &[CounterDescriptor] {
        match self {
            Catalog::Static(descriptors) | Catalog::Discovered(descriptors) => descriptors,
        }
    }

    pub fn is_discovered(&self) -> bool {
        matches!(self, Catalog::Discovered(_))
    }

    pub fn len(&self) -> usize {
        self.descriptors().len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors().is_empty()
    }
}

/// Lower snake case: `numberReadAveraged` -> `number_read_averaged`
///
/// Characters outside `[A-Za-z0-9]` become separators; runs of separators collapse.
pub fn to_snake_case(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }

        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let boundary = prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower);
            if boundary && !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
        }

        out.push(c.to_ascii_lowercase());
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}
