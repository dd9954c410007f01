//! ESX host performance samples

use std::collections::HashMap;

use crate::vsphere::{ManagedObjectReference, PerfSeries, Session, VimResult};

/// Real-time sampling interval of the performance manager, in seconds
pub const SAMPLE_INTERVAL_SECS: u32 = 20;

/// Only the most recent sample is requested
pub const MAX_SAMPLE: u32 = 1;

/// Value the provider reports when it has no data for a sample
pub const NO_DATA: i64 = -1;

/// Latest sample per counter id for one scrape
///
/// The aggregate series (empty instance) wins over per-instance series of the
/// same counter. Without an aggregate, the first instance seen is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleSet {
    values: HashMap<u32, f64>,
}

impl SampleSet {
    pub fn from_series(series: &[PerfSeries]) -> Self {
        let mut values: HashMap<u32, (f64, bool)> = HashMap::new();

        for s in series {
            let Some(latest) = s.latest() else { continue };
            if latest == NO_DATA {
                continue;
            }

            let aggregate = s.instance.is_empty();
            match values.get(&s.counter_id) {
                Some(&(_, true)) => {}
                Some(_) if !aggregate => {}
                _ => {
                    values.insert(s.counter_id, (latest as f64, aggregate));
                }
            }
        }

        Self {
            values: values.into_iter().map(|(id, (v, _))| (id, v)).collect(),
        }
    }

    pub fn get(&self, counter_id: u32) -> Option<f64> {
        self.values.get(&counter_id).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Query the most recent real-time sample of every counter of a host
pub async fn sample(session: &Session, host: &ManagedObjectReference) -> VimResult<SampleSet> {
    let series = session
        .query_perf(host, SAMPLE_INTERVAL_SECS, MAX_SAMPLE)
        .await?;
    Ok(SampleSet::from_series(&series))
}
