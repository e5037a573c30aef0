use std::collections::BTreeMap;

use serde::Serialize;

use super::{CpuGauges, DiskSpaceInfo, MemoryGauges, Metric, ProcessRecord, Rates};

/// Everything published for one tick. Handed out behind an `Arc` and never
/// mutated after publication.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub time: String,
    pub cpu: CpuGauges,
    pub memory: MemoryGauges,
    pub memory_percent: f64,
    pub gpu_percent: f64,
    pub rates: Rates,
    pub disk_space: Vec<DiskSpaceInfo>,
    pub history: BTreeMap<Metric, Vec<f64>>,
    pub processes: Vec<ProcessRecord>,
    /// Set when the process list could not be read this tick.
    pub partial: bool,
    pub skipped_ticks: u64,
    pub counter_anomalies: u64,
}

impl Snapshot {
    pub fn series(&self, metric: Metric) -> &[f64] {
        self.history.get(&metric).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Case-insensitive substring match on process names. An empty query
    /// matches everything.
    pub fn filter_processes(&self, query: &str) -> Vec<ProcessRecord> {
        let needle = query.to_lowercase();
        self.processes
            .iter()
            .filter(|p| needle.is_empty() || p.name.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }
}
