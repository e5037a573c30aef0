// Re-export all model types from submodules.

pub use counters::{
    CpuGauges, DiskCounters, DiskSpaceInfo, MemoryGauges, NetworkCounters, Rates,
};
pub use process::{ProcessRecord, SortColumn};
pub use sample::{Metric, Sample};
pub use snapshot::Snapshot;

mod counters;
mod process;
mod sample;
mod snapshot;
