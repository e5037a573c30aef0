use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::model::{
    CpuGauges, DiskCounters, DiskSpaceInfo, MemoryGauges, NetworkCounters, ProcessRecord,
};

pub mod fake;
pub mod host;
#[cfg(target_os = "linux")]
pub mod linux;

pub use host::HostSource;

/// A whole-tick read failure: the source itself could not be read.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    #[error("previous read has not finished yet")]
    Busy,

    #[error("blocking read task failed: {0}")]
    Task(String),
}

/// Why a single process could not be read. Expected during enumeration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProcessReadError {
    #[error("process {pid} no longer exists")]
    NoSuchProcess { pid: u32 },

    #[error("access denied reading process {pid}")]
    AccessDenied { pid: u32 },

    #[error("process {pid} is a zombie")]
    Zombie { pid: u32 },
}

/// Read boundary to the operating system's counters and gauges.
/// Implementations (HostSource, test fakes) keep whatever handles they need
/// but no sampling state; deltas are the sampler's job.
pub trait CounterSource: Send {
    /// Instantaneous CPU usage, frequency and core counts.
    fn cpu(&mut self) -> Result<CpuGauges, SourceError>;

    fn memory(&mut self) -> Result<MemoryGauges, SourceError>;

    /// Cumulative bytes sent/received across non-loopback interfaces.
    fn network(&mut self) -> Result<NetworkCounters, SourceError>;

    /// Cumulative bytes read/written across physical disks.
    fn disk(&mut self) -> Result<DiskCounters, SourceError>;

    /// Enumerate the visible processes, in OS order.
    fn process_ids(&mut self) -> Result<Vec<u32>, SourceError>;

    /// Read one process from the last enumeration.
    fn read_process(&self, pid: u32) -> Result<ProcessRecord, ProcessReadError>;

    fn disk_space(&mut self) -> Vec<DiskSpaceInfo> {
        Vec::new()
    }

    /// Placeholder; no GPU backend is wired in.
    fn gpu_percent(&mut self) -> f64 {
        0.0
    }
}
