//! Scripted `CounterSource` for tests and offline demos.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::{CounterSource, ProcessReadError, SourceError};
use crate::model::{CpuGauges, DiskCounters, MemoryGauges, NetworkCounters, ProcessRecord};

/// Shared, ordered log of what the fake was asked to do.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub struct FakeProcess {
    pid: u32,
    result: Result<ProcessRecord, ProcessReadError>,
}

impl FakeProcess {
    pub fn ok(record: ProcessRecord) -> Self {
        Self {
            pid: record.pid,
            result: Ok(record),
        }
    }

    pub fn failing(pid: u32, error: ProcessReadError) -> Self {
        Self {
            pid,
            result: Err(error),
        }
    }
}

/// Every script repeats its last entry once exhausted. Counter readings are
/// stamped `step` apart on a synthetic clock so rates come out exact.
pub struct FakeSource {
    cpu: Vec<f64>,
    net_sent: Vec<u64>,
    net_recv: Vec<u64>,
    disk_read: Vec<u64>,
    disk_written: Vec<u64>,
    memory: MemoryGauges,
    processes: Vec<FakeProcess>,
    process_list_fails: bool,
    failing_reads: HashSet<usize>,
    read_delay: Option<Duration>,
    events: Option<EventLog>,
    epoch: Instant,
    step: Duration,
    cpu_reads: usize,
    net_reads: usize,
    disk_reads: usize,
}

impl Default for FakeSource {
    fn default() -> Self {
        Self::new()
    }
}

fn scripted<T: Copy + Default>(script: &[T], index: usize) -> T {
    script
        .get(index)
        .or_else(|| script.last())
        .copied()
        .unwrap_or_default()
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            cpu: Vec::new(),
            net_sent: Vec::new(),
            net_recv: Vec::new(),
            disk_read: Vec::new(),
            disk_written: Vec::new(),
            memory: MemoryGauges {
                total: 8 * 1024 * 1024 * 1024,
                used: 2 * 1024 * 1024 * 1024,
                available: 6 * 1024 * 1024 * 1024,
                swap_total: 0,
                swap_used: 0,
            },
            processes: Vec::new(),
            process_list_fails: false,
            failing_reads: HashSet::new(),
            read_delay: None,
            events: None,
            epoch: Instant::now(),
            step: Duration::from_secs(1),
            cpu_reads: 0,
            net_reads: 0,
            disk_reads: 0,
        }
    }

    pub fn with_cpu(mut self, values: Vec<f64>) -> Self {
        self.cpu = values;
        self
    }

    pub fn with_bytes_sent(mut self, values: Vec<u64>) -> Self {
        self.net_sent = values;
        self
    }

    pub fn with_bytes_recv(mut self, values: Vec<u64>) -> Self {
        self.net_recv = values;
        self
    }

    pub fn with_disk_bytes(mut self, read: Vec<u64>, written: Vec<u64>) -> Self {
        self.disk_read = read;
        self.disk_written = written;
        self
    }

    pub fn with_memory(mut self, memory: MemoryGauges) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_processes(mut self, processes: Vec<FakeProcess>) -> Self {
        self.processes = processes;
        self
    }

    pub fn failing_process_list(mut self) -> Self {
        self.process_list_fails = true;
        self
    }

    /// Make the n-th (0-based) gauge read fail as if the OS source were gone.
    pub fn failing_read(mut self, index: usize) -> Self {
        self.failing_reads.insert(index);
        self
    }

    /// Block every gauge read for `delay`.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    fn record(&self, event: String) {
        if let Some(events) = &self.events {
            events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
        }
    }

    fn stamp(&self, reads: usize) -> Instant {
        self.epoch + self.step * reads as u32
    }
}

impl CounterSource for FakeSource {
    fn cpu(&mut self) -> Result<CpuGauges, SourceError> {
        let index = self.cpu_reads;
        self.cpu_reads += 1;
        self.record(format!("read-start {index}"));
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        if self.failing_reads.contains(&index) {
            self.record(format!("read-failed {index}"));
            return Err(SourceError::Unavailable("scripted outage".into()));
        }
        Ok(CpuGauges {
            usage_percent: scripted(&self.cpu, index),
            frequency_mhz: 2400,
            physical_cores: 4,
            logical_cores: 8,
        })
    }

    fn memory(&mut self) -> Result<MemoryGauges, SourceError> {
        Ok(self.memory.clone())
    }

    fn network(&mut self) -> Result<NetworkCounters, SourceError> {
        let index = self.net_reads;
        self.net_reads += 1;
        Ok(NetworkCounters {
            bytes_sent: scripted(&self.net_sent, index),
            bytes_recv: scripted(&self.net_recv, index),
            taken_at: self.stamp(index),
        })
    }

    fn disk(&mut self) -> Result<DiskCounters, SourceError> {
        let index = self.disk_reads;
        self.disk_reads += 1;
        Ok(DiskCounters {
            bytes_read: scripted(&self.disk_read, index),
            bytes_written: scripted(&self.disk_written, index),
            taken_at: self.stamp(index),
        })
    }

    fn process_ids(&mut self) -> Result<Vec<u32>, SourceError> {
        if self.process_list_fails {
            return Err(SourceError::Unavailable("process list unreadable".into()));
        }
        Ok(self.processes.iter().map(|p| p.pid).collect())
    }

    fn read_process(&self, pid: u32) -> Result<ProcessRecord, ProcessReadError> {
        self.processes
            .iter()
            .find(|p| p.pid == pid)
            .map(|p| p.result.clone())
            .unwrap_or(Err(ProcessReadError::NoSuchProcess { pid }))
    }
}
