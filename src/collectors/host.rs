use std::time::Instant;

use sysinfo::{Disks, Networks, Pid, ProcessStatus, ProcessesToUpdate, System};
#[cfg(target_os = "linux")]
use tracing::debug;

use super::{CounterSource, ProcessReadError, SourceError};
use crate::model::{
    CpuGauges, DiskCounters, DiskSpaceInfo, MemoryGauges, NetworkCounters, ProcessRecord,
};

/// `CounterSource` backed by `sysinfo`. On Linux, disk counters come
/// straight from /proc/diskstats when it is readable.
pub struct HostSource {
    sys: System,
    networks: Networks,
    disks: Disks,
}

impl HostSource {
    pub fn new() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();
        Self {
            sys,
            networks: Networks::new_with_refreshed_list(),
            disks: Disks::new_with_refreshed_list(),
        }
    }
}

impl Default for HostSource {
    fn default() -> Self {
        Self::new()
    }
}

fn is_loopback(name: &str) -> bool {
    name == "lo" || name.starts_with("lo0") || name.to_ascii_lowercase().contains("loopback")
}

impl CounterSource for HostSource {
    fn cpu(&mut self) -> Result<CpuGauges, SourceError> {
        self.sys.refresh_cpu_all();
        let cpus = self.sys.cpus();
        if cpus.is_empty() {
            return Err(SourceError::Unavailable("no CPUs reported".into()));
        }
        let frequency_mhz = cpus.iter().map(|c| c.frequency()).sum::<u64>() / cpus.len() as u64;
        Ok(CpuGauges {
            usage_percent: self.sys.global_cpu_usage() as f64,
            frequency_mhz,
            physical_cores: System::physical_core_count().unwrap_or(cpus.len()),
            logical_cores: cpus.len(),
        })
    }

    fn memory(&mut self) -> Result<MemoryGauges, SourceError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(SourceError::Unavailable("total memory reported as zero".into()));
        }
        Ok(MemoryGauges {
            total,
            used: self.sys.used_memory(),
            available: self.sys.available_memory(),
            swap_total: self.sys.total_swap(),
            swap_used: self.sys.used_swap(),
        })
    }

    fn network(&mut self) -> Result<NetworkCounters, SourceError> {
        self.networks.refresh(true);
        let taken_at = Instant::now();
        let (mut sent, mut recv) = (0u64, 0u64);
        for (name, data) in &self.networks {
            if is_loopback(name) {
                continue;
            }
            sent = sent.saturating_add(data.total_transmitted());
            recv = recv.saturating_add(data.total_received());
        }
        Ok(NetworkCounters {
            bytes_sent: sent,
            bytes_recv: recv,
            taken_at,
        })
    }

    fn disk(&mut self) -> Result<DiskCounters, SourceError> {
        #[cfg(target_os = "linux")]
        match super::linux::read_disk_bytes() {
            Ok((bytes_read, bytes_written)) => {
                return Ok(DiskCounters {
                    bytes_read,
                    bytes_written,
                    taken_at: Instant::now(),
                });
            }
            Err(e) => debug!(error = %e, "procfs disk counters unavailable, using sysinfo"),
        }

        self.disks.refresh(true);
        let taken_at = Instant::now();
        let (mut read, mut written) = (0u64, 0u64);
        for disk in self.disks.list() {
            let usage = disk.usage();
            read = read.saturating_add(usage.total_read_bytes);
            written = written.saturating_add(usage.total_written_bytes);
        }
        Ok(DiskCounters {
            bytes_read: read,
            bytes_written: written,
            taken_at,
        })
    }

    fn process_ids(&mut self) -> Result<Vec<u32>, SourceError> {
        self.sys.refresh_processes(ProcessesToUpdate::All, true);
        let pids: Vec<u32> = self
            .sys
            .processes()
            .values()
            .filter(|p| p.thread_kind().is_none())
            .map(|p| p.pid().as_u32())
            .filter(|&pid| pid != 0)
            .collect();
        if pids.is_empty() {
            return Err(SourceError::Unavailable("process list is empty".into()));
        }
        Ok(pids)
    }

    fn read_process(&self, pid: u32) -> Result<ProcessRecord, ProcessReadError> {
        let process = self
            .sys
            .process(Pid::from_u32(pid))
            .ok_or(ProcessReadError::NoSuchProcess { pid })?;

        if matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead) {
            return Err(ProcessReadError::Zombie { pid });
        }

        let total = self.sys.total_memory();
        let memory_percent = if total > 0 {
            process.memory() as f64 / total as f64 * 100.0
        } else {
            0.0
        };

        Ok(ProcessRecord {
            pid,
            name: process.name().to_string_lossy().into_owned(),
            cpu_percent: process.cpu_usage() as f64,
            memory_percent,
        })
    }

    fn disk_space(&mut self) -> Vec<DiskSpaceInfo> {
        self.disks.refresh(true);
        let mut space = Vec::new();
        for disk in self.disks.list() {
            let total = disk.total_space() as f64;
            if total <= 0.0 {
                continue;
            }
            let available = disk.available_space() as f64;
            let percent_free = (available / total) * 100.0;
            space.push(DiskSpaceInfo {
                mount_point: disk.mount_point().to_string_lossy().into_owned(),
                total_gb: total / 1_073_741_824.0,
                available_gb: available / 1_073_741_824.0,
                percent_free,
                is_warning: percent_free < 10.0,
            });
        }
        space
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_interfaces_are_recognised() {
        assert!(is_loopback("lo"));
        assert!(is_loopback("lo0"));
        assert!(is_loopback("Loopback Pseudo-Interface 1"));
        assert!(!is_loopback("eth0"));
        assert!(!is_loopback("wlo1"));
    }

    #[test]
    fn host_source_reads_own_process() {
        let mut source = HostSource::new();
        let pids = source.process_ids().unwrap();
        let me = std::process::id();
        assert!(pids.contains(&me));
        assert!(!pids.contains(&0));
        let record = source.read_process(me).unwrap();
        assert_eq!(record.pid, me);
        assert!(record.memory_percent >= 0.0);
    }

    #[test]
    fn host_source_reports_memory() {
        let mut source = HostSource::new();
        let memory = source.memory().unwrap();
        assert!(memory.total > 0);
        assert!(memory.used_percent() <= 100.0);
    }
}
