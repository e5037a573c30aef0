use std::time::Instant;

use serde::Serialize;

// --- Cumulative counters ---

/// Host-wide network byte counters at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkCounters {
    pub bytes_sent: u64,
    pub bytes_recv: u64,
    pub taken_at: Instant,
}

/// Host-wide disk byte counters at one instant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiskCounters {
    pub bytes_read: u64,
    pub bytes_written: u64,
    pub taken_at: Instant,
}

// --- Gauges ---

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct CpuGauges {
    pub usage_percent: f64,
    pub frequency_mhz: u64,
    pub physical_cores: usize,
    pub logical_cores: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MemoryGauges {
    pub total: u64,
    pub used: u64,
    pub available: u64,
    pub swap_total: u64,
    pub swap_used: u64,
}

impl MemoryGauges {
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.used as f64 / self.total as f64 * 100.0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiskSpaceInfo {
    pub mount_point: String,
    pub total_gb: f64,
    pub available_gb: f64,
    pub percent_free: f64,
    pub is_warning: bool,
}

/// Per-interval transfer rates in KB/s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Rates {
    pub net_up_kbps: f64,
    pub net_down_kbps: f64,
    pub disk_read_kbps: f64,
    pub disk_write_kbps: f64,
}
