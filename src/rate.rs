//! Counter deltas to KB/s.
//!
//! Counters are only expected to grow. A reset or wrap shows up as a
//! negative rate; it is reported as-is and never corrected here.

use std::time::Duration;

use crate::model::{DiskCounters, NetworkCounters};

const BYTES_PER_KB: f64 = 1024.0;

/// `(current - previous) / 1024 / interval_secs`.
pub fn rate(previous: u64, current: u64, interval_secs: f64) -> f64 {
    // Subtract in integers first: counters past 2^53 lose their low bits as f64.
    let delta = i128::from(current) - i128::from(previous);
    delta as f64 / BYTES_PER_KB / interval_secs
}

/// Seconds between two readings, falling back to `nominal` when the clock
/// did not move forward.
fn interval_secs(elapsed: Option<Duration>, nominal: Duration) -> f64 {
    match elapsed {
        Some(d) if !d.is_zero() => d.as_secs_f64(),
        _ => nominal.as_secs_f64(),
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkRates {
    pub up_kbps: f64,
    pub down_kbps: f64,
}

impl NetworkRates {
    pub fn between(previous: &NetworkCounters, current: &NetworkCounters, nominal: Duration) -> Self {
        let secs = interval_secs(current.taken_at.checked_duration_since(previous.taken_at), nominal);
        Self {
            up_kbps: rate(previous.bytes_sent, current.bytes_sent, secs),
            down_kbps: rate(previous.bytes_recv, current.bytes_recv, secs),
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.up_kbps < 0.0 || self.down_kbps < 0.0
    }

    pub fn clamped(self) -> Self {
        Self {
            up_kbps: self.up_kbps.max(0.0),
            down_kbps: self.down_kbps.max(0.0),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiskRates {
    pub read_kbps: f64,
    pub write_kbps: f64,
}

impl DiskRates {
    pub fn between(previous: &DiskCounters, current: &DiskCounters, nominal: Duration) -> Self {
        let secs = interval_secs(current.taken_at.checked_duration_since(previous.taken_at), nominal);
        Self {
            read_kbps: rate(previous.bytes_read, current.bytes_read, secs),
            write_kbps: rate(previous.bytes_written, current.bytes_written, secs),
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.read_kbps < 0.0 || self.write_kbps < 0.0
    }

    pub fn clamped(self) -> Self {
        Self {
            read_kbps: self.read_kbps.max(0.0),
            write_kbps: self.write_kbps.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[test]
    fn identical_counters_give_zero() {
        assert_eq!(rate(5000, 5000, 1.0), 0.0);
        assert_eq!(rate(5000, 5000, 0.25), 0.0);
    }

    #[test]
    fn delta_is_divided_by_kb_and_interval() {
        assert_eq!(rate(1000, 2024, 1.0), 1.0);
        assert_eq!(rate(0, 4096, 2.0), 2.0);
    }

    #[test]
    fn counter_reset_yields_negative_rate() {
        assert_eq!(rate(2048, 0, 1.0), -2.0);
        assert_eq!(rate(u64::MAX, 0, 1.0), -(u64::MAX as f64) / 1024.0);
    }

    #[test]
    fn large_counters_keep_small_deltas() {
        let base = 1u64 << 53;
        assert_eq!(rate(base, base + 1, 1.0), 1.0 / 1024.0);
        assert_eq!(rate(u64::MAX - 2048, u64::MAX, 1.0), 2.0);
    }

    #[test]
    fn network_rates_use_elapsed_between_readings() {
        let t0 = Instant::now();
        let prev = NetworkCounters { bytes_sent: 1000, bytes_recv: 0, taken_at: t0 };
        let cur = NetworkCounters {
            bytes_sent: 2024,
            bytes_recv: 2048,
            taken_at: t0 + Duration::from_secs(1),
        };
        let rates = NetworkRates::between(&prev, &cur, Duration::from_secs(5));
        assert_eq!(rates.up_kbps, 1.0);
        assert_eq!(rates.down_kbps, 2.0);
        assert!(!rates.is_anomalous());
    }

    #[test]
    fn zero_elapsed_falls_back_to_nominal_interval() {
        let t0 = Instant::now();
        let prev = DiskCounters { bytes_read: 0, bytes_written: 0, taken_at: t0 };
        let cur = DiskCounters { bytes_read: 2048, bytes_written: 1024, taken_at: t0 };
        let rates = DiskRates::between(&prev, &cur, Duration::from_secs(2));
        assert_eq!(rates.read_kbps, 1.0);
        assert_eq!(rates.write_kbps, 0.5);
    }

    #[test]
    fn clamping_only_touches_negatives() {
        let rates = DiskRates { read_kbps: -4.0, write_kbps: 3.0 };
        assert!(rates.is_anomalous());
        assert_eq!(rates.clamped(), DiskRates { read_kbps: 0.0, write_kbps: 3.0 });
    }
}
