use std::fmt;

use serde::Serialize;

/// The scalar metrics that get a rolling history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Cpu,
    Memory,
    DiskRead,
    DiskWrite,
    NetUp,
    NetDown,
    Gpu,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::Cpu,
        Metric::Memory,
        Metric::DiskRead,
        Metric::DiskWrite,
        Metric::NetUp,
        Metric::NetDown,
        Metric::Gpu,
    ];

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Cpu | Metric::Memory | Metric::Gpu => "%",
            Metric::DiskRead | Metric::DiskWrite | Metric::NetUp | Metric::NetDown => "KB/s",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "mem",
            Metric::DiskRead => "disk-read",
            Metric::DiskWrite => "disk-write",
            Metric::NetUp => "net-up",
            Metric::NetDown => "net-down",
            Metric::Gpu => "gpu",
        };
        f.write_str(label)
    }
}

/// One value for one metric, produced once per tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub metric: Metric,
    pub value: f64,
}

impl Sample {
    pub fn new(metric: Metric, value: f64) -> Self {
        Self { metric, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rates_are_kb_per_second_and_gauges_percent() {
        assert_eq!(Metric::NetUp.unit(), "KB/s");
        assert_eq!(Metric::DiskWrite.unit(), "KB/s");
        assert_eq!(Metric::Cpu.unit(), "%");
        assert_eq!(Metric::Gpu.unit(), "%");
    }
}
