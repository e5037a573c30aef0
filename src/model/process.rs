use serde::Serialize;

/// One row of the process table for a single tick.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String, // empty when the OS would not tell us
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

impl ProcessRecord {
    pub fn cpu_label(&self) -> String {
        format!("{:.1}", self.cpu_percent)
    }

    pub fn memory_label(&self) -> String {
        format!("{:.1}", self.memory_percent)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum SortColumn {
    Pid,
    Name,
    #[default]
    Cpu,
    Memory,
}
