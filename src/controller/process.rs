//! Per-tick process table construction and read-side sorting.

use std::cmp::Ordering;

use tracing::trace;

use crate::collectors::{CounterSource, ProcessReadError, SourceError};
use crate::model::{ProcessRecord, SortColumn};

/// Build this tick's process records in enumeration order.
///
/// Processes that exit, deny access or turn out to be zombies between
/// enumeration and read are left out. Only a failure to enumerate at all
/// is an error.
pub fn build_process_table<S: CounterSource + ?Sized>(
    source: &mut S,
) -> Result<Vec<ProcessRecord>, SourceError> {
    let pids = source.process_ids()?;
    let mut records = Vec::with_capacity(pids.len());

    // pid 0 is the kernel's idle/swapper entry on some platforms.
    for pid in pids.into_iter().filter(|&pid| pid != 0) {
        match source.read_process(pid) {
            Ok(record) => records.push(record),
            Err(
                e @ (ProcessReadError::NoSuchProcess { .. }
                | ProcessReadError::AccessDenied { .. }
                | ProcessReadError::Zombie { .. }),
            ) => {
                trace!(pid, error = %e, "skipping process");
            }
        }
    }

    Ok(records)
}

/// Sorted copy of `records`. Ties keep their original relative order.
pub fn sort_processes(
    records: &[ProcessRecord],
    column: SortColumn,
    descending: bool,
) -> Vec<ProcessRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(|a, b| {
        let ord = match column {
            SortColumn::Pid => a.pid.cmp(&b.pid),
            SortColumn::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            SortColumn::Cpu => a.cpu_percent.partial_cmp(&b.cpu_percent).unwrap_or(Ordering::Equal),
            SortColumn::Memory => a
                .memory_percent
                .partial_cmp(&b.memory_percent)
                .unwrap_or(Ordering::Equal),
        };
        if descending { ord.reverse() } else { ord }
    });
    sorted
}

#[cfg(test)]
mod tests {
    use crate::collectors::fake::{FakeProcess, FakeSource};
    use crate::model::SortColumn;

    use super::*;

    fn record(pid: u32, name: &str, cpu: f64, mem: f64) -> ProcessRecord {
        ProcessRecord {
            pid,
            name: name.into(),
            cpu_percent: cpu,
            memory_percent: mem,
        }
    }

    #[test]
    fn access_denied_process_is_dropped() {
        let mut source = FakeSource::new().with_processes(vec![
            FakeProcess::ok(record(10, "init", 0.1, 0.2)),
            FakeProcess::failing(11, ProcessReadError::AccessDenied { pid: 11 }),
            FakeProcess::ok(record(12, "bash", 1.5, 0.4)),
        ]);
        let table = build_process_table(&mut source).unwrap();
        let pids: Vec<u32> = table.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![10, 12]);
    }

    #[test]
    fn pid_zero_is_left_out() {
        let mut source = FakeSource::new().with_processes(vec![
            FakeProcess::ok(record(0, "kernel_task", 3.0, 0.1)),
            FakeProcess::ok(record(1, "launchd", 0.2, 0.1)),
        ]);
        let table = build_process_table(&mut source).unwrap();
        let pids: Vec<u32> = table.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![1]);
    }

    #[test]
    fn every_kind_of_read_failure_is_tolerated() {
        let mut source = FakeSource::new().with_processes(vec![
            FakeProcess::failing(1, ProcessReadError::NoSuchProcess { pid: 1 }),
            FakeProcess::failing(2, ProcessReadError::Zombie { pid: 2 }),
            FakeProcess::failing(3, ProcessReadError::AccessDenied { pid: 3 }),
        ]);
        assert!(build_process_table(&mut source).unwrap().is_empty());
    }

    #[test]
    fn enumeration_order_is_kept() {
        let mut source = FakeSource::new().with_processes(vec![
            FakeProcess::ok(record(30, "c", 0.0, 0.0)),
            FakeProcess::ok(record(10, "a", 0.0, 0.0)),
            FakeProcess::ok(record(20, "b", 0.0, 0.0)),
        ]);
        let pids: Vec<u32> = build_process_table(&mut source)
            .unwrap()
            .iter()
            .map(|p| p.pid)
            .collect();
        assert_eq!(pids, vec![30, 10, 20]);
    }

    #[test]
    fn enumeration_failure_is_an_error() {
        let mut source = FakeSource::new().failing_process_list();
        assert!(build_process_table(&mut source).is_err());
    }

    #[test]
    fn sort_by_cpu_descending() {
        let records = vec![
            record(1, "p1", 10.0, 0.0),
            record(2, "p2", 50.0, 0.0),
            record(3, "p3", 30.0, 0.0),
        ];
        let sorted = sort_processes(&records, SortColumn::Cpu, true);
        let names: Vec<&str> = sorted.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["p2", "p3", "p1"]);
        // original untouched
        assert_eq!(records[0].name, "p1");
    }

    #[test]
    fn sort_by_name_ignores_case() {
        let records = vec![
            record(1, "zsh", 0.0, 0.0),
            record(2, "Apache", 0.0, 0.0),
            record(3, "bash", 0.0, 0.0),
        ];
        let sorted = sort_processes(&records, SortColumn::Name, false);
        let pids: Vec<u32> = sorted.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![2, 3, 1]);
    }

    #[test]
    fn sort_by_pid_and_memory() {
        let records = vec![record(9, "a", 0.0, 1.0), record(4, "b", 0.0, 3.0)];
        assert_eq!(sort_processes(&records, SortColumn::Pid, false)[0].pid, 4);
        assert_eq!(sort_processes(&records, SortColumn::Memory, true)[0].pid, 4);
    }
}
