//! Per-tick sampling: read, derive rates, record history, build the process
//! table, and assemble the snapshot.

pub mod process;

use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use chrono::Local;
use tracing::{debug, warn};

use crate::collectors::{CounterSource, SourceError};
use crate::config::EngineConfig;
use crate::model::{
    CpuGauges, DiskCounters, DiskSpaceInfo, MemoryGauges, Metric, NetworkCounters, Rates,
    Sample, Snapshot,
};
use crate::rate::{DiskRates, NetworkRates};
use crate::series::History;

pub use process::{build_process_table, sort_processes};

/// Gauges and counters read together at the top of a tick.
struct Reading {
    cpu: CpuGauges,
    memory: MemoryGauges,
    gpu_percent: f64,
    disk_space: Vec<DiskSpaceInfo>,
    network: NetworkCounters,
    disk: DiskCounters,
}

/// Owns the source, the rolling history and the last counter readings.
/// Ticks take `&mut self`, so two can never run at once.
pub struct Sampler<S> {
    source: Arc<Mutex<S>>,
    config: EngineConfig,
    history: History,
    last_network: Option<NetworkCounters>,
    last_disk: Option<DiskCounters>,
    tick: u64,
    skipped_ticks: u64,
    counter_anomalies: u64,
}

impl<S: CounterSource + 'static> Sampler<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        let history = History::new(config.history_capacity);
        Self {
            source: Arc::new(Mutex::new(source)),
            config,
            history,
            last_network: None,
            last_disk: None,
            tick: 0,
            skipped_ticks: 0,
            counter_anomalies: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn ticks(&self) -> u64 {
        self.tick
    }

    pub fn skipped_ticks(&self) -> u64 {
        self.skipped_ticks
    }

    /// Run `f` against the source on the blocking pool, bounded by the read
    /// timeout.
    ///
    /// A timed-out read keeps running on its blocking thread and keeps the
    /// source locked. Until it returns, later reads fail with
    /// `SourceError::Busy` instead of queueing behind it.
    async fn read<T, F>(&self, f: F) -> Result<T, SourceError>
    where
        T: Send + 'static,
        F: FnOnce(&mut S) -> Result<T, SourceError> + Send + 'static,
    {
        let source = Arc::clone(&self.source);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = match source.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::WouldBlock) => return Err(SourceError::Busy),
                // Sources keep no cross-call invariants; a poisoned lock is still usable.
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            };
            f(&mut *guard)
        });
        match tokio::time::timeout(self.config.read_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(SourceError::Task(join.to_string())),
            Err(_) => Err(SourceError::Timeout(self.config.read_timeout)),
        }
    }

    /// Take fresh baseline counters so the next tick has something to
    /// diff against.
    pub async fn prime(&mut self) -> Result<(), SourceError> {
        let (network, disk) = self
            .read(|s| Ok((s.network()?, s.disk()?)))
            .await?;
        self.last_network = Some(network);
        self.last_disk = Some(disk);
        debug!("baseline counters taken");
        Ok(())
    }

    /// One full sampling cycle. On a source failure nothing is mutated
    /// apart from the skipped-tick count.
    pub async fn tick(&mut self) -> Result<Arc<Snapshot>, SourceError> {
        let reading = self
            .read(|s| {
                let cpu = s.cpu()?;
                let memory = s.memory()?;
                let gpu_percent = s.gpu_percent();
                let disk_space = s.disk_space();
                let network = s.network()?;
                let disk = s.disk()?;
                Ok(Reading {
                    cpu,
                    memory,
                    gpu_percent,
                    disk_space,
                    network,
                    disk,
                })
            })
            .await;
        let reading = match reading {
            Ok(r) => r,
            Err(e) => {
                self.skipped_ticks += 1;
                return Err(e);
            }
        };

        let rates = self.derive_rates(&reading.network, &reading.disk);
        self.last_network = Some(reading.network);
        self.last_disk = Some(reading.disk);

        let memory_percent = reading.memory.used_percent();
        self.history.record(&[
            Sample::new(Metric::Cpu, reading.cpu.usage_percent),
            Sample::new(Metric::Memory, memory_percent),
            Sample::new(Metric::NetUp, rates.net_up_kbps),
            Sample::new(Metric::NetDown, rates.net_down_kbps),
            Sample::new(Metric::DiskRead, rates.disk_read_kbps),
            Sample::new(Metric::DiskWrite, rates.disk_write_kbps),
            Sample::new(Metric::Gpu, reading.gpu_percent),
        ]);

        let (processes, partial) = match self.read(process::build_process_table::<S>).await {
            Ok(records) => (records, false),
            Err(e) => {
                warn!(error = %e, "process list unavailable; publishing partial snapshot");
                (Vec::new(), true)
            }
        };

        self.tick += 1;
        debug!(
            tick = self.tick,
            processes = processes.len(),
            cpu = reading.cpu.usage_percent,
            "tick sampled"
        );

        Ok(Arc::new(Snapshot {
            tick: self.tick,
            time: Local::now().format("%H:%M:%S").to_string(),
            cpu: reading.cpu,
            memory: reading.memory,
            memory_percent,
            gpu_percent: reading.gpu_percent,
            rates,
            disk_space: reading.disk_space,
            history: self.history.to_map(),
            processes,
            partial,
            skipped_ticks: self.skipped_ticks,
            counter_anomalies: self.counter_anomalies,
        }))
    }

    fn derive_rates(&mut self, network: &NetworkCounters, disk: &DiskCounters) -> Rates {
        let nominal: Duration = self.config.tick_interval;

        let mut net = self
            .last_network
            .as_ref()
            .map(|prev| NetworkRates::between(prev, network, nominal))
            .unwrap_or(NetworkRates { up_kbps: 0.0, down_kbps: 0.0 });
        let mut io = self
            .last_disk
            .as_ref()
            .map(|prev| DiskRates::between(prev, disk, nominal))
            .unwrap_or(DiskRates { read_kbps: 0.0, write_kbps: 0.0 });

        if net.is_anomalous() {
            self.counter_anomalies += 1;
            warn!(up = net.up_kbps, down = net.down_kbps, "network counters went backwards");
            if self.config.clamp_negative_rates {
                net = net.clamped();
            }
        }
        if io.is_anomalous() {
            self.counter_anomalies += 1;
            warn!(read = io.read_kbps, write = io.write_kbps, "disk counters went backwards");
            if self.config.clamp_negative_rates {
                io = io.clamped();
            }
        }

        Rates {
            net_up_kbps: net.up_kbps,
            net_down_kbps: net.down_kbps,
            disk_read_kbps: io.read_kbps,
            disk_write_kbps: io.write_kbps,
        }
    }
}
