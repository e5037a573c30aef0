//! Procsight: a live system-telemetry engine.
//!
//! Samples host gauges, cumulative I/O counters and the process list on a
//! fixed tick, and publishes rates, rolling history and the process table as
//! one snapshot per tick. This library exposes the core modules for use by
//! the binary and by tests.

pub mod collectors;
pub mod config;
pub mod controller;
pub mod engine;
pub mod model;
pub mod process_control;
pub mod rate;
pub mod series;

pub use collectors::{CounterSource, HostSource, ProcessReadError, SourceError};
pub use config::EngineConfig;
pub use engine::{Engine, EngineError};
pub use model::{Metric, ProcessRecord, Sample, Snapshot, SortColumn};
pub use process_control::{TerminateError, terminate};
