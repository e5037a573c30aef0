//! Bounded rolling history for the sampled metrics.

use std::collections::{BTreeMap, VecDeque};

use crate::model::{Metric, Sample};

pub const DEFAULT_CAPACITY: usize = 60;

/// Fixed-capacity FIFO of the last `capacity` values of one metric, oldest
/// first. Values are stored as given; NaN and negatives pass through.
#[derive(Clone, Debug)]
pub struct RollingSeries {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingSeries {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }
        if self.values.len() >= self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn values(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One `RollingSeries` per `Metric`.
#[derive(Clone, Debug)]
pub struct History {
    series: BTreeMap<Metric, RollingSeries>,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let series = Metric::ALL
            .iter()
            .map(|&m| (m, RollingSeries::new(capacity)))
            .collect();
        Self { series }
    }

    pub fn record(&mut self, samples: &[Sample]) {
        for sample in samples {
            if let Some(series) = self.series.get_mut(&sample.metric) {
                series.append(sample.value);
            }
        }
    }

    pub fn get(&self, metric: Metric) -> Option<&RollingSeries> {
        self.series.get(&metric)
    }

    /// Copy of every series, detached from the live buffers.
    pub fn to_map(&self) -> BTreeMap<Metric, Vec<f64>> {
        self.series
            .iter()
            .map(|(&m, s)| (m, s.values()))
            .collect()
    }
}
