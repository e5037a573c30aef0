//! Start/stop lifecycle around the sampler and snapshot publication.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{info, warn};

use crate::collectors::{CounterSource, SourceError};
use crate::config::{ConfigError, EngineConfig};
use crate::controller::Sampler;
use crate::model::Snapshot;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("could not take baseline counters: {0}")]
    Baseline(#[source] SourceError),

    #[error("sampling task failed: {0}")]
    Join(String),

    #[error("sampler was lost after a failed run")]
    SamplerLost,
}

type Callback = Box<dyn Fn(&Snapshot) + Send + Sync>;

/// Fans each snapshot out to callbacks and to the latest-wins watch channel.
struct Publisher {
    latest: watch::Sender<Option<Arc<Snapshot>>>,
    callbacks: Mutex<Vec<Callback>>,
}

impl Publisher {
    fn publish(&self, snapshot: Arc<Snapshot>) {
        {
            let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
            for callback in callbacks.iter() {
                // A failing consumer must not take the sampling task down with it.
                if panic::catch_unwind(AssertUnwindSafe(|| callback(&snapshot))).is_err() {
                    warn!(tick = snapshot.tick, "snapshot callback panicked");
                }
            }
        }
        self.latest.send_replace(Some(snapshot));
    }
}

enum State<S> {
    Idle(Sampler<S>),
    Running {
        stop: Arc<Notify>,
        task: JoinHandle<Sampler<S>>,
    },
    Lost,
}

/// The telemetry engine: Idle until `start`, Running until `stop`.
/// History survives a stop/start cycle; counter baselines do not.
pub struct Engine<S> {
    state: State<S>,
    publisher: Arc<Publisher>,
    config: EngineConfig,
}

impl<S: CounterSource + 'static> Engine<S> {
    pub fn new(source: S, config: EngineConfig) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            state: State::Idle(Sampler::new(source, config.clone())),
            publisher: Arc::new(Publisher {
                latest,
                callbacks: Mutex::new(Vec::new()),
            }),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, State::Running { .. })
    }

    /// Receiver that always holds the most recent snapshot. Slow readers
    /// skip intermediate ticks but never see them out of order.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.publisher.latest.subscribe()
    }

    /// Register a callback run on the sampling task after every tick.
    /// It must return quickly: the next tick waits for it.
    pub fn on_snapshot(&self, callback: impl Fn(&Snapshot) + Send + Sync + 'static) {
        self.publisher
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(callback));
    }

    pub fn latest(&self) -> Option<Arc<Snapshot>> {
        self.publisher.latest.borrow().clone()
    }

    pub async fn start(&mut self) -> Result<(), EngineError> {
        self.config.validate()?;

        let mut sampler = match mem::replace(&mut self.state, State::Lost) {
            State::Idle(sampler) => sampler,
            State::Lost => return Err(EngineError::SamplerLost),
            running => {
                self.state = running;
                return Err(EngineError::AlreadyRunning);
            }
        };

        if let Err(e) = sampler.prime().await {
            self.state = State::Idle(sampler);
            return Err(EngineError::Baseline(e));
        }

        let stop = Arc::new(Notify::new());
        let task = tokio::spawn(run(sampler, Arc::clone(&self.publisher), Arc::clone(&stop)));
        self.state = State::Running { stop, task };
        info!(
            interval_ms = self.config.tick_interval.as_millis() as u64,
            capacity = self.config.history_capacity,
            "sampling started"
        );
        Ok(())
    }

    /// Ask the loop to stop at the next tick boundary and wait for it.
    pub async fn stop(&mut self) -> Result<(), EngineError> {
        match mem::replace(&mut self.state, State::Lost) {
            State::Running { stop, task } => {
                stop.notify_one();
                match task.await {
                    Ok(sampler) => {
                        info!(ticks = sampler.ticks(), "sampling stopped");
                        self.state = State::Idle(sampler);
                        Ok(())
                    }
                    Err(e) => Err(EngineError::Join(e.to_string())),
                }
            }
            other => {
                self.state = other;
                Err(EngineError::NotRunning)
            }
        }
    }
}

impl<S> Drop for Engine<S> {
    fn drop(&mut self) {
        if let State::Running { task, .. } = &self.state {
            task.abort();
        }
    }
}

/// The tick loop. Each tick is awaited to completion, publish included,
/// before the next period is waited for; late ticks push the schedule back
/// instead of bunching up.
async fn run<S: CounterSource + 'static>(
    mut sampler: Sampler<S>,
    publisher: Arc<Publisher>,
    stop: Arc<Notify>,
) -> Sampler<S> {
    let mut ticker = interval(sampler.config().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick of an interval fires immediately; the first sample is
    // due one period after the baseline.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = stop.notified() => break,
            _ = ticker.tick() => {}
        }

        match sampler.tick().await {
            Ok(snapshot) => publisher.publish(snapshot),
            Err(e) => warn!(error = %e, skipped = sampler.skipped_ticks(), "tick skipped"),
        }
    }

    sampler
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::collectors::fake::{EventLog, FakeSource};
    use crate::model::Metric;

    use super::*;

    fn fast() -> EngineConfig {
        EngineConfig {
            tick_interval: Duration::from_millis(10),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let mut engine = Engine::new(FakeSource::new(), fast());
        engine.start().await.unwrap();
        assert!(matches!(engine.start().await, Err(EngineError::AlreadyRunning)));
        engine.stop().await.unwrap();
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn stop_when_idle_is_rejected() {
        let mut engine = Engine::new(FakeSource::new(), fast());
        assert!(matches!(engine.stop().await, Err(EngineError::NotRunning)));
    }

    #[tokio::test]
    async fn zero_interval_is_refused() {
        let config = EngineConfig {
            tick_interval: Duration::ZERO,
            ..Default::default()
        };
        let mut engine = Engine::new(FakeSource::new(), config);
        assert!(matches!(engine.start().await, Err(EngineError::Config(_))));
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn subscribers_see_increasing_ticks() {
        let mut engine = Engine::new(FakeSource::new(), fast());
        let mut rx = engine.subscribe();
        engine.start().await.unwrap();

        let mut seen = Vec::new();
        while seen.len() < 3 {
            rx.changed().await.unwrap();
            if let Some(snap) = rx.borrow_and_update().clone() {
                seen.push(snap.tick);
            }
        }
        engine.stop().await.unwrap();

        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{seen:?}");
    }

    #[tokio::test]
    async fn history_survives_restart() {
        let config = EngineConfig {
            history_capacity: 10_000,
            ..fast()
        };
        let mut engine = Engine::new(FakeSource::new(), config);
        let ticks = Arc::new(Mutex::new(0u64));
        let counter = Arc::clone(&ticks);
        engine.on_snapshot(move |_| *counter.lock().unwrap() += 1);

        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;
        engine.stop().await.unwrap();
        let before = engine.latest().unwrap().series(Metric::Cpu).len();
        assert!(before >= 1);

        engine.start().await.unwrap();
        let mut rx = engine.subscribe();
        rx.borrow_and_update();
        rx.changed().await.unwrap();
        engine.stop().await.unwrap();

        let after = engine.latest().unwrap().series(Metric::Cpu).len();
        assert!(after > before, "before {before}, after {after}");
        assert_eq!(*ticks.lock().unwrap() as usize, after);
    }

    async fn wait_for_tick(rx: &mut watch::Receiver<Option<Arc<Snapshot>>>, tick: u64) {
        loop {
            if rx.borrow_and_update().as_ref().is_some_and(|s| s.tick >= tick) {
                return;
            }
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn restart_rates_use_the_new_baseline() {
        // prime, tick 1 | stop | prime, tick 2
        let source = FakeSource::new().with_bytes_sent(vec![0, 1024, 1_024_000, 1_026_048]);
        let config = EngineConfig {
            tick_interval: Duration::from_millis(100),
            ..Default::default()
        };
        let mut engine = Engine::new(source, config);
        let mut rx = engine.subscribe();

        engine.start().await.unwrap();
        wait_for_tick(&mut rx, 1).await;
        engine.stop().await.unwrap();
        assert_eq!(engine.latest().unwrap().rates.net_up_kbps, 1.0);

        engine.start().await.unwrap();
        wait_for_tick(&mut rx, 2).await;
        engine.stop().await.unwrap();

        let snap = engine.latest().unwrap();
        assert_eq!(snap.tick, 2);
        assert_eq!(snap.rates.net_up_kbps, 2.0);
        assert_eq!(snap.series(Metric::NetUp), &[1.0, 2.0]);
    }

    #[tokio::test]
    async fn stop_lets_the_running_tick_finish() {
        let events: EventLog = Arc::new(Mutex::new(Vec::new()));
        let source = FakeSource::new()
            .with_read_delay(Duration::from_millis(150))
            .with_event_log(Arc::clone(&events));
        let mut engine = Engine::new(source, fast());
        let log = Arc::clone(&events);
        engine.on_snapshot(move |snap| log.lock().unwrap().push(format!("publish {}", snap.tick)));

        engine.start().await.unwrap();
        while events.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        engine.stop().await.unwrap();

        assert_eq!(engine.latest().unwrap().tick, 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*events.lock().unwrap(), vec!["read-start 0", "publish 1"]);
    }

    #[tokio::test]
    async fn panicking_callback_leaves_engine_usable() {
        let mut engine = Engine::new(FakeSource::new(), fast());
        engine.on_snapshot(|_| panic!("consumer bug"));
        let mut rx = engine.subscribe();

        engine.start().await.unwrap();
        wait_for_tick(&mut rx, 2).await;
        engine.stop().await.unwrap();
        assert!(!engine.is_running());

        engine.start().await.unwrap();
        wait_for_tick(&mut rx, 3).await;
        engine.stop().await.unwrap();
        assert!(engine.latest().unwrap().series(Metric::Cpu).len() >= 3);
    }
}
