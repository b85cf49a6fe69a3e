//! Auto-scaling supervisor: the background monitor that migrates a logger's
//! write path between a single shared ring and a sharded set of rings.
//!
//! Runs on its own thread, polling dispatcher/ring statistics once per
//! `window`, and swaps [`Topology`](crate::dispatcher::Topology) only once a
//! threshold has been sustained for `sustained_windows` consecutive windows
//! and `cooldown` has elapsed since the last transition. This hysteresis is
//! what keeps a logger from thrashing back and forth across a noisy
//! threshold crossing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::dispatcher::{Dispatcher, Topology};
use crate::diagnostics;
use crate::ring::{BackpressurePolicy, Ring};

/// Hysteresis thresholds and timing for scale transitions.
#[derive(Debug, Clone)]
pub struct ScalingThresholds {
    /// Writes/sec above which a window counts toward scaling up.
    pub write_rate_up: f64,
    /// Contention ratio (dropped+retried / claimed) above which a window
    /// counts toward scaling up.
    pub contention_up: f64,
    /// Writes/sec below which a window counts toward scaling down.
    pub write_rate_down: f64,
    /// Contention ratio below which a window counts toward scaling down.
    pub contention_down: f64,
    /// Consecutive windows a condition must hold before acting on it.
    pub sustained_windows: u32,
    /// Minimum time between transitions, regardless of sustained windows.
    pub cooldown: Duration,
    /// Poll interval.
    pub window: Duration,
    /// Shard count to scale up to.
    pub num_shards: usize,
}

impl Default for ScalingThresholds {
    fn default() -> Self {
        Self {
            write_rate_up: 200_000.0,
            contention_up: 0.05,
            write_rate_down: 20_000.0,
            contention_down: 0.01,
            sustained_windows: 3,
            cooldown: Duration::from_secs(10),
            window: Duration::from_millis(500),
            num_shards: 4,
        }
    }
}

struct WindowSample {
    writer_cursor: u64,
    dropped: u64,
    retried: u64,
}

fn sample_topology<T>(topology: &Topology<T>) -> WindowSample {
    let mut writer_cursor = 0;
    let mut dropped = 0;
    let mut retried = 0;
    let rings: Vec<&Arc<Ring<T>>> = match topology {
        Topology::Single(r) => vec![r],
        Topology::Sharded(rings) => rings.iter().collect(),
    };
    for ring in rings {
        let stats = ring.stats();
        writer_cursor += stats.writer_cursor;
        dropped += stats.dropped;
        retried += stats.retried;
    }
    WindowSample { writer_cursor, dropped, retried }
}

/// Monitors write rate and contention and swaps the dispatcher's topology
/// when sustained thresholds call for it.
pub struct AutoScalingSupervisor<T> {
    dispatcher: Arc<Dispatcher<T>>,
    thresholds: ScalingThresholds,
    shutdown: Arc<AtomicBool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Default + Send + Sync + 'static> AutoScalingSupervisor<T> {
    pub fn new(dispatcher: Arc<Dispatcher<T>>, thresholds: ScalingThresholds) -> Self {
        Self {
            dispatcher,
            thresholds,
            shutdown: Arc::new(AtomicBool::new(false)),
            handle: std::sync::Mutex::new(None),
        }
    }

    /// Launches the monitoring thread, and a factory for producing each
    /// shard's ring when scaling up (capacity/batch size/policy mirror
    /// whatever the active single ring was built with).
    pub fn start<F>(&self, new_ring: F)
    where
        F: Fn() -> Ring<T> + Send + 'static,
    {
        let mut guard = self.handle.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        let shutdown = Arc::clone(&self.shutdown);
        let thresholds = self.thresholds.clone();
        *guard = Some(std::thread::spawn(move || {
            let mut up_streak = 0u32;
            let mut down_streak = 0u32;
            let mut last_transition = Instant::now() - thresholds.cooldown;
            let mut previous = sample_topology(&*dispatcher.snapshot());

            while !shutdown.load(Ordering::Relaxed) {
                std::thread::sleep(thresholds.window);
                dispatcher.reap_retiring();

                let topology = dispatcher.snapshot();
                let current = sample_topology(&*topology);
                let elapsed = thresholds.window.as_secs_f64().max(1e-9);

                let claimed_delta = current.writer_cursor.saturating_sub(previous.writer_cursor);
                let write_rate = claimed_delta as f64 / elapsed;
                let failed_delta = (current.dropped + current.retried)
                    .saturating_sub(previous.dropped + previous.retried);
                let contention = if claimed_delta == 0 {
                    0.0
                } else {
                    failed_delta as f64 / claimed_delta as f64
                };
                previous = current;

                let sharded = matches!(&*topology, Topology::Sharded(_));
                let in_cooldown = last_transition.elapsed() < thresholds.cooldown;

                if !sharded
                    && write_rate >= thresholds.write_rate_up
                    && contention >= thresholds.contention_up
                {
                    up_streak += 1;
                    down_streak = 0;
                } else if sharded
                    && write_rate <= thresholds.write_rate_down
                    && contention <= thresholds.contention_down
                {
                    down_streak += 1;
                    up_streak = 0;
                } else {
                    up_streak = 0;
                    down_streak = 0;
                }

                if !sharded && up_streak >= thresholds.sustained_windows && !in_cooldown {
                    let shards: Vec<Arc<Ring<T>>> =
                        (0..thresholds.num_shards).map(|_| Arc::new(new_ring())).collect();
                    dispatcher.swap(Topology::Sharded(shards));
                    diagnostics::record_scale_up(thresholds.num_shards);
                    last_transition = Instant::now();
                    up_streak = 0;
                } else if sharded && down_streak >= thresholds.sustained_windows && !in_cooldown {
                    dispatcher.swap(Topology::Single(Arc::new(new_ring())));
                    diagnostics::record_scale_down();
                    last_transition = Instant::now();
                    down_streak = 0;
                }
            }
        }));
    }

    pub fn stop_and_join(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.lock().unwrap().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Slot(u64);

    fn make_ring() -> Ring<Slot> {
        Ring::new(64, 16, BackpressurePolicy::DropOnFull).unwrap()
    }

    #[test]
    fn scales_up_under_sustained_contention() {
        let ring = Arc::new(make_ring());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ring)));
        let thresholds = ScalingThresholds {
            window: Duration::from_millis(20),
            sustained_windows: 2,
            cooldown: Duration::from_millis(1),
            contention_up: 0.0,
            write_rate_up: 1.0,
            num_shards: 2,
            ..ScalingThresholds::default()
        };
        let supervisor = AutoScalingSupervisor::new(Arc::clone(&dispatcher), thresholds);
        supervisor.start(make_ring);

        // keep writing so write_rate stays above threshold across windows
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            dispatcher.write(|s| s.0 += 1);
            if matches!(&*dispatcher.snapshot(), Topology::Sharded(_)) {
                break;
            }
            assert!(Instant::now() < deadline, "supervisor never scaled up");
            std::thread::sleep(Duration::from_millis(1));
        }

        supervisor.stop_and_join();
        assert!(!supervisor.is_running());
    }

    #[test]
    fn does_not_scale_up_unless_every_threshold_is_crossed() {
        let ring = Arc::new(make_ring());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ring)));
        let thresholds = ScalingThresholds {
            window: Duration::from_millis(20),
            sustained_windows: 2,
            cooldown: Duration::from_millis(1),
            // write rate will clear this easily, but contention never will
            // (nothing here ever fills the ring), so scale-up must not fire
            // even though the write-rate half of the conjunction holds.
            write_rate_up: 1.0,
            contention_up: 0.9,
            num_shards: 2,
            ..ScalingThresholds::default()
        };
        let supervisor = AutoScalingSupervisor::new(Arc::clone(&dispatcher), thresholds);
        supervisor.start(make_ring);

        for _ in 0..50 {
            dispatcher.write(|s| s.0 += 1);
            std::thread::sleep(Duration::from_millis(5));
        }

        assert!(matches!(&*dispatcher.snapshot(), Topology::Single(_)));
        supervisor.stop_and_join();
    }
}
