//! The drainer: the single dedicated consumer thread per logger.
//!
//! A long-running OS thread that repeatedly drains whatever rings the
//! dispatcher currently considers live (the active topology plus anything
//! still being quiesced out of a topology transition), applying a
//! processor callback to every delivered record, and falling back to the
//! configured [`IdleStrategy`] whenever a pass finds nothing to do.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::dispatcher::Dispatcher;
use crate::idle::IdleStrategy;

/// Consecutive empty drain passes required after a shutdown signal before
/// the drainer considers itself done, tolerating in-flight publications
/// from producers that raced with `close`.
const TERMINAL_DRAIN_QUIET_PASSES: u32 = 3;
const TERMINAL_DRAIN_SLEEP: Duration = Duration::from_millis(5);

pub struct Drainer<T> {
    dispatcher: Arc<Dispatcher<T>>,
    shutdown: Arc<AtomicBool>,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl<T: Default + Send + 'static> Drainer<T> {
    pub fn new(dispatcher: Arc<Dispatcher<T>>) -> Self {
        Self { dispatcher, shutdown: Arc::new(AtomicBool::new(false)), handle: std::sync::Mutex::new(None) }
    }

    /// Launches the consumer thread. A second call is a no-op.
    pub fn start<F>(&self, idle: Box<dyn IdleStrategy>, mut processor: F)
    where
        F: FnMut(&mut T) + Send + 'static,
    {
        let mut guard = self.handle.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let dispatcher = Arc::clone(&self.dispatcher);
        let shutdown = Arc::clone(&self.shutdown);
        *guard = Some(std::thread::spawn(move || {
            let mut quiet_passes = 0u32;
            loop {
                dispatcher.reap_retiring();
                let targets = dispatcher.drain_targets();
                let mut total = 0usize;
                for ring in &targets {
                    total += ring.process_batch(|record| processor(record));
                }

                if total > 0 {
                    idle.reset();
                    quiet_passes = 0;
                    continue;
                }

                if shutdown.load(Ordering::SeqCst) {
                    quiet_passes += 1;
                    if quiet_passes >= TERMINAL_DRAIN_QUIET_PASSES {
                        break;
                    }
                    std::thread::sleep(TERMINAL_DRAIN_SLEEP);
                    continue;
                }

                if !idle.idle() {
                    break;
                }
            }
        }));
    }

    /// Signals the drainer to perform its terminal drain and exit, then
    /// blocks until the thread has joined.
    pub fn stop_and_join(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
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
    use crate::idle;
    use crate::ring::{BackpressurePolicy, Ring};
    use std::sync::atomic::AtomicU64;

    #[derive(Default)]
    struct Counter(u64);

    #[test]
    fn drains_records_until_closed() {
        let ring = Arc::new(Ring::<Counter>::new(8, 4, BackpressurePolicy::DropOnFull).unwrap());
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&ring)));
        let drainer = Drainer::new(Arc::clone(&dispatcher));

        let total = Arc::new(AtomicU64::new(0));
        let total_in_thread = Arc::clone(&total);
        drainer.start(idle::build(idle::IdleStrategyKind::Yielding), move |c: &mut Counter| {
            total_in_thread.fetch_add(c.0, Ordering::Relaxed);
        });

        for i in 1..=10u64 {
            assert!(dispatcher.write(|c| c.0 = i));
        }

        ring.close();
        drainer.stop_and_join();

        assert_eq!(total.load(Ordering::Relaxed), (1..=10).sum::<u64>());
        assert!(!drainer.is_running());
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let ring = Arc::new(Ring::<Counter>::new(4, 4, BackpressurePolicy::DropOnFull).unwrap());
        let dispatcher = Arc::new(Dispatcher::new(ring));
        let drainer = Drainer::new(dispatcher);
        drainer.start(idle::build(idle::IdleStrategyKind::Spinning), |_| {});
        drainer.start(idle::build(idle::IdleStrategyKind::Spinning), |_| {});
        drainer.stop_and_join();
    }
}
