//! The drainer's idle-wait discipline.
//!
//! Mirrors the wait-strategy family of the disruptor core this engine grew
//! out of, but speaks the consumer's vocabulary directly: `idle()` is called
//! whenever a drain pass finds nothing to do and returns whether the drainer
//! should keep consuming; `reset()` is called right after a non-empty batch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// A pluggable wait policy for the single consumer thread.
///
/// Implementations must be safe to drive from one thread only (the
/// drainer); `reset()`/`idle()` are never called concurrently with
/// themselves or each other.
pub trait IdleStrategy: Send + Sync {
    /// Called when the last drain pass produced no work. Returns `true` to
    /// keep consuming, `false` to stop (only `Channel`'s shutdown wake uses
    /// `false`; the rest always return `true`).
    fn idle(&self) -> bool;

    /// Called after a drain pass that produced at least one record.
    fn reset(&self);

    /// Wakes a thread blocked in `idle()`. No-op for spin-based strategies.
    fn signal(&self) {}
}

/// Tight loop, no yield. Lowest latency, highest CPU.
#[derive(Default)]
pub struct Spinning;

impl IdleStrategy for Spinning {
    #[inline]
    fn idle(&self) -> bool {
        std::hint::spin_loop();
        true
    }

    fn reset(&self) {}
}

/// Spin for a bounded number of iterations, then sleep for a fixed duration.
pub struct Sleeping {
    spin_tries: u32,
    sleep_duration: Duration,
    counter: std::cell::Cell<u32>,
}

impl Sleeping {
    pub fn new(spin_tries: u32, sleep_duration: Duration) -> Self {
        Self { spin_tries, sleep_duration, counter: std::cell::Cell::new(0) }
    }
}

impl Default for Sleeping {
    fn default() -> Self {
        Self::new(100, Duration::from_millis(1))
    }
}

impl IdleStrategy for Sleeping {
    fn idle(&self) -> bool {
        let n = self.counter.get();
        if n < self.spin_tries {
            std::hint::spin_loop();
            self.counter.set(n + 1);
        } else {
            std::thread::sleep(self.sleep_duration);
        }
        true
    }

    fn reset(&self) {
        self.counter.set(0);
    }
}

/// Spin, then yield the scheduler every `yield_every` idle calls.
pub struct Yielding {
    spin_tries: u32,
    yield_every: u32,
    counter: std::cell::Cell<u32>,
}

impl Yielding {
    pub fn new(spin_tries: u32, yield_every: u32) -> Self {
        Self { spin_tries, yield_every: yield_every.max(1), counter: std::cell::Cell::new(0) }
    }
}

impl Default for Yielding {
    fn default() -> Self {
        Self::new(50, 1)
    }
}

impl IdleStrategy for Yielding {
    fn idle(&self) -> bool {
        let n = self.counter.get();
        self.counter.set(n + 1);
        if n < self.spin_tries {
            std::hint::spin_loop();
        } else if (n - self.spin_tries) % self.yield_every == 0 {
            std::thread::yield_now();
        } else {
            std::hint::spin_loop();
        }
        true
    }

    fn reset(&self) {
        self.counter.set(0);
    }
}

/// Blocks on a condvar until `reset()` (or another thread's `signal()`)
/// wakes it, optionally with a timeout so shutdown checks still run.
pub struct Channel {
    pair: Arc<(Mutex<bool>, Condvar)>,
    timeout: Option<Duration>,
}

impl Channel {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { pair: Arc::new((Mutex::new(false), Condvar::new())), timeout }
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::new(Some(Duration::from_millis(50)))
    }
}

impl IdleStrategy for Channel {
    fn idle(&self) -> bool {
        let (lock, cvar) = &*self.pair;
        let mut woken = lock.lock();
        if *woken {
            *woken = false;
            return true;
        }
        match self.timeout {
            Some(d) => {
                cvar.wait_for(&mut woken, d);
            }
            None => cvar.wait(&mut woken),
        }
        *woken = false;
        true
    }

    fn reset(&self) {}

    fn signal(&self) {
        let (lock, cvar) = &*self.pair;
        *lock.lock() = true;
        cvar.notify_one();
    }
}

/// Hot spin, then occasional yields, then progressively longer sleeps up to
/// a cap; resets to the hot-spin phase as soon as work shows up again. The
/// default strategy: adaptive CPU/latency tradeoff with no tuning required.
pub struct Progressive {
    spin_tries: u32,
    yield_tries: u32,
    max_sleep: Duration,
    counter: std::cell::Cell<u32>,
    current_sleep: std::cell::Cell<Duration>,
    stopped: AtomicBool,
}

impl Progressive {
    pub fn new(spin_tries: u32, yield_tries: u32, max_sleep: Duration) -> Self {
        Self {
            spin_tries,
            yield_tries,
            max_sleep,
            counter: std::cell::Cell::new(0),
            current_sleep: std::cell::Cell::new(Duration::from_micros(50)),
            stopped: AtomicBool::new(false),
        }
    }
}

impl Default for Progressive {
    fn default() -> Self {
        Self::new(1_000, 200, Duration::from_millis(10))
    }
}

impl IdleStrategy for Progressive {
    fn idle(&self) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        let n = self.counter.get();
        self.counter.set(n.saturating_add(1));

        if n < self.spin_tries {
            std::hint::spin_loop();
        } else if n < self.spin_tries + self.yield_tries {
            std::thread::yield_now();
        } else {
            let sleep = self.current_sleep.get();
            std::thread::sleep(sleep);
            let next = (sleep * 2).min(self.max_sleep);
            self.current_sleep.set(next);
        }
        true
    }

    fn reset(&self) {
        self.counter.set(0);
        self.current_sleep.set(Duration::from_micros(50));
    }
}

/// Which [`IdleStrategy`] to build, plus its tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleStrategyKind {
    Spinning,
    Sleeping,
    Yielding,
    Channel,
    Progressive,
}

impl IdleStrategyKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "spinning" | "spin" => Some(Self::Spinning),
            "sleeping" | "sleep" => Some(Self::Sleeping),
            "yielding" | "yield" => Some(Self::Yielding),
            "channel" | "signal" => Some(Self::Channel),
            "progressive" => Some(Self::Progressive),
            _ => None,
        }
    }
}

/// Builds a boxed [`IdleStrategy`] from a [`IdleStrategyKind`].
pub fn build(kind: IdleStrategyKind) -> Box<dyn IdleStrategy> {
    match kind {
        IdleStrategyKind::Spinning => Box::new(Spinning),
        IdleStrategyKind::Sleeping => Box::new(Sleeping::default()),
        IdleStrategyKind::Yielding => Box::new(Yielding::default()),
        IdleStrategyKind::Channel => Box::new(Channel::default()),
        IdleStrategyKind::Progressive => Box::new(Progressive::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinning_always_continues() {
        let s = Spinning;
        assert!(s.idle());
        s.reset();
    }

    #[test]
    fn sleeping_transitions_from_spin_to_sleep() {
        let s = Sleeping::new(2, Duration::from_micros(1));
        assert!(s.idle());
        assert!(s.idle());
        assert!(s.idle()); // now sleeping
        s.reset();
    }

    #[test]
    fn yielding_respects_spin_tries() {
        let s = Yielding::new(3, 1);
        for _ in 0..3 {
            assert!(s.idle());
        }
        assert!(s.idle());
    }

    #[test]
    fn channel_wakes_on_signal() {
        let c = Arc::new(Channel::new(Some(Duration::from_secs(5))));
        let waiter = Arc::clone(&c);
        let handle = std::thread::spawn(move || {
            waiter.idle();
        });
        std::thread::sleep(Duration::from_millis(20));
        c.signal();
        handle.join().unwrap();
    }

    #[test]
    fn progressive_resets_sleep_on_work() {
        let p = Progressive::new(0, 0, Duration::from_millis(5));
        p.idle();
        p.idle();
        p.reset();
        assert_eq!(p.current_sleep.get(), Duration::from_micros(50));
    }

    #[test]
    fn build_dispatches_by_kind() {
        assert!(IdleStrategyKind::parse("progressive").is_some());
        assert!(IdleStrategyKind::parse("bogus").is_none());
        let _ = build(IdleStrategyKind::Progressive);
    }
}
