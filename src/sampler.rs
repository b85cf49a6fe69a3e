//! Samplers: a producer-side capability consulted before a record is claimed.
//!
//! Built-ins use atomics only, so they are safe to call from many producer
//! threads concurrently with no coordination beyond the atomic itself.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::record::Level;

/// A lightweight, read-only preview of a record, available to a sampler
/// before the record is actually claimed and filled.
pub struct RecordPreview<'a> {
    pub level: Level,
    pub message: &'a str,
}

pub trait Sampler: Send + Sync {
    /// Returns `true` to keep (deliver) the record, `false` to drop it
    /// before it ever reaches the ring.
    fn sample(&self, preview: &RecordPreview<'_>) -> bool;
}

/// Keeps every record. The absence of a sampler behaves identically to this.
#[derive(Default)]
pub struct AlwaysSample;

impl Sampler for AlwaysSample {
    fn sample(&self, _preview: &RecordPreview<'_>) -> bool {
        true
    }
}

/// Keeps 1 in every `n` records, counted independently of level or content.
pub struct CountingSampler {
    n: u64,
    counter: AtomicU64,
}

impl CountingSampler {
    pub fn new(n: u64) -> Self {
        Self { n: n.max(1), counter: AtomicU64::new(0) }
    }
}

impl Sampler for CountingSampler {
    fn sample(&self, _preview: &RecordPreview<'_>) -> bool {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        count % self.n == 0
    }
}

/// Classic token bucket: refills `rate` tokens per second up to `burst`,
/// keeping a record only while a token is available.
pub struct TokenBucketSampler {
    rate_per_sec: f64,
    burst: f64,
    tokens_milli: AtomicI64,
    last_refill_ns: AtomicI64,
}

impl TokenBucketSampler {
    pub fn new(rate_per_sec: f64, burst: f64) -> Self {
        Self {
            rate_per_sec,
            burst,
            tokens_milli: AtomicI64::new((burst * 1000.0) as i64),
            last_refill_ns: AtomicI64::new(now_ns()),
        }
    }

    fn refill(&self) {
        let now = now_ns();
        let last = self.last_refill_ns.swap(now, Ordering::Relaxed);
        let elapsed_secs = ((now - last).max(0)) as f64 / 1e9;
        let add_milli = (elapsed_secs * self.rate_per_sec * 1000.0) as i64;
        if add_milli == 0 {
            return;
        }
        let cap_milli = (self.burst * 1000.0) as i64;
        let mut current = self.tokens_milli.load(Ordering::Relaxed);
        loop {
            let next = (current + add_milli).min(cap_milli);
            match self.tokens_milli.compare_exchange_weak(
                current,
                next,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }
}

impl Sampler for TokenBucketSampler {
    fn sample(&self, _preview: &RecordPreview<'_>) -> bool {
        self.refill();
        let mut current = self.tokens_milli.load(Ordering::Relaxed);
        loop {
            if current < 1000 {
                return false;
            }
            match self.tokens_milli.compare_exchange_weak(
                current,
                current - 1000,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
    }
}

fn now_ns() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos() as i64
}

/// Builds a sampler from a config string: `"count:N"`, `"bucket:rate,burst"`,
/// or `None` for "keep everything" (the same as omitting a sampler).
pub fn parse(spec: &str) -> Option<std::sync::Arc<dyn Sampler>> {
    let (kind, rest) = spec.split_once(':')?;
    match kind {
        "count" => rest.parse().ok().map(|n| std::sync::Arc::new(CountingSampler::new(n)) as _),
        "bucket" => {
            let (rate, burst) = rest.split_once(',')?;
            let rate: f64 = rate.parse().ok()?;
            let burst: f64 = burst.parse().ok()?;
            Some(std::sync::Arc::new(TokenBucketSampler::new(rate, burst)) as _)
        }
        _ => None,
    }
}
