//! The lock-free MPSC ring: the core of the engine.
//!
//! Claim-then-publish with a per-slot availability sequence separates
//! reservation (ordering, via `fetch_add` on the writer cursor) from
//! visibility (contents, via a release-store into the slot's availability
//! marker once the record is filled). There is no CAS loop on the write
//! side; a stalled producer simply leaves a hole whose slot has
//! `available != s`, and the drainer stops scanning at that hole until
//! publication completes.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::padded::{PaddedAtomicI64, PaddedAtomicU64};

/// What a producer does when the ring is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackpressurePolicy {
    /// Drop the record, count it, return immediately. Default.
    DropOnFull,
    /// Cooperatively yield/sleep and retry the claim until space frees up.
    BlockOnFull,
}

impl BackpressurePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "drop_on_full" | "drop" => Some(Self::DropOnFull),
            "block_on_full" | "block" => Some(Self::BlockOnFull),
            _ => None,
        }
    }
}

/// Encodes a tombstone for claimed sequence `s`: a reserved availability
/// value distinct both from "unset" (`-1`) and from any real published
/// sequence (`s` is always non-negative once claimed). The drainer
/// recognises it and skips the slot without invoking the processor.
#[inline]
fn tombstone_of(s: u64) -> i64 {
    -((s as i64) + 2)
}

#[inline]
fn is_tombstone(value: i64, s: u64) -> bool {
    value == tombstone_of(s)
}

struct Slot<T> {
    value: UnsafeCell<T>,
    available: PaddedAtomicI64,
}

// SAFETY: a slot's `value` is written only by the producer that holds the
// unique claim on its sequence, and read only by the single consumer after
// observing that claim's publication via an acquire load of `available`.
// The availability handshake is the synchronization; no two threads ever
// touch `value` concurrently.
unsafe impl<T: Send> Sync for Slot<T> {}

/// Read-only snapshot of ring statistics. Never used for correctness.
#[derive(Debug, Clone, Copy, Default)]
pub struct RingStats {
    pub processed: u64,
    pub dropped: u64,
    /// `BlockOnFull` claims abandoned and retried against a fresh sequence.
    /// Never user-visible as a drop — the logical write still succeeds —
    /// but counted here so contention accounting stays honest.
    pub retried: u64,
    pub writer_cursor: u64,
    pub reader_cursor: u64,
}

impl RingStats {
    /// Failed (dropped or retried) claims over total claims. `0.0` once
    /// nothing has been claimed.
    pub fn contention_ratio(&self) -> f64 {
        if self.writer_cursor == 0 {
            0.0
        } else {
            (self.dropped + self.retried) as f64 / self.writer_cursor as f64
        }
    }
}

/// A fixed-capacity, power-of-two, lock-free MPSC ring of slots of type `T`.
pub struct Ring<T> {
    slots: Box<[Slot<T>]>,
    mask: u64,
    capacity: u64,
    batch_size: usize,
    policy: BackpressurePolicy,
    writer_cursor: PaddedAtomicU64,
    reader_cursor: PaddedAtomicU64,
    closed: PaddedAtomicU64,
    processed: AtomicU64,
    dropped: AtomicU64,
    retried: AtomicU64,
}

// SAFETY: see `Slot`'s safety comment; the ring as a whole inherits the
// same per-slot handshake discipline.
unsafe impl<T: Send> Send for Ring<T> {}
unsafe impl<T: Send> Sync for Ring<T> {}

impl<T: Default> Ring<T> {
    pub fn new(capacity: usize, batch_size: usize, policy: BackpressurePolicy) -> Result<Self> {
        if capacity < 2 || !capacity.is_power_of_two() {
            return Err(Error::config(format!(
                "ring capacity must be a power of two >= 2, got {capacity}"
            )));
        }
        if batch_size == 0 || batch_size > capacity {
            return Err(Error::config(format!(
                "batch size must be in [1, {capacity}], got {batch_size}"
            )));
        }
        let slots = (0..capacity)
            .map(|_| Slot { value: UnsafeCell::new(T::default()), available: PaddedAtomicI64::new(-1) })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Ok(Self {
            slots,
            mask: capacity as u64 - 1,
            capacity: capacity as u64,
            batch_size,
            policy,
            writer_cursor: PaddedAtomicU64::new(0),
            reader_cursor: PaddedAtomicU64::new(0),
            closed: PaddedAtomicU64::new(0),
            processed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            retried: AtomicU64::new(0),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) == 1
    }

    /// Sets the closed flag. Idempotent; safe to call more than once.
    pub fn close(&self) {
        self.closed.store(1, Ordering::SeqCst);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn retried(&self) -> u64 {
        self.retried.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            processed: self.processed(),
            dropped: self.dropped(),
            retried: self.retried(),
            writer_cursor: self.writer_cursor.load(Ordering::Acquire),
            reader_cursor: self.reader_cursor.load(Ordering::Acquire),
        }
    }

    /// Claims a slot and invokes `f` to populate it, then publishes.
    ///
    /// Returns `false` if the ring is closed, or — under `DropOnFull` — if
    /// the ring was full at claim time. Under `BlockOnFull`, a full ring
    /// makes this cooperatively retry (tombstoning each abandoned claim)
    /// rather than returning `false`, until space frees up or the ring is
    /// closed out from under it.
    pub fn write<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        let mut f = Some(f);
        loop {
            if self.is_closed() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                return false;
            }

            let s = self.writer_cursor.fetch_add(1, Ordering::SeqCst);
            let reader = self.reader_cursor.load(Ordering::Acquire);

            if s >= reader + self.capacity {
                self.publish_tombstone(s);
                match self.policy {
                    BackpressurePolicy::DropOnFull => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        return false;
                    }
                    BackpressurePolicy::BlockOnFull => {
                        self.retried.fetch_add(1, Ordering::Relaxed);
                        std::thread::yield_now();
                        std::thread::sleep(Duration::from_micros(1));
                        continue;
                    }
                }
            }

            let idx = (s & self.mask) as usize;
            let slot = &self.slots[idx];
            // SAFETY: this sequence's full-check passed, so no other
            // producer holds this slot index's current generation, and the
            // consumer will not read it until it observes `available == s`.
            let writer = f.take().expect("write closure invoked at most once");
            unsafe {
                writer(&mut *slot.value.get());
            }
            slot.available.store(s as i64, Ordering::Release);
            return true;
        }
    }

    fn publish_tombstone(&self, s: u64) {
        let idx = (s & self.mask) as usize;
        self.slots[idx].available.store(tombstone_of(s), Ordering::Release);
    }

    /// Drains up to `batch_size` contiguously-available slots, invoking
    /// `f` on each non-tombstoned record in claimed-sequence order.
    /// Returns the number of records delivered to `f` (not the number of
    /// sequences scanned, which may be larger if tombstones were skipped).
    pub fn process_batch<F>(&self, mut f: F) -> usize
    where
        F: FnMut(&mut T),
    {
        let current = self.reader_cursor.load(Ordering::Acquire);
        let upto = self.writer_cursor.load(Ordering::Acquire);
        if current >= upto {
            return 0;
        }
        let budget = self.batch_size.min((upto - current) as usize) as u64;

        let mut s = current;
        let mut scanned = 0u64;
        let mut delivered = 0usize;

        while scanned < budget {
            let idx = (s & self.mask) as usize;
            let slot = &self.slots[idx];
            let avail = slot.available.load(Ordering::Acquire);

            if avail == s as i64 {
                // SAFETY: availability == s means the producer's release
                // store happened-before this acquire load; we now have
                // exclusive access until we reset availability below.
                unsafe {
                    f(&mut *slot.value.get());
                }
                delivered += 1;
            } else if is_tombstone(avail, s) {
                // claimed but never carried a record; skip silently
            } else {
                break;
            }

            slot.available.store(-1, Ordering::Release);
            s += 1;
            scanned += 1;
        }

        if scanned == 0 {
            return 0;
        }

        self.reader_cursor.store(s, Ordering::Release);
        self.processed.fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    /// Waits until every sequence claimed strictly before this call has
    /// been resolved — delivered or tombstoned. Counting tombstoned
    /// (dropped) claims as resolved, rather than waiting for them to show
    /// up in `processed`, is what keeps this from hanging forever on
    /// sequences that `DropOnFull` will never deliver.
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        let target = self.writer_cursor.load(Ordering::Acquire);
        let deadline = Instant::now() + timeout;
        loop {
            // `retried` claims are `BlockOnFull` sequences abandoned and
            // tombstoned in favor of a later retry; they resolve the
            // original sequence without ever becoming `processed` or
            // `dropped`, so they must count toward resolution too.
            let resolved = self.processed() + self.dropped() + self.retried();
            if resolved >= target {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::flush_timeout(target - resolved));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
