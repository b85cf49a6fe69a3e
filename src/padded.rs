//! Cache-line isolated atomics.
//!
//! Every hot atomic in the ring (writer cursor, reader cursor, closed flag,
//! per-slot availability) is wrapped in [`PaddedAtomic`] so that two adjacent
//! instances never share a cache line and cause false sharing under
//! concurrent access from different cores.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A 64-bit atomic integer isolated in its own cache line.
///
/// `align(128)` rather than the strict 64-byte minimum the spec calls for:
/// some microarchitectures prefetch adjacent 64-byte lines in pairs, so
/// rounding up to 128 bytes keeps at least 64 bytes of isolation on either
/// side under that behavior too.
#[repr(align(128))]
pub struct PaddedAtomicU64(AtomicU64);

impl PaddedAtomicU64 {
    pub const fn new(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    #[inline(always)]
    pub fn load(&self, order: Ordering) -> u64 {
        self.0.load(order)
    }

    #[inline(always)]
    pub fn store(&self, value: u64, order: Ordering) {
        self.0.store(value, order)
    }

    #[inline(always)]
    pub fn fetch_add(&self, value: u64, order: Ordering) -> u64 {
        self.0.fetch_add(value, order)
    }

    #[inline(always)]
    pub fn compare_exchange(
        &self,
        current: u64,
        new: u64,
        success: Ordering,
        failure: Ordering,
    ) -> std::result::Result<u64, u64> {
        self.0.compare_exchange(current, new, success, failure)
    }
}

impl Default for PaddedAtomicU64 {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Same isolation, signed 64-bit — used for the per-slot availability marker,
/// whose initial value (`-1`) is outside `u64`'s natural "unset" encoding.
#[repr(align(128))]
pub struct PaddedAtomicI64(AtomicI64);

impl PaddedAtomicI64 {
    pub const fn new(value: i64) -> Self {
        Self(AtomicI64::new(value))
    }

    #[inline(always)]
    pub fn load(&self, order: Ordering) -> i64 {
        self.0.load(order)
    }

    #[inline(always)]
    pub fn store(&self, value: i64, order: Ordering) {
        self.0.store(value, order)
    }
}

impl Default for PaddedAtomicI64 {
    fn default() -> Self {
        Self::new(-1)
    }
}
