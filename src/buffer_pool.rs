//! A pool of reusable byte buffers for the drainer's encode path.
//!
//! The drainer is single-threaded, so contention on the pool is minimal, but
//! the pool itself stays thread-safe (`parking_lot::Mutex` around a `Vec`)
//! because encoders are free to call `get`/`put` from the consumer task
//! only, and nothing in this module assumes that caller is the only holder.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::constants::{DEFAULT_BUFFER_CAPACITY, MAX_BUFFER};

/// Statistical counters for pool usage, never used for correctness.
/// All relaxed: monitoring only, no happens-before relationship needed.
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    gets: AtomicU64,
    puts: AtomicU64,
    allocations: AtomicU64,
    drops: AtomicU64,
}

impl BufferPoolStats {
    pub fn gets(&self) -> u64 {
        self.gets.load(Ordering::Relaxed)
    }

    pub fn puts(&self) -> u64 {
        self.puts.load(Ordering::Relaxed)
    }

    pub fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    pub fn drops(&self) -> u64 {
        self.drops.load(Ordering::Relaxed)
    }
}

/// A pool of `Vec<u8>` buffers reused across drain/encode cycles.
pub struct BufferPool {
    free: parking_lot::Mutex<Vec<Vec<u8>>>,
    stats: BufferPoolStats,
}

impl BufferPool {
    pub fn new() -> Self {
        Self { free: parking_lot::Mutex::new(Vec::new()), stats: BufferPoolStats::default() }
    }

    /// Returns a clean, zero-length buffer with at least the default capacity.
    pub fn get(&self) -> Vec<u8> {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);
        match self.free.lock().pop() {
            Some(mut buf) => {
                buf.clear();
                buf
            }
            None => {
                self.stats.allocations.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(DEFAULT_BUFFER_CAPACITY)
            }
        }
    }

    /// Returns a buffer to the pool for reuse. Buffers larger than
    /// [`MAX_BUFFER`] are dropped instead, so one oversized record cannot
    /// pin a permanently huge allocation in the pool.
    pub fn put(&self, mut buf: Vec<u8>) {
        self.stats.puts.fetch_add(1, Ordering::Relaxed);
        if buf.capacity() > MAX_BUFFER {
            self.stats.drops.fetch_add(1, Ordering::Relaxed);
            return;
        }
        buf.clear();
        self.free.lock().push(buf);
    }

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_clean_buffer() {
        let pool = BufferPool::new();
        let buf = pool.get();
        assert!(buf.is_empty());
        assert!(buf.capacity() >= DEFAULT_BUFFER_CAPACITY);
        assert_eq!(pool.stats().allocations(), 1);
    }

    #[test]
    fn put_then_get_reuses_allocation() {
        let pool = BufferPool::new();
        let buf = pool.get();
        let ptr = buf.as_ptr();
        pool.put(buf);
        let buf2 = pool.get();
        assert_eq!(buf2.as_ptr(), ptr);
        assert_eq!(pool.stats().allocations(), 1);
    }

    #[test]
    fn oversized_buffer_is_dropped_not_pooled() {
        let pool = BufferPool::new();
        let big = Vec::with_capacity(MAX_BUFFER + 1);
        pool.put(big);
        assert_eq!(pool.stats().drops(), 1);
        assert!(pool.free.lock().is_empty());
    }

    #[test]
    fn put_clears_contents() {
        let pool = BufferPool::new();
        let mut buf = pool.get();
        buf.extend_from_slice(b"hello");
        pool.put(buf);
        let buf2 = pool.get();
        assert!(buf2.is_empty());
    }
}
