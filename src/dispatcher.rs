//! Write-side indirection between producers and the active ring topology.
//!
//! Producers never talk to a [`crate::ring::Ring`] directly; they go through
//! a [`Dispatcher`], which routes to either one central ring or a shard
//! chosen by a stable per-thread hash. The [`crate::supervisor::AutoScalingSupervisor`]
//! is the sole writer of the dispatcher's topology; everyone else only reads
//! it, with the swap published via a release-store and observed via an
//! acquire-load (modeled here with a `parking_lot::RwLock`, whose read/write
//! guards provide at least that ordering).

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ring::Ring;

/// The shape of the write path at a point in time.
pub enum Topology<T> {
    Single(Arc<Ring<T>>),
    Sharded(Vec<Arc<Ring<T>>>),
}

impl<T> Topology<T> {
    pub fn shard_count(&self) -> usize {
        match self {
            Topology::Single(_) => 1,
            Topology::Sharded(rings) => rings.len(),
        }
    }

    fn rings(&self) -> Vec<Arc<Ring<T>>> {
        match self {
            Topology::Single(r) => vec![Arc::clone(r)],
            Topology::Sharded(rings) => rings.clone(),
        }
    }
}

fn thread_shard_hash() -> u64 {
    thread_local! {
        static HASH: u64 = {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            std::thread::current().id().hash(&mut hasher);
            hasher.finish()
        };
    }
    HASH.with(|h| *h)
}

/// Routes writes to the currently active ring/shard and keeps a list of
/// rings being quiesced out of service by the supervisor.
pub struct Dispatcher<T> {
    topology: RwLock<Arc<Topology<T>>>,
    retiring: parking_lot::Mutex<Vec<Arc<Ring<T>>>>,
}

impl<T: Default> Dispatcher<T> {
    pub fn new(initial: Arc<Ring<T>>) -> Self {
        Self {
            topology: RwLock::new(Arc::new(Topology::Single(initial))),
            retiring: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn snapshot(&self) -> Arc<Topology<T>> {
        Arc::clone(&self.topology.read())
    }

    /// The active topology's rings, excluding anything still retiring.
    pub fn active_rings(&self) -> Vec<Arc<Ring<T>>> {
        self.snapshot().rings()
    }

    /// The ring this thread routes to under the current topology.
    pub fn route(&self) -> Arc<Ring<T>> {
        let topology = self.snapshot();
        match &*topology {
            Topology::Single(ring) => Arc::clone(ring),
            Topology::Sharded(rings) => {
                let idx = (thread_shard_hash() % rings.len() as u64) as usize;
                Arc::clone(&rings[idx])
            }
        }
    }

    /// Writes `f` into the ring this thread currently routes to.
    pub fn write<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut T),
    {
        self.route().write(f)
    }

    /// Every ring that should be drained right now: the active topology's
    /// rings plus any still-retiring rings left over from a transition.
    pub fn drain_targets(&self) -> Vec<Arc<Ring<T>>> {
        let mut rings = self.snapshot().rings();
        rings.extend(self.retiring.lock().iter().cloned());
        rings
    }

    /// Publishes a new topology (release, via the write-lock), parking the
    /// previous one in the retiring list so the drainer keeps draining it
    /// until it is fully flushed.
    pub fn swap(&self, new_topology: Topology<T>) {
        let old = {
            let mut guard = self.topology.write();
            std::mem::replace(&mut *guard, Arc::new(new_topology))
        };
        self.retiring.lock().extend(old.rings());
    }

    /// Drops fully-resolved retiring rings (flushed and closed), keeping
    /// the retiring set bounded to rings that still have in-flight work.
    pub fn reap_retiring(&self) {
        self.retiring.lock().retain(|ring| {
            let stats = ring.stats();
            let resolved = stats.processed + stats.dropped + stats.retried;
            if resolved >= stats.writer_cursor {
                ring.close();
                false
            } else {
                true
            }
        });
    }

    pub fn retiring_count(&self) -> usize {
        self.retiring.lock().len()
    }
}
