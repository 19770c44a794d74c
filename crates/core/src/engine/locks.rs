//! Per-entity critical sections.
//!
//! Seat assignment holds the seat's key for the whole read-modify-write;
//! balance mutations hold the student's key. Operations on other keys of the
//! same library run concurrently.
//!
//! Multi-key acquisitions are sorted and deduplicated first, so two callers
//! locking overlapping sets always take them in the same order.
//!
//! Library deletion additionally closes a per-library gate that every write
//! enters in shared mode, so no write lands between cascade steps.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use carrel_shared::types::{LibraryId, PaymentPlanId, SeatId, StudentId};

/// Key of one critical section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    /// Occupancy of one seat.
    Seat(LibraryId, SeatId),
    /// Balance and seat pointer of one student.
    Student(LibraryId, StudentId),
    /// One payment plan.
    Plan(LibraryId, PaymentPlanId),
}

type Registry<K, L> = Arc<DashMap<K, Arc<L>>>;

/// A held lock that unregisters its entry once nobody else references it.
#[derive(Debug)]
pub struct Registered<K: Eq + Hash, L, G> {
    guard: Option<G>,
    key: K,
    registry: Registry<K, L>,
}

impl<K: Eq + Hash, L, G> Drop for Registered<K, L, G> {
    fn drop(&mut self) {
        // Release first; the guard itself holds a reference to the lock.
        drop(self.guard.take());
        // Waiters clone the entry under the shard lock before awaiting, so a
        // count of one means the registry holds the only reference.
        self.registry
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Held keys; released on drop.
#[derive(Debug)]
pub struct KeyedGuard {
    _held: Vec<Registered<LockKey, Mutex<()>, OwnedMutexGuard<()>>>,
}

/// Shared entry into a library; deletion waits until every pass is dropped.
pub type LibraryPass = Registered<LibraryId, RwLock<()>, OwnedRwLockReadGuard<()>>;

/// Exclusive hold on a library while it is being deleted.
pub type LibraryClosure = Registered<LibraryId, RwLock<()>, OwnedRwLockWriteGuard<()>>;

/// Registry of keyed async mutexes and library gates.
///
/// Entries exist only while some caller holds or waits for them.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    keys: Registry<LockKey, Mutex<()>>,
    gates: Registry<LibraryId, RwLock<()>>,
}

impl KeyedLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires every key in `keys`, in sorted order.
    pub async fn lock(&self, keys: impl IntoIterator<Item = LockKey>) -> KeyedGuard {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let mut held = Vec::with_capacity(keys.len());
        for key in keys {
            // Clone out of the map before awaiting; holding a DashMap shard
            // across an await would block other keys in the shard.
            let mutex = Arc::clone(self.keys.entry(key).or_default().value());
            held.push(Registered {
                guard: Some(mutex.lock_owned().await),
                key,
                registry: Arc::clone(&self.keys),
            });
        }
        KeyedGuard { _held: held }
    }

    /// Enters a library for a write.
    pub async fn enter_library(&self, library_id: LibraryId) -> LibraryPass {
        let gate = self.gate(library_id);
        Registered {
            guard: Some(gate.read_owned().await),
            key: library_id,
            registry: Arc::clone(&self.gates),
        }
    }

    /// Waits for in-flight writes to drain and blocks new ones.
    pub async fn close_library(&self, library_id: LibraryId) -> LibraryClosure {
        let gate = self.gate(library_id);
        Registered {
            guard: Some(gate.write_owned().await),
            key: library_id,
            registry: Arc::clone(&self.gates),
        }
    }

    /// Number of registered keys and gates.
    pub fn len(&self) -> usize {
        self.keys.len() + self.gates.len()
    }

    /// Returns true if no key or gate is registered.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.gates.is_empty()
    }

    fn gate(&self, library_id: LibraryId) -> Arc<RwLock<()>> {
        Arc::clone(self.gates.entry(library_id).or_default().value())
    }
}
