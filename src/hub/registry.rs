//! Observer registry.
//!
//! The set of live observers, mutated concurrently by subscription tasks and
//! the dispatcher. Every access goes through one `std::sync::Mutex`; the lock
//! is held only for the map operation itself and never across an await.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::connection::ObserverConnection;

/// Handle returned by [`ObserverRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

/// Concurrency-safe set of registered observers.
#[derive(Debug, Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    observers: Mutex<HashMap<ObserverId, Arc<ObserverConnection>>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ObserverId, Arc<ObserverConnection>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a connection. It receives broadcasts as soon as this returns.
    pub fn register(&self, conn: ObserverConnection) -> ObserverId {
        let id = ObserverId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut observers = self.lock();
            observers.insert(id, Arc::new(conn));
            observers.len()
        };
        tracing::debug!(observer = %id, observers = count, "Observer registered");
        id
    }

    /// Removes a connection if still present.
    ///
    /// Idempotent. Returns the connection only to the first caller, which
    /// becomes responsible for closing it.
    pub fn deregister(&self, id: ObserverId) -> Option<Arc<ObserverConnection>> {
        let (removed, count) = {
            let mut observers = self.lock();
            let removed = observers.remove(&id);
            (removed, observers.len())
        };
        if removed.is_some() {
            tracing::debug!(observer = %id, observers = count, "Observer deregistered");
        }
        removed
    }

    /// Point-in-time copy of all registered connections.
    pub fn snapshot(&self) -> Vec<(ObserverId, Arc<ObserverConnection>)> {
        self.lock()
            .iter()
            .map(|(id, conn)| (*id, Arc::clone(conn)))
            .collect()
    }

    pub fn contains(&self, id: ObserverId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Removes every connection, handing them to the caller to close.
    pub fn drain(&self) -> Vec<(ObserverId, Arc<ObserverConnection>)> {
        self.lock().drain().collect()
    }
}
