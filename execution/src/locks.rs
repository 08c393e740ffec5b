//! Per-key async mutual exclusion.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex, PoisonError},
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries kept before the first sweep of idle keys.
const MIN_SWEEP_AT: usize = 64;

struct Table<K> {
    locks: HashMap<K, Arc<AsyncMutex<()>>>,
    sweep_at: usize,
}

/// Lazily created async mutex per key.
///
/// Guards are owned so they can be held across awaits and moved into the
/// value that needs the exclusion (see [`crate::ledger::Allocation`]).
/// Keys nobody holds or waits on are swept once the table doubles in size.
pub struct KeyedLocks<K> {
    table: Mutex<Table<K>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self {
            table: Mutex::new(Table {
                locks: HashMap::new(),
                sweep_at: MIN_SWEEP_AT,
            }),
        }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            if table.locks.len() >= table.sweep_at {
                // Every holder and waiter owns a clone, taken under this mutex.
                table.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
                table.sweep_at = (table.locks.len() * 2).max(MIN_SWEEP_AT);
            }
            table.locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .locks
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
