//! # Lock Registry
//!
//! Per-key async mutexes that serialize writers of the same session or
//! register inside one process.
//!
//! ## Lock Keys
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  operation          key taken              serialized against           │
//! │  ─────────────────  ─────────────────────  ────────────────────────     │
//! │  open session       register:<id>          other opens of that till     │
//! │  reopen session     register:<id>          opens of that till           │
//! │  record movement    session:<id>           movements, close, reopen     │
//! │  close session      session:<id>           movements of that session    │
//! │                                                                         │
//! │  Reads take no lock.                                                    │
//! │  Each operation holds at most one key and takes it before asking the    │
//! │  pool for a connection, so lock order can never invert.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A second process writing the same file is still kept honest by SQLite:
//! the partial unique index guards the one-open-session rule and
//! `busy_timeout` bounds the wait for the write lock.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use caisse_core::LedgerError;

/// Lock key for a session.
pub fn session_key(session_id: &str) -> String {
    format!("session:{}", session_id)
}

/// Lock key for a register.
pub fn register_key(register_id: &str) -> String {
    format!("register:{}", register_id)
}

/// Registry of named async locks.
///
/// Entries are created on first use and removed by the last guard to release
/// them, so the map only holds keys that are locked or awaited.
#[derive(Debug)]
pub struct LockRegistry {
    locks: DashMap<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct LockGuard<'a> {
    key: String,
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard<'_> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        // The map and this guard hold the only two references: no waiter.
        // Waiters clone under the shard lock, so the check cannot race them.
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 2);
    }
}

impl LockRegistry {
    pub fn new(timeout: Duration) -> Self {
        LockRegistry {
            locks: DashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Waits for the lock on `key`, at most the configured timeout.
    ///
    /// ## Returns
    /// * `Ok(LockGuard)` - exclusive until dropped
    /// * `Err(LedgerError::Busy)` - the wait exceeded the timeout
    pub async fn acquire(&self, key: String) -> Result<LockGuard<'_>, LedgerError> {
        // Clone the Arc out so the DashMap shard is not held across the await
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => {
                debug!(key = %key, "Lock acquired");
                Ok(LockGuard {
                    key,
                    locks: &self.locks,
                    _guard: guard,
                })
            }
            Err(_) => {
                warn!(key = %key, timeout_ms = self.timeout.as_millis() as u64, "Lock wait timed out");
                // The holder may have released between the timeout and here
                self.locks
                    .remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
                Err(LedgerError::busy(format!(
                    "timed out after {} ms waiting for {}",
                    self.timeout.as_millis(),
                    key
                )))
            }
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
