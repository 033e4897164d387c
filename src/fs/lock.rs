//! Path-keyed shared/exclusive locks.
//!
//! Every key owns a tokio `RwLock<()>`. Tokio's lock is fair: waiters are
//! served strictly in arrival order, and a queued exclusive request holds
//! back every shared request that arrives after it. Entries live in a table
//! owned by [`LockManager`] and are dropped again once the last holder or
//! waiter for a key goes away.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::error::{Error, Result};

/// Normalized path identifying one lockable resource.
///
/// Relative paths are made absolute against the working directory and `.`/`..`
/// segments are folded lexically, so `./a/../b` and `b` share a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey(String);

impl LockKey {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());

        let mut normalized = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normalized.pop();
                }
                other => normalized.push(other.as_os_str()),
            }
        }

        Self(normalized.to_string_lossy().into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many holders at once, never alongside an exclusive holder
    Shared,
    /// Single holder
    Exclusive,
}

type Slot = Arc<RwLock<()>>;
type Table = Arc<Mutex<HashMap<LockKey, Slot>>>;

/// Process-scoped registry of per-path locks.
///
/// Cheap to clone; clones share the same table. Build one per process and hand
/// it to every component that touches files.
#[derive(Debug, Clone, Default)]
pub struct LockManager {
    table: Table,
    timeout: Option<Duration>,
}

impl LockManager {
    /// Lock manager whose acquisitions wait indefinitely.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock manager that gives up with [`Error::LockTimeout`] after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            table: Table::default(),
            timeout: Some(timeout),
        }
    }

    pub async fn acquire_shared(&self, path: impl AsRef<Path>) -> Result<LockGuard> {
        self.acquire(path, LockMode::Shared).await
    }

    pub async fn acquire_exclusive(&self, path: impl AsRef<Path>) -> Result<LockGuard> {
        self.acquire(path, LockMode::Exclusive).await
    }

    /// Waits for `path` in the given mode.
    ///
    /// The returned guard releases the lock when dropped. Dropping this future
    /// before it resolves leaves the queue untouched.
    pub async fn acquire(&self, path: impl AsRef<Path>, mode: LockMode) -> Result<LockGuard> {
        let entry = self.entry(LockKey::new(path));
        let slot = Arc::clone(&entry.slot);

        let wait = async move {
            match mode {
                LockMode::Shared => Held::Shared(slot.read_owned().await),
                LockMode::Exclusive => Held::Exclusive(slot.write_owned().await),
            }
        };

        let held = match self.timeout {
            None => wait.await,
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(held) => held,
                Err(_) => {
                    tracing::warn!(key = %entry.key, ?mode, "lock wait timed out");
                    return Err(Error::LockTimeout {
                        key: entry.key.to_string(),
                        waited: limit,
                    });
                }
            },
        };

        tracing::trace!(key = %entry.key, ?mode, "lock acquired");

        Ok(LockGuard {
            held: Some(held),
            entry,
        })
    }

    /// Number of keys with a live holder or waiter.
    pub fn active_keys(&self) -> usize {
        self.table.lock().len()
    }

    fn entry(&self, key: LockKey) -> Entry {
        let slot = {
            let mut table = self.table.lock();
            Arc::clone(table.entry(key.clone()).or_default())
        };

        Entry {
            key,
            slot,
            table: Arc::clone(&self.table),
        }
    }
}

enum Held {
    Shared(#[allow(dead_code)] OwnedRwLockReadGuard<()>),
    Exclusive(#[allow(dead_code)] OwnedRwLockWriteGuard<()>),
}

/// Reference to a table slot; removes the slot once nothing else points at it.
struct Entry {
    key: LockKey,
    slot: Slot,
    table: Table,
}

impl Drop for Entry {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        // Table plus this entry: no other holder or waiter remains.
        if Arc::strong_count(&self.slot) == 2 {
            table.remove(&self.key);
        }
    }
}

/// Scoped lock token. The lock is released exactly once, when this drops.
pub struct LockGuard {
    // Field order matters: the guard must release before the entry checks
    // whether the slot can be collected.
    held: Option<Held>,
    entry: Entry,
}

impl LockGuard {
    pub fn key(&self) -> &LockKey {
        &self.entry.key
    }

    pub fn mode(&self) -> LockMode {
        match self.held {
            Some(Held::Exclusive(_)) => LockMode::Exclusive,
            _ => LockMode::Shared,
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.entry.key)
            .field("mode", &self.mode())
            .finish()
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.held.take();
        tracing::trace!(key = %self.entry.key, "lock released");
    }
}
