//! Per-record async locks

use dashmap::DashMap;
use ned_core::Ediid;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Lock state for one ediid
#[derive(Default)]
struct Slot {
    mutex: Arc<Mutex<()>>,
    /// Holders plus waiters; the slot is pruned when this reaches zero
    users: usize,
}

/// One async mutex per ediid, created on demand and pruned once released
#[derive(Default)]
pub struct KeyedLocks {
    slots: DashMap<Ediid, Slot>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `ediid`
    ///
    /// Cancel-safe: dropping the future while it waits releases its claim.
    pub async fn lock(&self, ediid: &Ediid) -> KeyedGuard<'_> {
        // The map shard lock is released before awaiting
        let mutex = {
            let mut slot = self.slots.entry(ediid.clone()).or_default();
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };

        let mut guard = KeyedGuard {
            owner: self,
            ediid: ediid.clone(),
            guard: None,
        };
        guard.guard = Some(mutex.lock_owned().await);
        guard
    }

    /// Number of ediids with a live lock entry
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Claim on one ediid's lock; holds the lock once acquired, until dropped
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    ediid: Ediid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.owner.slots.remove_if_mut(&self.ediid, |_, slot| {
            slot.users = slot.users.saturating_sub(1);
            slot.users == 0
        });
    }
}
