//! A single shard of the concurrent map: a `HashMap` behind one
//! `parking_lot::RwLock`, generalized from the teacher's `storage/map/shard.rs`
//! away from its LRU-list/refresh-queue machinery toward the plain
//! conflict-checked slot the sampling-based Sampled-LFU policy needs.

use parking_lot::RwLock;
use std::collections::HashMap;

/// An item as stored inside a shard: `conflict` disambiguates hash
/// collisions on `key`, `expiration` is a Unix-seconds deadline (0 means
/// no TTL).
#[derive(Clone)]
pub struct StoredItem<V> {
    pub key: u64,
    pub conflict: u64,
    pub value: V,
    pub expiration: u64,
}

impl<V> StoredItem<V> {
    fn conflicts(&self, conflict: u64) -> bool {
        conflict != 0 && self.conflict != 0 && self.conflict != conflict
    }

    /// `get` checks expiration lazily against the wall clock rather than
    /// waiting on the TTL bucket sweep, which only runs on the mutator's
    /// tick interval and in `DEFAULT_BUCKET_WIDTH_SECS`-wide batches — a
    /// reader should never observe a value past its own deadline just
    /// because the sweep hasn't caught up yet.
    fn is_expired(&self, now: u64) -> bool {
        self.expiration != 0 && self.expiration <= now
    }
}

pub struct Shard<V> {
    items: RwLock<HashMap<u64, StoredItem<V>>>,
}

impl<V: Clone> Shard<V> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `None` if the key is absent or a conflicting key occupies
    /// the slot (a hash collision on `key` with a different `conflict`).
    pub fn get(&self, key: u64, conflict: u64) -> Option<StoredItem<V>> {
        let items = self.items.read();
        let item = items.get(&key)?;
        if item.conflicts(conflict) || item.is_expired(crate::ttl::now_unix_secs()) {
            return None;
        }
        Some(item.clone())
    }

    /// Inserts the slot at `key`, or no-ops if it is already occupied by a
    /// conflicting key (a hash collision on `key` with a different
    /// `conflict`), matching the original `lockedMap.Set`'s early return on
    /// conflict mismatch. Returns `(applied, old_expiration)`; `old_expiration`
    /// is the replaced value's expiration, if any, so the caller can remove
    /// the stale TTL-bucket entry.
    pub fn set(&self, item: StoredItem<V>) -> (bool, Option<u64>) {
        let mut items = self.items.write();
        if let Some(existing) = items.get(&item.key) {
            if existing.conflicts(item.conflict) {
                return (false, None);
            }
        }
        let old = items.insert(item.key, item).map(|old| old.expiration);
        (true, old)
    }

    /// Updates the value of an existing, non-conflicting key in place.
    /// Returns `(updated, old_expiration)`.
    pub fn update(&self, key: u64, conflict: u64, value: V, expiration: u64) -> (bool, Option<u64>) {
        let mut items = self.items.write();
        match items.get(&key) {
            Some(existing) if !existing.conflicts(conflict) => {
                let old_expiration = existing.expiration;
                items.insert(
                    key,
                    StoredItem {
                        key,
                        conflict,
                        value,
                        expiration,
                    },
                );
                (true, Some(old_expiration))
            }
            _ => (false, None),
        }
    }

    /// Removes the slot at `key` if present and non-conflicting. Returns
    /// the removed item's `(conflict, expiration)`.
    pub fn remove(&self, key: u64, conflict: u64) -> Option<(u64, u64)> {
        let mut items = self.items.write();
        match items.get(&key) {
            Some(existing) if existing.conflicts(conflict) => None,
            Some(_) => items.remove(&key).map(|old| (old.conflict, old.expiration)),
            None => None,
        }
    }

    pub fn clear(&self) {
        self.items.write().clear();
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }
}
