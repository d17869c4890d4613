//! 256-shard concurrent map, keyed by `k mod 256` as the teacher's
//! `storage/map/map.rs` shards by `key & SHARD_MASK`, just over a fixed,
//! smaller shard count since this cache has no listing/sampling mode
//! switch to size for.

mod shard;

pub use shard::StoredItem;
use shard::Shard;

const NUM_SHARDS: usize = 256;
const SHARD_MASK: u64 = (NUM_SHARDS - 1) as u64;

pub struct Store<V> {
    shards: Vec<Shard<V>>,
}

impl<V: Clone> Store<V> {
    pub fn new() -> Self {
        let mut shards = Vec::with_capacity(NUM_SHARDS);
        for _ in 0..NUM_SHARDS {
            shards.push(Shard::new());
        }
        Self { shards }
    }

    fn shard(&self, key: u64) -> &Shard<V> {
        &self.shards[(key & SHARD_MASK) as usize]
    }

    pub fn get(&self, key: u64, conflict: u64) -> Option<StoredItem<V>> {
        self.shard(key).get(key, conflict)
    }

    pub fn set(&self, item: StoredItem<V>) -> (bool, Option<u64>) {
        self.shard(item.key).set(item)
    }

    pub fn update(&self, key: u64, conflict: u64, value: V, expiration: u64) -> (bool, Option<u64>) {
        self.shard(key).update(key, conflict, value, expiration)
    }

    pub fn remove(&self, key: u64, conflict: u64) -> Option<(u64, u64)> {
        self.shard(key).remove(key, conflict)
    }

    pub fn clear(&self) {
        for shard in &self.shards {
            shard.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for Store<V> {
    fn default() -> Self {
        Self::new()
    }
}
