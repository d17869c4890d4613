//! TTL bucket index: groups expiring keys into fixed-width time buckets so a
//! periodic sweep can evict a whole bucket at once instead of scanning every
//! live key. Bucket width `W` defaults to 5 seconds, matching the original
//! `bucketDurationSecs`.

use parking_lot::Mutex;
use std::collections::HashMap;

pub const DEFAULT_BUCKET_WIDTH_SECS: u64 = 5;

/// Current Unix time in whole seconds, used to derive bucket numbers and
/// drive TTL sweeps.
pub fn now_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// `B(t) = floor(t/W) + 1`. The `+1` keeps bucket 0 reserved, so
/// `cleanup_bucket` never underflows for `t` at or after the epoch.
pub fn bucket_number(unix_secs: u64, width: u64) -> u64 {
    unix_secs / width + 1
}

/// `cleanup_bucket(t) = B(t) - 1`: the most recent bucket guaranteed to have
/// fully elapsed relative to `t`.
pub fn cleanup_bucket(unix_secs: u64, width: u64) -> u64 {
    bucket_number(unix_secs, width) - 1
}

struct Inner {
    buckets: HashMap<u64, HashMap<u64, u64>>,
    width: u64,
}

/// Maps bucket number -> (key -> conflict) so a swept bucket can be handed
/// to the store for removal without re-deriving conflicts.
pub struct TtlIndex {
    inner: Mutex<Inner>,
}

impl TtlIndex {
    pub fn new(width: u64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buckets: HashMap::new(),
                width: width.max(1),
            }),
        }
    }

    /// Adds `key` to the bucket for `expires_at` (a Unix-seconds deadline).
    /// A deadline of 0 means no TTL and is not indexed.
    pub fn add(&self, key: u64, conflict: u64, expires_at: u64) {
        if expires_at == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        let width = inner.width;
        let bucket = bucket_number(expires_at, width);
        inner.buckets.entry(bucket).or_default().insert(key, conflict);
    }

    /// Moves `key` from its old bucket to the bucket for `new_expires_at`,
    /// or removes it outright when `old_expires_at` carried a TTL and the
    /// new value does not.
    pub fn update(&self, key: u64, conflict: u64, old_expires_at: u64, new_expires_at: u64) {
        if old_expires_at == new_expires_at {
            return;
        }
        self.remove(key, old_expires_at);
        self.add(key, conflict, new_expires_at);
    }

    pub fn remove(&self, key: u64, expires_at: u64) {
        if expires_at == 0 {
            return;
        }
        let mut inner = self.inner.lock();
        let width = inner.width;
        let bucket = bucket_number(expires_at, width);
        if let Some(slot) = inner.buckets.get_mut(&bucket) {
            slot.remove(&key);
            if slot.is_empty() {
                inner.buckets.remove(&bucket);
            }
        }
    }

    /// Drains every bucket up to and including `cleanup_bucket(now)`,
    /// returning the `(key, conflict)` pairs to expire.
    pub fn sweep(&self, now_unix_secs: u64) -> Vec<(u64, u64)> {
        let mut inner = self.inner.lock();
        let width = inner.width;
        let cutoff = cleanup_bucket(now_unix_secs, width);
        let stale: Vec<u64> = inner
            .buckets
            .keys()
            .copied()
            .filter(|&b| b <= cutoff)
            .collect();

        let mut out = Vec::new();
        for bucket in stale {
            if let Some(slot) = inner.buckets.remove(&bucket) {
                out.extend(slot);
            }
        }
        out
    }

    pub fn clear(&self) {
        self.inner.lock().buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_number_is_monotonic_in_width_steps() {
        assert_eq!(bucket_number(0, 5), 1);
        assert_eq!(bucket_number(4, 5), 1);
        assert_eq!(bucket_number(5, 5), 2);
    }

    #[test]
    fn cleanup_bucket_is_one_behind() {
        assert_eq!(cleanup_bucket(5, 5), bucket_number(5, 5) - 1);
    }

    #[test]
    fn entries_with_no_ttl_are_never_indexed() {
        let idx = TtlIndex::new(5);
        idx.add(1, 0, 0);
        assert!(idx.sweep(1_000_000).is_empty());
    }

    #[test]
    fn sweep_drains_only_elapsed_buckets() {
        let idx = TtlIndex::new(5);
        idx.add(1, 9, 10);
        idx.add(2, 8, 1_000);
        let expired = idx.sweep(20);
        assert_eq!(expired, vec![(1, 9)]);
        assert!(idx.sweep(2_000).contains(&(2, 8)));
    }

    #[test]
    fn update_moves_a_key_between_buckets() {
        let idx = TtlIndex::new(5);
        idx.add(1, 9, 10);
        idx.update(1, 9, 10, 1_000);
        assert!(idx.sweep(10).is_empty());
        assert!(idx.sweep(2_000).contains(&(1, 9)));
    }

    #[test]
    fn remove_drops_a_key_before_it_expires() {
        let idx = TtlIndex::new(5);
        idx.add(1, 9, 10);
        idx.remove(1, 10);
        assert!(idx.sweep(1_000).is_empty());
    }

    #[test]
    fn clear_drops_every_bucket() {
        let idx = TtlIndex::new(5);
        idx.add(1, 9, 10);
        idx.clear();
        assert!(idx.sweep(1_000).is_empty());
    }
}
