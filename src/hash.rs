//! Key identity: every caller key is reduced to a `(k, c)` pair of 64-bit
//! values — `k` drives sharding and sketching, `c` disambiguates hash
//! collisions on `k`. A caller-supplied `c == 0` disables collision checking
//! for that call.

use xxhash_rust::xxh3::Xxh3;

/// Total over the key kinds the cache accepts.
///
/// Integers hash to themselves with no conflict check (`c = 0`); bytes and
/// strings get two independent 64-bit digests the way the teacher's
/// `model/keys.rs` derives a cache key and a collision fingerprint from a
/// single `xxh3` hasher.
pub trait KeyToHash {
    fn key_to_hash(&self) -> (u64, u64);
}

macro_rules! impl_identity_hash {
    ($($t:ty),*) => {
        $(
            impl KeyToHash for $t {
                fn key_to_hash(&self) -> (u64, u64) {
                    (*self as u64, 0)
                }
            }
        )*
    };
}

impl_identity_hash!(u64, i64, u32, i32, u16, i16, u8, i8, usize, isize);

impl KeyToHash for str {
    fn key_to_hash(&self) -> (u64, u64) {
        hash_bytes(self.as_bytes())
    }
}

impl KeyToHash for String {
    fn key_to_hash(&self) -> (u64, u64) {
        hash_bytes(self.as_bytes())
    }
}

impl KeyToHash for [u8] {
    fn key_to_hash(&self) -> (u64, u64) {
        hash_bytes(self)
    }
}

impl KeyToHash for Vec<u8> {
    fn key_to_hash(&self) -> (u64, u64) {
        hash_bytes(self)
    }
}

/// Derives `(k, c)` from an arbitrary byte string: `k` is the 64-bit xxh3
/// digest, `c` is the high/low split of the 128-bit digest folded together
/// so that a collision on `k` almost never implies a collision on `c`.
fn hash_bytes(data: &[u8]) -> (u64, u64) {
    let mut hasher = Xxh3::new();
    hasher.update(data);
    let k = hasher.digest();
    let fp = hasher.digest128();
    let c = ((fp >> 64) as u64) ^ (fp as u64);
    (k, c)
}

/// A pluggable override for [`KeyToHash`], for callers whose key type does
/// not implement it or who want a custom collision-hash scheme. The cache
/// never interprets `k`/`c` beyond equality and `mod 256`.
pub type HashFn<K> = Box<dyn Fn(&K) -> (u64, u64) + Send + Sync>;

/// Pairs a key with a [`HashFn`] override for one call, the Rust-idiomatic
/// equivalent of the original's generic per-call `KeyToHash[K Key]` function
/// (it, too, is dispatched fresh on every call rather than fixed once per
/// cache instance). Pass `&WithHash::new(&key, &hash_fn)` anywhere a
/// `&impl KeyToHash` is expected.
pub struct WithHash<'a, K> {
    key: &'a K,
    hash_fn: &'a HashFn<K>,
}

impl<'a, K> WithHash<'a, K> {
    pub fn new(key: &'a K, hash_fn: &'a HashFn<K>) -> Self {
        Self { key, hash_fn }
    }
}

impl<'a, K> KeyToHash for WithHash<'a, K> {
    fn key_to_hash(&self) -> (u64, u64) {
        (self.hash_fn)(self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_identity_with_no_conflict_check() {
        assert_eq!(42u64.key_to_hash(), (42, 0));
        assert_eq!((-7i64).key_to_hash(), ((-7i64) as u64, 0));
    }

    #[test]
    fn strings_hash_deterministically_and_independently() {
        let (k1, c1) = "hello".key_to_hash();
        let (k2, c2) = "hello".key_to_hash();
        assert_eq!((k1, c1), (k2, c2));
        assert_ne!(k1, c1, "k and c should not trivially collide");
    }

    #[test]
    fn distinct_strings_hash_differently() {
        let (k1, _) = "hello".key_to_hash();
        let (k2, _) = "world".key_to_hash();
        assert_ne!(k1, k2);
    }

    #[test]
    fn bytes_and_str_agree() {
        let a = "same-bytes".key_to_hash();
        let b = b"same-bytes".to_vec().key_to_hash();
        assert_eq!(a, b);
    }

    #[test]
    fn with_hash_overrides_the_default_scheme() {
        struct Opaque(u64);
        let hash_fn: HashFn<Opaque> = Box::new(|k: &Opaque| (k.0 * 7, 0));
        let key = Opaque(6);
        assert_eq!(WithHash::new(&key, &hash_fn).key_to_hash(), (42, 0));
    }
}
