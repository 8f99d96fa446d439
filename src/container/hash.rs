use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};
use std::sync::Mutex;

use log::debug;

/// ExtendibleHashTable implements a hash table using the extendible hashing
/// scheme: a directory of 2^global_depth slots, each pointing at a bucket of
/// bounded capacity. A full bucket is split in two and the directory doubles
/// when the bucket's local depth has caught up with the global depth, so the
/// table grows by whole buckets instead of rehashing everything at once.
///
/// Buckets are never merged and the directory never shrinks.
///
/// The hasher is pluggable through the S parameter, defaulting to the std
/// RandomState, so deterministic hashers can be injected where the bucket
/// placement must be pinned down.
///
/// All the state is guarded by a single mutex, a split either completes under
/// the latch or is not visible to readers.
pub struct ExtendibleHashTable<K, V, S = RandomState> {
    hasher: S,
    inner: Mutex<Inner<K, V>>,
}

struct Inner<K, V> {
    global_depth: usize,
    bucket_size: usize,
    num_buckets: usize,
    /// Directory of 2^global_depth slots, each an index into the bucket
    /// arena. Many slots may point at the same bucket.
    dir: Vec<usize>,
    /// Bucket arena. A retired bucket's slot is reused by the low half of
    /// its split, so directory slots whose distinguishing bit is clear keep
    /// their index across a split.
    buckets: Vec<Option<Bucket<K, V>>>,
}

struct Bucket<K, V> {
    depth: usize,
    items: Vec<(K, V)>,
}

impl<K, V> Bucket<K, V> {
    fn new(depth: usize) -> Self {
        Bucket { depth, items: Vec::new() }
    }
}

impl<K, V> Inner<K, V> {
    fn mask(&self) -> usize {
        (1 << self.global_depth) - 1
    }

    fn bucket(&self, slot: usize) -> &Bucket<K, V> {
        self.buckets[self.dir[slot]].as_ref().expect("directory slot points at retired bucket")
    }
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq,
{
    /// Create a table with a single empty bucket of the given capacity and
    /// global depth zero.
    pub fn new(bucket_size: usize) -> Self {
        Self::with_hasher(bucket_size, RandomState::new())
    }
}

impl<K, V, S> ExtendibleHashTable<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn with_hasher(bucket_size: usize, hasher: S) -> Self {
        assert!(bucket_size > 0, "bucket size should be larger than zero");
        let inner = Inner {
            global_depth: 0,
            bucket_size,
            num_buckets: 1,
            dir: vec![0],
            buckets: vec![Some(Bucket::new(0))],
        };
        ExtendibleHashTable { hasher, inner: Mutex::new(inner) }
    }

    fn hash(&self, key: &K) -> usize {
        self.hasher.hash_one(key) as usize
    }

    /// Look up the value stored under the given key, None if absent.
    pub fn find(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        let inner = self.inner.lock().unwrap();
        let slot = self.hash(key) & inner.mask();
        let bucket = inner.bucket(slot);
        bucket.items.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
    }

    /// Remove the entry stored under the given key, returning whether it was
    /// present. Buckets are not merged and the directory does not shrink.
    pub fn remove(&self, key: &K) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let slot = self.hash(key) & inner.mask();
        let idx = inner.dir[slot];
        let bucket = inner.buckets[idx].as_mut().expect("directory slot points at retired bucket");
        let pos = bucket.items.iter().position(|(k, _)| k == key);
        match pos {
            Some(i) => {
                bucket.items.remove(i);
                true
            }
            None => false,
        }
    }

    /// Insert a key/value pair, overwriting the value in place if the key is
    /// already present. A full target bucket is split, doubling the directory
    /// when its local depth has reached the global depth; the split repeats
    /// while the chosen half remains full, so insertion cannot fail on
    /// capacity.
    pub fn insert(&self, key: K, value: V) {
        let mut inner = self.inner.lock().unwrap();
        loop {
            let slot = self.hash(&key) & inner.mask();
            let idx = inner.dir[slot];
            let bucket_size = inner.bucket_size;
            let bucket =
                inner.buckets[idx].as_mut().expect("directory slot points at retired bucket");
            if let Some((_, v)) = bucket.items.iter_mut().find(|(k, _)| *k == key) {
                *v = value;
                return;
            }
            if bucket.items.len() < bucket_size {
                bucket.items.push((key, value));
                return;
            }
            self.split(&mut inner, idx);
        }
    }

    /// Split the bucket at the given arena index in two, doubling the
    /// directory first when the bucket's local depth equals the global depth.
    /// Entries are redistributed on bit local_depth of their hash; directory
    /// slots that pointed at the retired bucket are rewritten to the matching
    /// half.
    fn split(&self, inner: &mut Inner<K, V>, idx: usize) {
        let local_depth =
            inner.buckets[idx].as_ref().expect("splitting a retired bucket").depth;
        if local_depth == inner.global_depth {
            // Double the directory: slot i + 2^global_depth aliases slot i.
            let cap = inner.dir.len();
            inner.dir.extend_from_within(0..cap);
            inner.global_depth += 1;
            debug!("hash directory doubled to global depth {}", inner.global_depth);
        }
        let mask = 1usize << local_depth;
        let old = inner.buckets[idx].take().expect("splitting a retired bucket");
        let mut zero = Bucket::new(local_depth + 1);
        let mut one = Bucket::new(local_depth + 1);
        for (k, v) in old.items {
            if self.hash(&k) & mask != 0 {
                one.items.push((k, v));
            } else {
                zero.items.push((k, v));
            }
        }
        let one_idx = inner.buckets.len();
        inner.buckets.push(Some(one));
        // The low half takes over the retired bucket's arena slot, so only
        // directory slots with the distinguishing bit set need rewriting.
        inner.buckets[idx] = Some(zero);
        for (i, slot) in inner.dir.iter_mut().enumerate() {
            if *slot == idx && i & mask != 0 {
                *slot = one_idx;
            }
        }
        inner.num_buckets += 1;
    }

    /// Current global depth of the directory.
    pub fn global_depth(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.global_depth
    }

    /// Local depth of the bucket the given directory slot points at.
    pub fn local_depth(&self, dir_index: usize) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.bucket(dir_index).depth
    }

    /// Number of live buckets, grows by exactly one per split.
    pub fn num_buckets(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.num_buckets
    }
}

#[cfg(test)]
mod tests {
    use std::hash::Hasher;
    use std::sync::Arc;

    use super::*;
    use crate::error::Result;

    /// Hashes an integer key to itself so tests control bucket placement.
    #[derive(Clone, Default)]
    struct IdentityState;

    struct IdentityHasher(u64);

    impl BuildHasher for IdentityState {
        type Hasher = IdentityHasher;

        fn build_hasher(&self) -> IdentityHasher {
            IdentityHasher(0)
        }
    }

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | b as u64;
            }
        }

        fn write_u64(&mut self, i: u64) {
            self.0 = i;
        }

        fn write_usize(&mut self, i: usize) {
            self.0 = i as u64;
        }
    }

    #[test]
    fn test_find_insert_remove() -> Result<()> {
        let table = ExtendibleHashTable::new(4);
        assert_eq!(None, table.find(&1u64));

        table.insert(1u64, "a");
        table.insert(2u64, "b");
        assert_eq!(Some("a"), table.find(&1));
        assert_eq!(Some("b"), table.find(&2));

        // update in place
        table.insert(1u64, "c");
        assert_eq!(Some("c"), table.find(&1));

        assert_eq!(true, table.remove(&1));
        assert_eq!(None, table.find(&1));
        assert_eq!(false, table.remove(&1));
        assert_eq!(Some("b"), table.find(&2));

        Ok(())
    }

    #[test]
    fn test_split_on_full_bucket() -> Result<()> {
        // bucket_size 2, identity hash. Inserting 1 and 5 fills the single
        // depth-0 bucket; inserting 9 doubles the directory and splits.
        let table = ExtendibleHashTable::with_hasher(2, IdentityState);
        table.insert(1u64, 1);
        table.insert(5u64, 5);
        assert_eq!(0, table.global_depth());
        assert_eq!(1, table.num_buckets());

        table.insert(9u64, 9);
        assert_eq!(Some(1), table.find(&1));
        assert_eq!(Some(5), table.find(&5));
        assert_eq!(Some(9), table.find(&9));

        // 1, 5, 9 are all odd: the odd half keeps splitting until bit 2
        // separates {1, 9} from {5}, so global depth lands at 2.
        assert_eq!(2, table.global_depth());
        assert_eq!(3, table.num_buckets());
        // Slot 1 holds {1, 9} at local depth 2, slot 3 holds {5} at local
        // depth 2, the even slots still share the depth-1 empty bucket.
        assert_eq!(2, table.local_depth(1));
        assert_eq!(2, table.local_depth(3));
        assert_eq!(1, table.local_depth(0));
        assert_eq!(1, table.local_depth(2));

        Ok(())
    }

    #[test]
    fn test_repeated_doubling_on_shared_low_bits() -> Result<()> {
        // 0, 8 and 16 agree on their low three bits, one insert triggers a
        // cascade of directory doublings until bit 3 separates them.
        let table = ExtendibleHashTable::with_hasher(2, IdentityState);
        table.insert(0u64, 0);
        table.insert(8u64, 8);
        table.insert(16u64, 16);
        assert_eq!(4, table.global_depth());
        assert_eq!(Some(0), table.find(&0));
        assert_eq!(Some(8), table.find(&8));
        assert_eq!(Some(16), table.find(&16));
        Ok(())
    }

    #[test]
    fn test_directory_aliasing_invariant() -> Result<()> {
        let table = ExtendibleHashTable::with_hasher(2, IdentityState);
        for k in 0..32u64 {
            table.insert(k, k);
        }
        let global_depth = table.global_depth();
        let dir_size = 1usize << global_depth;
        // Two slots agreeing on the low local-depth bits of either one must
        // point at a bucket of the same depth holding the same keys.
        for i in 0..dir_size {
            let depth = table.local_depth(i);
            assert!(depth <= global_depth);
            let j = i & ((1 << depth) - 1);
            assert_eq!(depth, table.local_depth(j));
        }
        for k in 0..32u64 {
            assert_eq!(Some(k), table.find(&k));
        }
        Ok(())
    }

    #[test]
    fn test_global_depth_monotone_and_bucket_count() -> Result<()> {
        let table = ExtendibleHashTable::with_hasher(2, IdentityState);
        let mut last_depth = table.global_depth();
        let mut last_buckets = table.num_buckets();
        for k in 0..64u64 {
            table.insert(k, ());
            let depth = table.global_depth();
            let buckets = table.num_buckets();
            assert!(depth >= last_depth);
            assert!(buckets >= last_buckets);
            last_depth = depth;
            last_buckets = buckets;
        }
        Ok(())
    }

    #[test]
    fn test_concurrent_insert_find() -> Result<()> {
        let table = Arc::new(ExtendibleHashTable::new(4));
        let mut handles = Vec::new();
        for t in 0..4u64 {
            let table = Arc::clone(&table);
            handles.push(std::thread::spawn(move || {
                for k in (t * 100)..(t * 100 + 100) {
                    table.insert(k, k * 2);
                    // Readers racing with other threads' splits must never
                    // observe a torn directory.
                    assert_eq!(Some(k * 2), table.find(&k));
                }
            }));
        }
        for handle in handles {
            handle.join().expect("insert thread panicked");
        }
        for k in 0..400u64 {
            assert_eq!(Some(k * 2), table.find(&k));
        }
        Ok(())
    }
}
