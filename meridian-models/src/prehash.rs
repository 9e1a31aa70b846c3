// Copyright (c) 2022 MASSA LABS <info@massa.net>

use std::collections::{HashMap, HashSet};
use std::hash::{BuildHasherDefault, Hasher};
use std::marker::PhantomData;

impl PreHashed for meridian_hash::Hash {}

/// A trait indicating that its carrier is already a hash with at least 64 bits
/// and doesn't need to be re-hashed for hash-table purposes
pub trait PreHashed {}

/// A `Hasher` for `PreHashed` keys that is faster because it avoids re-hashing
/// hashes, and simply truncates them to their last 8 bytes instead.
pub struct HashMapper<T: PreHashed> {
    source: PhantomData<T>,
    hash: u64,
}

/// Default implementation for `HashMapper` (zero hash)
impl<T: PreHashed> Default for HashMapper<T> {
    fn default() -> Self {
        HashMapper {
            source: Default::default(),
            hash: Default::default(),
        }
    }
}

/// `Hasher` implementation for `HashMapper`
impl<T: PreHashed> Hasher for HashMapper<T> {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    /// Write the bytes of a `PreHashed` key into the `HashMapper`.
    /// Panics if `bytes.len()` is strictly lower than 8.
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.hash = u64::from_ne_bytes(
            bytes[bytes.len().checked_sub(8).unwrap()..]
                .try_into()
                .unwrap(),
        );
    }
}

/// `BuildHasherDefault` specialization for `HashMapper`
pub type BuildHashMapper<T> = BuildHasherDefault<HashMapper<T>>;

/// `HashMap` specialization for `PreHashed` keys
pub type PreHashMap<K, V> = HashMap<K, V, BuildHashMapper<K>>;

/// `HashSet` specialization for `PreHashed` keys
pub type PreHashSet<T> = HashSet<T, BuildHashMapper<T>>;

/// Trait allowing pre-allocations
pub trait CapacityAllocator {
    /// pre-allocate with a given capacity
    fn with_capacity(capacity: usize) -> Self;
}

impl<K: PreHashed, V> CapacityAllocator for PreHashMap<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        PreHashMap::with_capacity_and_hasher(capacity, BuildHashMapper::default())
    }
}

impl<K: PreHashed> CapacityAllocator for PreHashSet<K> {
    fn with_capacity(capacity: usize) -> Self {
        PreHashSet::with_capacity_and_hasher(capacity, BuildHashMapper::default())
    }
}
