//! String-keyed open-addressed hash table
//!
//! Linear probing over a power-of-two bucket array. The table doubles once an
//! insert would push the load factor past 3/4. Keys are never removed
//! individually; [`StringTable::clear`] drops everything at teardown.

use std::sync::Arc;

/// One-at-a-time hash over the bytes of `key`
pub fn hash_string(key: &str) -> u32 {
    let mut hash: u32 = 0;
    for &byte in key.as_bytes() {
        hash = hash.wrapping_add(byte as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

#[derive(Debug, Clone)]
struct Bucket<V> {
    key: Arc<str>,
    hash: u32,
    value: V,
}

/// Open-addressed table from interned strings to `V`
#[derive(Debug, Clone)]
pub struct StringTable<V> {
    buckets: Vec<Option<Bucket<V>>>,
    count: usize,
}

impl<V> StringTable<V> {
    /// Create a table with at least `capacity` buckets (rounded up to a power of two)
    pub fn with_capacity(capacity: usize) -> Self {
        let size = capacity.max(2).next_power_of_two();
        Self {
            buckets: Self::empty_buckets(size),
            count: 0,
        }
    }

    fn empty_buckets(size: usize) -> Vec<Option<Bucket<V>>> {
        let mut buckets = Vec::with_capacity(size);
        buckets.resize_with(size, || None);
        buckets
    }

    #[inline]
    fn mask(&self) -> usize {
        self.buckets.len() - 1
    }

    fn find_slot(&self, key: &str, hash: u32) -> Result<usize, usize> {
        let mask = self.mask();
        let mut idx = hash as usize & mask;
        loop {
            match &self.buckets[idx] {
                None => return Err(idx),
                Some(bucket) if bucket.hash == hash && &*bucket.key == key => return Ok(idx),
                Some(_) => idx = (idx + 1) & mask,
            }
        }
    }

    fn grow(&mut self) {
        let size = self.buckets.len() * 2;
        let old = std::mem::replace(&mut self.buckets, Self::empty_buckets(size));
        let mask = size - 1;
        for bucket in old.into_iter().flatten() {
            let mut idx = bucket.hash as usize & mask;
            while self.buckets[idx].is_some() {
                idx = (idx + 1) & mask;
            }
            self.buckets[idx] = Some(bucket);
        }
    }

    /// Insert `value` under `key`, returning the previous value if any
    pub fn insert(&mut self, key: Arc<str>, value: V) -> Option<V> {
        let hash = hash_string(&key);
        if let Ok(idx) = self.find_slot(&key, hash) {
            return self.buckets[idx]
                .as_mut()
                .map(|bucket| std::mem::replace(&mut bucket.value, value));
        }

        if (self.count + 1) * 4 > self.buckets.len() * 3 {
            self.grow();
        }

        let idx = match self.find_slot(&key, hash) {
            Ok(idx) | Err(idx) => idx,
        };
        self.buckets[idx] = Some(Bucket { key, hash, value });
        self.count += 1;
        None
    }

    /// Look up `key`
    pub fn get(&self, key: &str) -> Option<&V> {
        let hash = hash_string(key);
        let idx = self.find_slot(key, hash).ok()?;
        self.buckets[idx].as_ref().map(|bucket| &bucket.value)
    }

    /// Look up the stored key and value for `key`
    pub fn get_key_value(&self, key: &str) -> Option<(&Arc<str>, &V)> {
        let hash = hash_string(key);
        let idx = self.find_slot(key, hash).ok()?;
        self.buckets[idx]
            .as_ref()
            .map(|bucket| (&bucket.key, &bucket.value))
    }

    /// Check whether `key` is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Number of buckets currently allocated
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Drop every entry, keeping the current bucket count
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = None;
        }
        self.count = 0;
    }

    /// Iterate over all entries in bucket order
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &V)> {
        self.buckets
            .iter()
            .flatten()
            .map(|bucket| (&bucket.key, &bucket.value))
    }
}

impl<V> Default for StringTable<V> {
    fn default() -> Self {
        Self::with_capacity(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_values() {
        assert_eq!(hash_string(""), 0);
        // One-at-a-time reference value for "a"
        assert_eq!(hash_string("a"), 0xca2e_9442);
        assert_ne!(hash_string("init"), hash_string("tini"));
    }

    #[test]
    fn test_insert_and_get() {
        let mut table = StringTable::with_capacity(4);
        assert_eq!(table.insert("alloc".into(), 1), None);
        assert_eq!(table.insert("init".into(), 2), None);

        assert_eq!(table.get("alloc"), Some(&1));
        assert_eq!(table.get("init"), Some(&2));
        assert_eq!(table.get("release"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_insert_replaces() {
        let mut table = StringTable::default();
        table.insert("retain".into(), 1);
        assert_eq!(table.insert("retain".into(), 5), Some(1));
        assert_eq!(table.get("retain"), Some(&5));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_grows_past_three_quarters() {
        let mut table = StringTable::with_capacity(4);
        for i in 0..3 {
            table.insert(format!("sel{}", i).into(), i);
        }
        assert_eq!(table.capacity(), 4);

        table.insert("sel3".into(), 3);
        assert_eq!(table.capacity(), 8);

        for i in 0..200 {
            table.insert(format!("key{}:", i).into(), i);
        }
        assert!(table.len() * 4 <= table.capacity() * 3);
        for i in 0..200 {
            assert_eq!(table.get(&format!("key{}:", i)), Some(&i));
        }
    }

    #[test]
    fn test_clear() {
        let mut table = StringTable::default();
        table.insert("a".into(), ());
        table.clear();
        assert!(table.is_empty());
        assert!(!table.contains_key("a"));
        assert_eq!(table.iter().count(), 0);
    }
}
