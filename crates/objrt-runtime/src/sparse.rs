//! Sparse dispatch index
//!
//! A fixed fan-out (256) trie keyed by selector uid. With 16-bit uids the trie
//! has two levels; the `seluid24` feature switches to three levels and 24-bit
//! uids. Levels below the root are allocated on first write, so memory follows
//! the set of uids actually stored rather than the whole uid space.
//!
//! `Clone` is a deep copy of every allocated level: two arrays never share
//! level storage.
//!
//! uids above [`MAX_SELECTOR_UID`] are outside the index: reads and removals
//! miss, and storing one aborts.

use crate::selector::MAX_SELECTOR_UID;

/// Entries per level
pub const FAN_OUT: usize = 256;

type Leaf<T> = [Option<T>; FAN_OUT];

#[cfg(feature = "seluid24")]
type Mid<T> = [Option<Box<Leaf<T>>>; FAN_OUT];

#[cfg(not(feature = "seluid24"))]
type Top<T> = [Option<Box<Leaf<T>>>; FAN_OUT];

#[cfg(feature = "seluid24")]
type Top<T> = [Option<Box<Mid<T>>>; FAN_OUT];

fn new_level<L>() -> Box<[Option<L>; FAN_OUT]> {
    Box::new(std::array::from_fn(|_| None))
}

/// Radix-256 sparse array from uid to `T`
#[derive(Clone)]
pub struct SparseArray<T> {
    buckets: Box<Top<T>>,
}

impl<T> SparseArray<T> {
    /// Create an empty array
    pub fn new() -> Self {
        Self {
            buckets: new_level(),
        }
    }

    /// Get the entry for `uid`
    #[cfg(not(feature = "seluid24"))]
    #[inline]
    pub fn get(&self, uid: u32) -> Option<&T> {
        if uid > MAX_SELECTOR_UID {
            return None;
        }
        let i = ((uid >> 8) & 0xFF) as usize;
        let j = (uid & 0xFF) as usize;
        self.buckets[i].as_ref()?[j].as_ref()
    }

    /// Get the entry for `uid`
    #[cfg(feature = "seluid24")]
    #[inline]
    pub fn get(&self, uid: u32) -> Option<&T> {
        if uid > MAX_SELECTOR_UID {
            return None;
        }
        let i = ((uid >> 16) & 0xFF) as usize;
        let j = ((uid >> 8) & 0xFF) as usize;
        let k = (uid & 0xFF) as usize;
        self.buckets[i].as_ref()?[j].as_ref()?[k].as_ref()
    }

    /// Store `value` under `uid`, allocating levels on the way down.
    /// Returns the entry it replaced.
    #[cfg(not(feature = "seluid24"))]
    pub fn set(&mut self, uid: u32, value: T) -> Option<T> {
        if uid > MAX_SELECTOR_UID {
            fatal!("uid {:#x} is outside the dispatch index", uid);
        }
        let i = ((uid >> 8) & 0xFF) as usize;
        let j = (uid & 0xFF) as usize;
        let leaf = self.buckets[i].get_or_insert_with(new_level);
        leaf[j].replace(value)
    }

    /// Store `value` under `uid`, allocating levels on the way down.
    /// Returns the entry it replaced.
    #[cfg(feature = "seluid24")]
    pub fn set(&mut self, uid: u32, value: T) -> Option<T> {
        if uid > MAX_SELECTOR_UID {
            fatal!("uid {:#x} is outside the dispatch index", uid);
        }
        let i = ((uid >> 16) & 0xFF) as usize;
        let j = ((uid >> 8) & 0xFF) as usize;
        let k = (uid & 0xFF) as usize;
        let mid = self.buckets[i].get_or_insert_with(new_level);
        let leaf = mid[j].get_or_insert_with(new_level);
        leaf[k].replace(value)
    }

    /// Clear the entry for `uid`. Levels stay allocated.
    #[cfg(not(feature = "seluid24"))]
    pub fn remove(&mut self, uid: u32) -> Option<T> {
        if uid > MAX_SELECTOR_UID {
            return None;
        }
        let i = ((uid >> 8) & 0xFF) as usize;
        let j = (uid & 0xFF) as usize;
        self.buckets[i].as_mut()?[j].take()
    }

    /// Clear the entry for `uid`. Levels stay allocated.
    #[cfg(feature = "seluid24")]
    pub fn remove(&mut self, uid: u32) -> Option<T> {
        if uid > MAX_SELECTOR_UID {
            return None;
        }
        let i = ((uid >> 16) & 0xFF) as usize;
        let j = ((uid >> 8) & 0xFF) as usize;
        let k = (uid & 0xFF) as usize;
        self.buckets[i].as_mut()?[j].as_mut()?[k].take()
    }

    /// Allocated leaves with the uid of their first slot
    #[cfg(not(feature = "seluid24"))]
    fn leaves(&self) -> impl Iterator<Item = (u32, &Leaf<T>)> {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(i, leaf)| leaf.as_deref().map(|leaf| ((i as u32) << 8, leaf)))
    }

    /// Allocated leaves with the uid of their first slot
    #[cfg(feature = "seluid24")]
    fn leaves(&self) -> impl Iterator<Item = (u32, &Leaf<T>)> {
        self.buckets
            .iter()
            .enumerate()
            .filter_map(|(i, mid)| mid.as_deref().map(|mid| (i as u32, mid)))
            .flat_map(|(i, mid)| {
                mid.iter().enumerate().filter_map(move |(j, leaf)| {
                    leaf.as_deref().map(|leaf| ((i << 16) | ((j as u32) << 8), leaf))
                })
            })
    }

    /// Iterate populated entries in uid order
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.leaves().flat_map(|(base, leaf)| {
            leaf.iter()
                .enumerate()
                .filter_map(move |(k, slot)| slot.as_ref().map(|v| (base | k as u32, v)))
        })
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// Whether no entry is populated
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Number of allocated leaf levels
    pub fn leaf_count(&self) -> usize {
        self.leaves().count()
    }
}

impl<T: Clone> SparseArray<T> {
    /// Overlay every populated entry of `self` onto `dst`
    pub fn copy_into(&self, dst: &mut SparseArray<T>) {
        for (uid, value) in self.iter() {
            dst.set(uid, value.clone());
        }
    }
}

impl<T> Default for SparseArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SparseArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unallocated_levels_miss() {
        let array: SparseArray<u32> = SparseArray::new();
        assert_eq!(array.get(0), None);
        assert_eq!(array.get(1), None);
        assert_eq!(array.get(0xFFFF), None);
        assert_eq!(array.leaf_count(), 0);
        assert!(array.is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let mut array = SparseArray::new();
        assert_eq!(array.set(1, "one"), None);
        assert_eq!(array.set(0x1234, "big"), None);

        assert_eq!(array.get(1), Some(&"one"));
        assert_eq!(array.get(0x1234), Some(&"big"));
        assert_eq!(array.get(2), None);
        assert_eq!(array.get(0x1235), None);
        assert_eq!(array.len(), 2);
    }

    #[test]
    fn test_overwrite_returns_previous() {
        let mut array = SparseArray::new();
        array.set(7, 1);
        assert_eq!(array.set(7, 2), Some(1));
        assert_eq!(array.get(7), Some(&2));
        assert_eq!(array.len(), 1);
        assert_eq!(array.leaf_count(), 1);
    }

    #[test]
    fn test_leaf_allocation_follows_used_uids() {
        let mut array = SparseArray::new();
        for uid in 1..=255 {
            array.set(uid, uid);
        }
        assert_eq!(array.leaf_count(), 1);

        array.set(256, 256);
        assert_eq!(array.leaf_count(), 2);

        array.set(0x8000, 0);
        assert_eq!(array.leaf_count(), 3);
    }

    #[test]
    fn test_clone_is_deep() {
        let mut parent = SparseArray::new();
        parent.set(3, "parent");

        let mut child = parent.clone();
        child.set(3, "child");
        child.set(4, "extra");

        assert_eq!(parent.get(3), Some(&"parent"));
        assert_eq!(parent.get(4), None);
        assert_eq!(child.get(3), Some(&"child"));
    }

    #[test]
    fn test_copy_into_overlays() {
        let mut src = SparseArray::new();
        src.set(1, 'a');
        src.set(300, 'b');

        let mut dst = SparseArray::new();
        dst.set(1, 'x');
        dst.set(2, 'y');
        src.copy_into(&mut dst);

        assert_eq!(dst.get(1), Some(&'a'));
        assert_eq!(dst.get(2), Some(&'y'));
        assert_eq!(dst.get(300), Some(&'b'));
    }

    #[test]
    fn test_iter_in_uid_order() {
        let mut array = SparseArray::new();
        array.set(513, 3);
        array.set(2, 1);
        array.set(256, 2);

        let uids: Vec<u32> = array.iter().map(|(uid, _)| uid).collect();
        assert_eq!(uids, vec![2, 256, 513]);
    }

    #[test]
    fn test_uids_past_the_index_miss() {
        let mut array = SparseArray::new();
        array.set(1, "one");
        array.set(MAX_SELECTOR_UID, "last");

        assert_eq!(array.get(MAX_SELECTOR_UID), Some(&"last"));
        assert_eq!(array.get(MAX_SELECTOR_UID + 2), None);
        assert_eq!(array.get(u32::MAX), None);
        assert_eq!(array.remove(MAX_SELECTOR_UID + 2), None);
        assert_eq!(array.get(1), Some(&"one"));
    }

    #[cfg(feature = "seluid24")]
    #[test]
    fn test_three_level_uids() {
        let mut array = SparseArray::new();
        array.set(0xFF_FFFF, 'z');
        array.set(0x12_3456, 'b');
        array.set(0x12_3401, 'a');
        array.set(0x01_0000, 'c');

        assert_eq!(array.get(0x12_3456), Some(&'b'));
        assert_eq!(array.get(0xFF_FFFF), Some(&'z'));
        assert_eq!(array.get(0x12_3457), None);
        assert_eq!(array.get(0x02_3456), None);
        assert_eq!(array.get(0x3456), None);
        assert_eq!(array.leaf_count(), 3);

        let uids: Vec<u32> = array.iter().map(|(uid, _)| uid).collect();
        assert_eq!(uids, vec![0x01_0000, 0x12_3401, 0x12_3456, 0xFF_FFFF]);

        let copy = array.clone();
        assert_eq!(array.remove(0x12_3456), Some('b'));
        assert_eq!(copy.get(0x12_3456), Some(&'b'));
        assert_eq!(array.leaf_count(), 3);
    }

    #[test]
    fn test_remove() {
        let mut array = SparseArray::new();
        array.set(9, 9);
        assert_eq!(array.remove(9), Some(9));
        assert_eq!(array.remove(9), None);
        assert_eq!(array.remove(0x4000), None);
        assert_eq!(array.get(9), None);
    }
}
