//! Per-class dispatch tables

use crate::imp::Imp;
use crate::selector::Sel;
use crate::sparse::SparseArray;

/// A class's selector → implementation table.
///
/// Built by copying the superclass's table and overlaying the class's own
/// methods. Each class owns its table outright; once published it is never
/// mutated, a rebuild publishes a fresh one.
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    entries: SparseArray<Imp>,
}

impl DispatchTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a table from a deep copy of `parent`
    pub fn inherit(parent: Option<&DispatchTable>) -> Self {
        parent.cloned().unwrap_or_default()
    }

    /// Look up the implementation for `sel`
    #[inline]
    pub fn get(&self, sel: Sel) -> Option<&Imp> {
        self.entries.get(sel.uid())
    }

    /// Check whether `sel` has an implementation
    pub fn contains(&self, sel: Sel) -> bool {
        self.get(sel).is_some()
    }

    pub(crate) fn set(&mut self, sel: Sel, imp: Imp) {
        self.entries.set(sel.uid(), imp);
    }

    /// Iterate implemented selectors in uid order
    pub fn iter(&self) -> impl Iterator<Item = (Sel, &Imp)> {
        self.entries.iter().map(|(uid, imp)| (Sel::from_uid(uid), imp))
    }

    /// Number of implemented selectors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no selector is implemented
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of allocated leaf arrays in the sparse index
    pub fn leaf_count(&self) -> usize {
        self.entries.leaf_count()
    }
}

/// Tables are equal when they map the same selectors to the same implementations
impl PartialEq for DispatchTable {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn imp(n: i64) -> Imp {
        Imp::new(move |_| Ok(Value::Int(n)))
    }

    #[test]
    fn test_inherit_copies_entries() {
        let mut parent = DispatchTable::new();
        let a = imp(1);
        parent.set(Sel::from_uid(1), a.clone());

        let mut child = DispatchTable::inherit(Some(&parent));
        assert_eq!(child, parent);

        child.set(Sel::from_uid(2), imp(2));
        assert!(child.contains(Sel::from_uid(2)));
        assert!(!parent.contains(Sel::from_uid(2)));
        assert_eq!(child.get(Sel::from_uid(1)), Some(&a));
    }

    #[test]
    fn test_equality_is_by_implementation_identity() {
        let mut a = DispatchTable::new();
        let mut b = DispatchTable::new();
        a.set(Sel::from_uid(5), imp(5));
        b.set(Sel::from_uid(5), imp(5));
        assert_ne!(a, b);
    }

    #[test]
    fn test_root_table_starts_empty() {
        let table = DispatchTable::inherit(None);
        assert!(table.is_empty());
        assert_eq!(table.leaf_count(), 0);
    }
}
