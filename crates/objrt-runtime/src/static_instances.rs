//! Static instances
//!
//! Object literals emitted by the compiler start without a class reference.
//! They are bound once their class links; until then they wait here, keyed by
//! class name.

use crate::class::ClassRef;
use crate::value::ObjectRef;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Literals waiting for their class to link
#[derive(Debug, Default)]
pub(crate) struct StaticInstanceQueue {
    pending: FxHashMap<Arc<str>, Vec<ObjectRef>>,
}

impl StaticInstanceQueue {
    /// Queue literals for `class_name`. A literal already waiting is not
    /// queued twice.
    pub fn enqueue(&mut self, class_name: &str, objects: Vec<ObjectRef>) {
        if objects.is_empty() {
            return;
        }
        let waiting = self.pending.entry(Arc::from(class_name)).or_default();
        for object in objects {
            if !waiting.iter().any(|w| Arc::ptr_eq(w, &object)) {
                waiting.push(object);
            }
        }
    }

    pub fn take(&mut self, class_name: &str) -> Vec<ObjectRef> {
        self.pending.remove(class_name).unwrap_or_default()
    }

    /// Number of literals still waiting
    pub fn len(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Drop every waiting literal, returning `(class name, count)` sorted by name
    pub fn forget_all(&mut self) -> Vec<(String, usize)> {
        let mut forgotten: Vec<(String, usize)> = self
            .pending
            .drain()
            .map(|(name, objects)| (name.to_string(), objects.len()))
            .collect();
        forgotten.sort();
        forgotten
    }
}

/// Bind each literal to `class`. Literals that already have a class are left
/// alone. Returns how many were bound.
pub(crate) fn bind_all(class: &ClassRef, objects: &[ObjectRef]) -> usize {
    objects
        .iter()
        .filter(|object| object.bind(class.clone()))
        .count()
}
