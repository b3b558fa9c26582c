//! Categories
//!
//! A category adds methods and protocols to a class declared elsewhere. It is
//! identified by `(class name, category name)`; applying the same category
//! again replaces its earlier contribution in place, keeping its position in
//! the application order.
//!
//! Categories whose class is not registered yet are held back and merged
//! when the class registers, before its first dispatch table is built.

use crate::class::{ClassKind, MethodDescriptor};
use crate::imp::Imp;
use crate::protocol::Protocol;
use crate::registry::{ClassRegistry, MethodEntry};
use crate::selector::Sel;
use std::sync::Arc;

/// Everything needed to apply a category
#[derive(Debug, Clone)]
pub struct CategoryDescriptor {
    /// Category name
    pub name: String,
    /// Name of the class the category extends
    pub class_name: String,
    /// Instance-side methods
    pub instance_methods: Vec<MethodDescriptor>,
    /// Class-side methods
    pub class_methods: Vec<MethodDescriptor>,
    /// Protocols added to the class
    pub protocols: Vec<Arc<Protocol>>,
}

impl CategoryDescriptor {
    /// Create an empty category named `name` on `class_name`
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            instance_methods: Vec::new(),
            class_methods: Vec::new(),
            protocols: Vec::new(),
        }
    }

    /// Add an instance method
    pub fn method(mut self, name: &str, imp: Imp) -> Self {
        self.instance_methods
            .push(MethodDescriptor::new(name, None, imp));
        self
    }

    /// Add a class method
    pub fn class_method(mut self, name: &str, imp: Imp) -> Self {
        self.class_methods.push(MethodDescriptor::new(name, None, imp));
        self
    }

    /// Add a protocol
    pub fn protocol(mut self, protocol: Arc<Protocol>) -> Self {
        self.protocols.push(protocol);
        self
    }
}

/// Whether a category reached its class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CategoryStatus {
    /// Merged into the registered class
    Applied,
    /// Held until the class registers
    Pending,
}

/// A category after its selectors have been interned
#[derive(Debug, Clone)]
pub(crate) struct CategoryContribution {
    pub name: Arc<str>,
    pub class_name: Arc<str>,
    pub instance_methods: Vec<MethodEntry>,
    pub class_methods: Vec<MethodEntry>,
    pub protocols: Vec<Arc<Protocol>>,
}

impl CategoryContribution {
    pub fn methods(&self, kind: ClassKind) -> &[MethodEntry] {
        match kind {
            ClassKind::Class => &self.instance_methods,
            ClassKind::Metaclass => &self.class_methods,
        }
    }

    pub fn methods_mut(&mut self, kind: ClassKind) -> &mut Vec<MethodEntry> {
        match kind {
            ClassKind::Class => &mut self.instance_methods,
            ClassKind::Metaclass => &mut self.class_methods,
        }
    }

    pub fn defines(&self, kind: ClassKind, sel: Sel) -> bool {
        self.methods(kind).iter().any(|m| m.sel == sel)
    }
}

/// Put `category` into `list`, replacing an earlier contribution of the same name
fn merge_into(list: &mut Vec<CategoryContribution>, category: CategoryContribution) {
    match list.iter_mut().find(|c| c.name == category.name) {
        Some(existing) => *existing = category,
        None => list.push(category),
    }
}

impl ClassRegistry {
    /// Merge a category into its class, or hold it until the class registers
    pub(crate) fn apply_category(&mut self, category: CategoryContribution) -> CategoryStatus {
        let Some(id) = self.id_of(&category.class_name) else {
            tracing::debug!(
                category = %category.name,
                class = %category.class_name,
                "category waiting for class"
            );
            let pending = self
                .pending_categories
                .entry(category.class_name.clone())
                .or_default();
            merge_into(pending, category);
            return CategoryStatus::Pending;
        };

        let Some(record) = self.record_mut(id) else {
            return CategoryStatus::Pending;
        };
        tracing::debug!(
            category = %category.name,
            class = %category.class_name,
            "category applied"
        );
        merge_into(&mut record.categories, category);
        self.rebuild(id);
        CategoryStatus::Applied
    }

    /// Number of categories waiting for their class
    pub fn pending_category_count(&self) -> usize {
        self.pending_categories.values().map(Vec::len).sum()
    }

    /// `(class, category)` names of every category still waiting, sorted
    pub(crate) fn orphan_categories(&self) -> Vec<(String, String)> {
        let mut orphans: Vec<(String, String)> = self
            .pending_categories
            .values()
            .flatten()
            .map(|c| (c.class_name.to_string(), c.name.to_string()))
            .collect();
        orphans.sort();
        orphans
    }
}
