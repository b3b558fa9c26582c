//! Class registry and linker
//!
//! Classes live in an arena indexed by [`ClassId`]. A class whose superclass
//! is not linked yet waits in `pending_links` under the awaited name; linking
//! a class releases its waiters, and the cascade continues iteratively until
//! nothing more can link. Dispatch tables are built as each class links and
//! rebuilt, parents before children, whenever a method set changes.

use crate::category::CategoryContribution;
use crate::class::{Class, ClassId, ClassKind, ClassRef, ClassState};
use crate::dtable::DispatchTable;
use crate::imp::Imp;
use crate::options::CategoryConflictPolicy;
use crate::protocol::Protocol;
use crate::selector::Sel;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

/// Class registry errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A live class already has this name
    #[error("Class already registered: {0}")]
    DuplicateClass(String),

    /// No class with this name (or this handle) is registered
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// The class is registered but still waiting for its superclass
    #[error("Class not linked: {0}")]
    ClassNotLinked(String),

    /// The selector was not handed out by this runtime
    #[error("Unknown selector {0:?}")]
    UnknownSelector(Sel),
}

/// A class still waiting for its superclass when the runtime shut down
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Class {class} was never linked: superclass {superclass} did not resolve")]
pub struct UnresolvedSuperclassError {
    /// The pending class
    pub class: String,
    /// The superclass name it was waiting for
    pub superclass: String,
}

/// A method as stored in a class or category method list
#[derive(Debug, Clone)]
pub(crate) struct MethodEntry {
    pub sel: Sel,
    pub types: Option<Arc<str>>,
    pub imp: Imp,
}

/// A class descriptor after its selectors have been interned
#[derive(Debug)]
pub(crate) struct ResolvedClass {
    pub name: Arc<str>,
    pub superclass: Option<Arc<str>>,
    pub instance_size: u32,
    pub instance_methods: Vec<MethodEntry>,
    pub class_methods: Vec<MethodEntry>,
    pub protocols: Vec<Arc<Protocol>>,
}

#[derive(Debug)]
pub(crate) struct ClassRecord {
    pub class: ClassRef,
    pub meta: ClassRef,
    pub superclass_name: Option<Arc<str>>,
    pub superclass: Option<ClassId>,
    pub state: ClassState,
    pub instance_methods: Vec<MethodEntry>,
    pub class_methods: Vec<MethodEntry>,
    pub protocols: Vec<Arc<Protocol>>,
    /// Merged categories in application order
    pub categories: Vec<CategoryContribution>,
    /// Linked direct subclasses
    pub subclasses: Vec<ClassId>,
}

impl ClassRecord {
    pub fn methods(&self, kind: ClassKind) -> &Vec<MethodEntry> {
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

    pub fn handle(&self, kind: ClassKind) -> &ClassRef {
        match kind {
            ClassKind::Class => &self.class,
            ClassKind::Metaclass => &self.meta,
        }
    }

    /// Whether the class itself (own list or a merged category) defines `sel`
    pub fn defines(&self, kind: ClassKind, sel: Sel) -> bool {
        self.methods(kind).iter().any(|m| m.sel == sel)
            || self.categories.iter().any(|c| c.defines(kind, sel))
    }

    fn adopts(&self, protocol: &str) -> bool {
        self.protocols
            .iter()
            .chain(self.categories.iter().flat_map(|c| c.protocols.iter()))
            .any(|p| p.conforms_to(protocol))
    }
}

/// Registry of all loaded classes
#[derive(Debug)]
pub struct ClassRegistry {
    records: Vec<Option<ClassRecord>>,
    names: FxHashMap<Arc<str>, ClassId>,
    /// Superclass name → classes waiting for it
    pending_links: FxHashMap<Arc<str>, Vec<ClassId>>,
    /// Target class name → categories waiting for it
    pub(crate) pending_categories: FxHashMap<Arc<str>, Vec<CategoryContribution>>,
    category_policy: CategoryConflictPolicy,
    dtable_builds: u64,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new(category_policy: CategoryConflictPolicy) -> Self {
        Self {
            records: Vec::new(),
            names: FxHashMap::default(),
            pending_links: FxHashMap::default(),
            pending_categories: FxHashMap::default(),
            category_policy,
            dtable_builds: 0,
        }
    }

    pub(crate) fn record(&self, id: ClassId) -> Option<&ClassRecord> {
        self.records.get(id.index()).and_then(Option::as_ref)
    }

    pub(crate) fn record_mut(&mut self, id: ClassId) -> Option<&mut ClassRecord> {
        self.records.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Id of the class registered under `name`
    pub fn id_of(&self, name: &str) -> Option<ClassId> {
        self.names.get(name).copied()
    }

    /// Find the record a handle belongs to. Stale handles (unregistered
    /// classes, or classes from before a shutdown) are rejected.
    pub(crate) fn resolve(&self, class: &ClassRef) -> Result<ClassId, RegistryError> {
        match self.record(class.id()) {
            Some(record) if Arc::ptr_eq(record.handle(class.kind()), class) => Ok(class.id()),
            _ => Err(RegistryError::ClassNotFound(class.name().to_string())),
        }
    }

    /// Link state of the class registered under `name`
    pub fn state_of(&self, name: &str) -> Option<ClassState> {
        self.id_of(name)
            .and_then(|id| self.record(id))
            .map(|record| record.state)
    }

    /// The class registered under `name`, if it is linked
    pub fn class_for_name(&self, name: &str) -> Option<ClassRef> {
        let record = self.record(self.id_of(name)?)?;
        (record.state == ClassState::Linked).then(|| record.class.clone())
    }

    /// Fail if `name` is already taken
    pub(crate) fn check_available(&self, name: &str) -> Result<(), RegistryError> {
        if self.names.contains_key(name) {
            return Err(RegistryError::DuplicateClass(name.to_string()));
        }
        Ok(())
    }

    /// Register a class. Returns its handle and every class that linked as a
    /// consequence, in link order.
    pub(crate) fn register(
        &mut self,
        class: ResolvedClass,
    ) -> Result<(ClassRef, Vec<ClassId>), RegistryError> {
        self.check_available(&class.name)?;

        let id = ClassId(self.records.len() as u32);
        let handle = Class::new_pair(id, class.name.clone(), class.instance_size);
        let Some(meta) = handle.metaclass().cloned() else {
            fatal!("class {} was created without a metaclass", class.name);
        };

        let categories = self
            .pending_categories
            .remove(&*class.name)
            .unwrap_or_default();

        self.records.push(Some(ClassRecord {
            class: handle.clone(),
            meta,
            superclass_name: class.superclass.clone(),
            superclass: None,
            state: ClassState::Pending,
            instance_methods: class.instance_methods,
            class_methods: class.class_methods,
            protocols: class.protocols,
            categories,
            subclasses: Vec::new(),
        }));
        self.names.insert(class.name.clone(), id);

        let ready = match &class.superclass {
            None => true,
            Some(superclass) => self.state_of(superclass) == Some(ClassState::Linked),
        };

        if ready {
            return Ok((handle, self.link(id)));
        }

        if let Some(superclass) = class.superclass {
            tracing::debug!(
                class = %class.name,
                superclass = %superclass,
                "class waiting for superclass"
            );
            self.pending_links.entry(superclass).or_default().push(id);
        }
        Ok((handle, Vec::new()))
    }

    /// Link `id` and everything waiting on it, transitively
    fn link(&mut self, id: ClassId) -> Vec<ClassId> {
        let mut linked = Vec::new();
        let mut queue = VecDeque::from([id]);

        while let Some(next) = queue.pop_front() {
            let Some(name) = self.link_one(next) else {
                continue;
            };
            linked.push(next);
            if let Some(waiters) = self.pending_links.remove(&*name) {
                queue.extend(waiters);
            }
        }

        linked
    }

    /// Resolve the superclass of a pending class and build its tables
    fn link_one(&mut self, id: ClassId) -> Option<Arc<str>> {
        let record = self.record(id)?;
        if record.state == ClassState::Linked {
            return None;
        }
        let name: Arc<str> = Arc::from(record.class.name());
        let class = record.class.clone();
        let meta = record.meta.clone();

        let superclass = match record.superclass_name.clone() {
            None => None,
            Some(superclass_name) => {
                let parent_id = self.id_of(&superclass_name);
                match parent_id.and_then(|pid| self.record(pid).map(|p| (pid, p))) {
                    Some((pid, parent)) if parent.state == ClassState::Linked => {
                        class.set_superclass(&parent.class);
                        meta.set_superclass(&parent.meta);
                        if let Some(isa) = parent.meta.isa_weak() {
                            meta.set_isa(isa);
                        }
                        Some(pid)
                    }
                    _ => fatal!(
                        "class {} released before superclass {} linked",
                        name,
                        superclass_name
                    ),
                }
            }
        };

        if superclass.is_none() {
            meta.set_superclass(&class);
            meta.set_isa(Arc::downgrade(&meta));
        }

        if let Some(pid) = superclass {
            if let Some(parent) = self.record_mut(pid) {
                parent.subclasses.push(id);
            }
        }
        if let Some(record) = self.record_mut(id) {
            record.superclass = superclass;
            record.state = ClassState::Linked;
        }

        self.build_dtables(id);
        tracing::debug!(class = %name, "class linked");
        Some(name)
    }

    /// Build and publish the class and metaclass tables of one linked record
    fn build_dtables(&mut self, id: ClassId) {
        let policy = self.category_policy;
        let Some(record) = self.record(id) else {
            return;
        };
        let parent = record.superclass.and_then(|pid| self.record(pid));

        let class_parent = parent.and_then(|p| p.class.dtable());
        record
            .class
            .publish(compose(record, ClassKind::Class, class_parent.as_deref(), policy));

        // A root metaclass inherits from its own class
        let meta_parent = match parent {
            Some(p) => p.meta.dtable(),
            None => record.class.dtable(),
        };
        record.meta.publish(compose(
            record,
            ClassKind::Metaclass,
            meta_parent.as_deref(),
            policy,
        ));

        self.dtable_builds += 2;
    }

    /// Rebuild the tables of `id` and of every linked descendant, parents first
    pub(crate) fn rebuild(&mut self, id: ClassId) {
        if self.record(id).map(|r| r.state) != Some(ClassState::Linked) {
            return;
        }

        let mut queue = VecDeque::from([id]);
        let mut count = 0usize;
        while let Some(next) = queue.pop_front() {
            self.build_dtables(next);
            count += 1;
            if let Some(record) = self.record(next) {
                queue.extend(record.subclasses.iter().copied());
            }
        }

        if let Some(record) = self.record(id) {
            tracing::debug!(class = %record.class.name(), classes = count, "dispatch tables rebuilt");
        }
    }

    /// Add a method the class itself does not define yet
    pub(crate) fn add_method(&mut self, id: ClassId, kind: ClassKind, entry: MethodEntry) -> bool {
        let Some(record) = self.record_mut(id) else {
            return false;
        };
        if record.defines(kind, entry.sel) {
            return false;
        }
        record.methods_mut(kind).push(entry);
        self.rebuild(id);
        true
    }

    /// Replace the implementation of a selector the class defines, returning
    /// the one it replaced. When categories define it, the category whose
    /// method dispatch currently sees is the one changed. A selector the
    /// class does not define joins its own method list.
    pub(crate) fn replace_method(
        &mut self,
        id: ClassId,
        kind: ClassKind,
        entry: MethodEntry,
    ) -> Option<Imp> {
        let policy = self.category_policy;
        let record = self.record_mut(id)?;
        let sel = entry.sel;

        let mut categories = record.categories.iter();
        let visible = match policy {
            CategoryConflictPolicy::LastApplied => {
                categories.rposition(|c| c.defines(kind, sel))
            }
            CategoryConflictPolicy::FirstApplied => {
                categories.position(|c| c.defines(kind, sel))
            }
        };
        let methods = match visible {
            Some(index) => record.categories[index].methods_mut(kind),
            None => record.methods_mut(kind),
        };

        // Within one list the later entry wins the overlay
        let previous = match methods.iter_mut().rev().find(|m| m.sel == sel) {
            Some(existing) => {
                if entry.types.is_some() {
                    existing.types = entry.types;
                }
                Some(std::mem::replace(&mut existing.imp, entry.imp))
            }
            None => {
                methods.push(entry);
                None
            }
        };
        self.rebuild(id);
        previous
    }

    /// Whether the class, its categories or any superclass adopt `protocol`
    pub(crate) fn conforms_to(&self, id: ClassId, protocol: &str) -> bool {
        let mut next = Some(id);
        while let Some(record) = next.and_then(|id| self.record(id)) {
            if record.adopts(protocol) {
                return true;
            }
            next = record.superclass;
        }
        false
    }

    /// Remove a class, its metaclass and all registered subclasses.
    /// Returns the removed class handles.
    pub(crate) fn unregister(&mut self, name: &str) -> Result<Vec<ClassRef>, RegistryError> {
        let id = self
            .id_of(name)
            .ok_or_else(|| RegistryError::ClassNotFound(name.to_string()))?;

        let mut removed = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            let Some(record) = self.records.get_mut(next.index()).and_then(Option::take) else {
                continue;
            };

            stack.extend(record.subclasses.iter().copied());
            if let Some(waiters) = self.pending_links.remove(record.class.name()) {
                stack.extend(waiters);
            }
            self.names.remove(record.class.name());

            match (record.superclass, &record.superclass_name) {
                (Some(pid), _) => {
                    if let Some(parent) = self.record_mut(pid) {
                        parent.subclasses.retain(|&c| c != next);
                    }
                }
                (None, Some(awaited)) => {
                    if let Some(waiting) = self.pending_links.get_mut(&**awaited) {
                        waiting.retain(|&c| c != next);
                        if waiting.is_empty() {
                            self.pending_links.remove(&**awaited);
                        }
                    }
                }
                (None, None) => {}
            }

            record.class.withdraw();
            record.meta.withdraw();
            tracing::debug!(class = %record.class.name(), "class unregistered");
            removed.push(record.class);
        }

        Ok(removed)
    }

    /// Names of all registered classes, linked or pending, sorted
    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.keys().map(|n| n.to_string()).collect();
        names.sort();
        names
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether no class is registered
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of linked classes
    pub fn linked_count(&self) -> usize {
        self.records
            .iter()
            .flatten()
            .filter(|r| r.state == ClassState::Linked)
            .count()
    }

    /// Number of classes waiting for a superclass
    pub fn pending_count(&self) -> usize {
        self.pending_links.values().map(Vec::len).sum()
    }

    /// Number of dispatch tables built so far (class and metaclass count separately)
    pub fn dtable_builds(&self) -> u64 {
        self.dtable_builds
    }

    /// Every class still waiting for its superclass, sorted by class name
    pub(crate) fn unresolved(&self) -> Vec<UnresolvedSuperclassError> {
        let mut unresolved: Vec<UnresolvedSuperclassError> = self
            .records
            .iter()
            .flatten()
            .filter(|r| r.state == ClassState::Pending)
            .filter_map(|r| {
                r.superclass_name
                    .as_ref()
                    .map(|superclass| UnresolvedSuperclassError {
                        class: r.class.name().to_string(),
                        superclass: superclass.to_string(),
                    })
            })
            .collect();
        unresolved.sort_by(|a, b| a.class.cmp(&b.class));
        unresolved
    }

    /// Drop every class, withdrawing all published tables
    pub(crate) fn clear(&mut self) {
        for record in self.records.drain(..).flatten() {
            record.class.withdraw();
            record.meta.withdraw();
        }
        self.names.clear();
        self.pending_links.clear();
        self.pending_categories.clear();
        self.dtable_builds = 0;
    }
}

/// Copy `parent`, then overlay the record's own methods and its categories
fn compose(
    record: &ClassRecord,
    kind: ClassKind,
    parent: Option<&DispatchTable>,
    policy: CategoryConflictPolicy,
) -> DispatchTable {
    let mut table = DispatchTable::inherit(parent);

    for method in record.methods(kind) {
        table.set(method.sel, method.imp.clone());
    }

    let lists = record.categories.iter().map(|c| c.methods(kind));
    match policy {
        CategoryConflictPolicy::LastApplied => {
            for list in lists {
                overlay(&mut table, list);
            }
        }
        CategoryConflictPolicy::FirstApplied => {
            for list in lists.rev() {
                overlay(&mut table, list);
            }
        }
    }

    table
}

fn overlay(table: &mut DispatchTable, methods: &[MethodEntry]) {
    for method in methods {
        table.set(method.sel, method.imp.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn entry(uid: u32, n: i64) -> MethodEntry {
        MethodEntry {
            sel: Sel::from_uid(uid),
            types: None,
            imp: Imp::new(move |_| Ok(Value::Int(n))),
        }
    }

    fn class(name: &str, superclass: Option<&str>, methods: Vec<MethodEntry>) -> ResolvedClass {
        ResolvedClass {
            name: Arc::from(name),
            superclass: superclass.map(Arc::from),
            instance_size: 0,
            instance_methods: methods,
            class_methods: Vec::new(),
            protocols: Vec::new(),
        }
    }

    fn registry() -> ClassRegistry {
        ClassRegistry::new(CategoryConflictPolicy::LastApplied)
    }

    #[test]
    fn test_root_links_immediately() {
        let mut registry = registry();
        let (root, linked) = registry.register(class("Root", None, vec![])).unwrap();
        assert_eq!(linked, vec![root.id()]);
        assert_eq!(registry.state_of("Root"), Some(ClassState::Linked));
        assert!(root.is_linked());

        let meta = root.metaclass().unwrap();
        assert!(meta.is_linked());
        assert!(Arc::ptr_eq(&meta.superclass().unwrap(), &root));
        assert!(Arc::ptr_eq(&meta.isa().unwrap(), meta));
    }

    #[test]
    fn test_out_of_order_chain() {
        let mut registry = registry();
        let (c, linked) = registry.register(class("C", Some("B"), vec![])).unwrap();
        assert!(linked.is_empty());
        let (b, _) = registry.register(class("B", Some("A"), vec![])).unwrap();
        assert_eq!(registry.pending_count(), 2);
        assert!(registry.class_for_name("C").is_none());

        let (a, linked) = registry.register(class("A", None, vec![])).unwrap();
        assert_eq!(linked, vec![a.id(), b.id(), c.id()]);
        assert_eq!(registry.pending_count(), 0);
        assert_eq!(registry.linked_count(), 3);
        assert!(Arc::ptr_eq(&c.superclass().unwrap(), &b));

        // Every metaclass dispatches through the root metaclass
        let root_meta = a.metaclass().unwrap();
        let c_meta = c.metaclass().unwrap();
        assert!(Arc::ptr_eq(&c_meta.isa().unwrap(), root_meta));
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut registry = registry();
        registry.register(class("A", None, vec![])).unwrap();
        let err = registry.register(class("A", None, vec![])).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateClass("A".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_subclass_inherits_and_overrides() {
        let mut registry = registry();
        let (a, _) = registry
            .register(class("A", None, vec![entry(1, 10), entry(2, 20)]))
            .unwrap();
        let (b, _) = registry
            .register(class("B", Some("A"), vec![entry(2, 21)]))
            .unwrap();

        let a_table = a.dtable().unwrap();
        let b_table = b.dtable().unwrap();
        assert_eq!(
            b_table.get(Sel::from_uid(1)),
            a_table.get(Sel::from_uid(1))
        );
        assert_ne!(
            b_table.get(Sel::from_uid(2)),
            a_table.get(Sel::from_uid(2))
        );
    }

    #[test]
    fn test_add_method_rebuilds_descendants() {
        let mut registry = registry();
        let (a, _) = registry.register(class("A", None, vec![])).unwrap();
        let (b, _) = registry.register(class("B", Some("A"), vec![])).unwrap();

        let e = entry(5, 5);
        let imp = e.imp.clone();
        assert!(registry.add_method(a.id(), ClassKind::Class, e));
        assert_eq!(b.lookup(Sel::from_uid(5)), Some(imp.clone()));
        // Root class methods reach class objects through the root metaclass
        assert_eq!(
            b.metaclass().unwrap().lookup(Sel::from_uid(5)),
            Some(imp)
        );

        assert!(!registry.add_method(a.id(), ClassKind::Class, entry(5, 6)));
        // Inherited definitions do not block the subclass
        assert!(registry.add_method(b.id(), ClassKind::Class, entry(5, 7)));
    }

    #[test]
    fn test_replace_method_returns_previous() {
        let mut registry = registry();
        let original = entry(3, 1);
        let original_imp = original.imp.clone();
        let (a, _) = registry.register(class("A", None, vec![original])).unwrap();

        let replacement = entry(3, 2);
        let replacement_imp = replacement.imp.clone();
        let previous = registry.replace_method(a.id(), ClassKind::Class, replacement);
        assert_eq!(previous, Some(original_imp));
        assert_eq!(a.lookup(Sel::from_uid(3)), Some(replacement_imp));

        assert_eq!(registry.replace_method(a.id(), ClassKind::Class, entry(4, 4)), None);
        assert!(a.lookup(Sel::from_uid(4)).is_some());
    }

    #[test]
    fn test_unregister_withdraws_subclasses() {
        let mut registry = registry();
        let (a, _) = registry.register(class("A", None, vec![entry(1, 1)])).unwrap();
        let (b, _) = registry.register(class("B", Some("A"), vec![])).unwrap();
        let (c, _) = registry.register(class("C", Some("B"), vec![])).unwrap();
        registry.register(class("D", Some("C"), vec![])).unwrap();
        registry.register(class("Waiting", Some("Missing"), vec![])).unwrap();

        let removed = registry.unregister("B").unwrap();
        let mut names: Vec<&str> = removed.iter().map(|c| c.name()).collect();
        names.sort();
        assert_eq!(names, vec!["B", "C", "D"]);

        assert!(a.is_linked());
        assert!(!b.is_linked());
        assert!(!c.is_linked());
        assert!(registry.record(a.id()).unwrap().subclasses.is_empty());
        assert_eq!(registry.class_names(), vec!["A", "Waiting"]);
        assert!(registry.resolve(&b).is_err());

        assert_eq!(
            registry.unregister("B").unwrap_err(),
            RegistryError::ClassNotFound("B".to_string())
        );
    }

    #[test]
    fn test_unregister_pending_releases_waiters() {
        let mut registry = registry();
        registry.register(class("B", Some("A"), vec![])).unwrap();
        registry.register(class("C", Some("B"), vec![])).unwrap();
        registry.unregister("B").unwrap();

        assert!(registry.is_empty());
        assert_eq!(registry.pending_count(), 0);

        // A later A links alone
        let (_, linked) = registry.register(class("A", None, vec![])).unwrap();
        assert_eq!(linked.len(), 1);
    }

    #[test]
    fn test_unresolved_report() {
        let mut registry = registry();
        registry.register(class("Z", Some("Y"), vec![])).unwrap();
        registry.register(class("X", Some("W"), vec![])).unwrap();

        let unresolved = registry.unresolved();
        assert_eq!(unresolved.len(), 2);
        assert_eq!(unresolved[0].class, "X");
        assert_eq!(unresolved[0].superclass, "W");
        assert_eq!(
            unresolved[1].to_string(),
            "Class Z was never linked: superclass Y did not resolve"
        );
    }

    #[test]
    fn test_resolve_rejects_foreign_handles() {
        let mut registry = registry();
        let (a, _) = registry.register(class("A", None, vec![])).unwrap();
        assert_eq!(registry.resolve(&a), Ok(a.id()));
        assert_eq!(registry.resolve(a.metaclass().unwrap()), Ok(a.id()));

        let stranger = Class::new_pair(a.id(), Arc::from("A"), 0);
        assert!(registry.resolve(&stranger).is_err());
    }

    #[test]
    fn test_clear() {
        let mut registry = registry();
        let (a, _) = registry.register(class("A", None, vec![])).unwrap();
        registry.register(class("B", Some("Q"), vec![])).unwrap();
        registry.clear();

        assert!(registry.is_empty());
        assert!(!a.is_linked());
        assert_eq!(registry.pending_count(), 0);
        let (fresh, _) = registry.register(class("A", None, vec![])).unwrap();
        assert_eq!(fresh.id(), ClassId(0));
    }
}
