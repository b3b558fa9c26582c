//! Class handles and class descriptors
//!
//! A [`Class`] is the runtime-visible side of a registered class: its name,
//! its place in the hierarchy and the published dispatch table. Every class
//! comes paired with a metaclass handle carrying the class-side methods.
//!
//! Hierarchy links are set once, when the class links. Handles survive
//! unregistration; a withdrawn class simply has no dispatch table any more.

use crate::dtable::DispatchTable;
use crate::imp::Imp;
use crate::protocol::Protocol;
use crate::selector::Sel;
use arc_swap::ArcSwapOption;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Shared reference to a class handle
pub type ClassRef = Arc<Class>;

/// Index of a class/metaclass pair in the class registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub(crate) u32);

impl ClassId {
    /// Raw index
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Which side of a class/metaclass pair a handle is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    /// Instance side
    Class,
    /// Class side
    Metaclass,
}

/// Link state of a registered class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassState {
    /// Waiting for its superclass chain to link
    Pending,
    /// Linked and dispatchable
    Linked,
}

/// A class or metaclass
pub struct Class {
    id: ClassId,
    name: Arc<str>,
    kind: ClassKind,
    instance_size: u32,
    metaclass: Option<ClassRef>,
    isa: OnceCell<Weak<Class>>,
    superclass: OnceCell<Weak<Class>>,
    dtable: ArcSwapOption<DispatchTable>,
    initialized: AtomicBool,
}

impl Class {
    /// Create a class/metaclass pair. The class's isa is its metaclass; the
    /// metaclass isa is set when the pair links.
    pub(crate) fn new_pair(id: ClassId, name: Arc<str>, instance_size: u32) -> ClassRef {
        let metaclass = Arc::new(Class {
            id,
            name: name.clone(),
            kind: ClassKind::Metaclass,
            instance_size: 0,
            metaclass: None,
            isa: OnceCell::new(),
            superclass: OnceCell::new(),
            dtable: ArcSwapOption::empty(),
            initialized: AtomicBool::new(false),
        });
        let isa = OnceCell::with_value(Arc::downgrade(&metaclass));
        Arc::new(Class {
            id,
            name,
            kind: ClassKind::Class,
            instance_size,
            metaclass: Some(metaclass),
            isa,
            superclass: OnceCell::new(),
            dtable: ArcSwapOption::empty(),
            initialized: AtomicBool::new(false),
        })
    }

    /// Registry index of the pair this handle belongs to
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Class name (a metaclass shares its class's name)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Class or metaclass
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Whether this is a metaclass handle
    pub fn is_metaclass(&self) -> bool {
        self.kind == ClassKind::Metaclass
    }

    /// Number of instance slots
    pub fn instance_size(&self) -> u32 {
        self.instance_size
    }

    /// The metaclass (None for a metaclass handle)
    pub fn metaclass(&self) -> Option<&ClassRef> {
        self.metaclass.as_ref()
    }

    /// The class a message to this class object dispatches through: the
    /// metaclass for a class, the root metaclass for a metaclass
    pub fn isa(&self) -> Option<ClassRef> {
        self.isa.get().and_then(Weak::upgrade)
    }

    /// The linked superclass. For a root metaclass this is the root class.
    pub fn superclass(&self) -> Option<ClassRef> {
        self.superclass.get().and_then(Weak::upgrade)
    }

    /// Whether the class currently has a dispatch table
    pub fn is_linked(&self) -> bool {
        self.dtable.load().is_some()
    }

    /// Snapshot of the published dispatch table
    pub fn dtable(&self) -> Option<Arc<DispatchTable>> {
        self.dtable.load_full()
    }

    /// Look up `sel` in the published dispatch table
    #[inline]
    pub fn lookup(&self, sel: Sel) -> Option<Imp> {
        self.dtable.load().as_ref()?.get(sel).cloned()
    }

    /// Whether the initializer has been sent to this class
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Mark the class initialized. Returns false if it already was.
    pub(crate) fn begin_initialize(&self) -> bool {
        !self.initialized.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn set_superclass(&self, superclass: &ClassRef) {
        let _ = self.superclass.set(Arc::downgrade(superclass));
    }

    pub(crate) fn set_isa(&self, isa: Weak<Class>) {
        let _ = self.isa.set(isa);
    }

    pub(crate) fn isa_weak(&self) -> Option<Weak<Class>> {
        self.isa.get().cloned()
    }

    pub(crate) fn publish(&self, table: DispatchTable) {
        self.dtable.store(Some(Arc::new(table)));
    }

    pub(crate) fn withdraw(&self) {
        self.dtable.store(None);
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("linked", &self.is_linked())
            .finish()
    }
}

/// A method in a class or category descriptor
#[derive(Debug, Clone)]
pub struct MethodDescriptor {
    /// Selector name
    pub name: String,
    /// Type encoding
    pub types: Option<String>,
    /// Implementation
    pub imp: Imp,
}

impl MethodDescriptor {
    /// Create a method descriptor
    pub fn new(name: impl Into<String>, types: Option<&str>, imp: Imp) -> Self {
        Self {
            name: name.into(),
            types: types.map(str::to_string),
            imp,
        }
    }
}

/// Everything needed to register a class
#[derive(Debug, Clone)]
pub struct ClassDescriptor {
    /// Class name
    pub name: String,
    /// Superclass name (None for a root class)
    pub superclass: Option<String>,
    /// Number of instance slots
    pub instance_size: u32,
    /// Instance-side methods
    pub instance_methods: Vec<MethodDescriptor>,
    /// Class-side methods
    pub class_methods: Vec<MethodDescriptor>,
    /// Adopted protocols
    pub protocols: Vec<Arc<Protocol>>,
}

impl ClassDescriptor {
    /// Create a root class descriptor
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superclass: None,
            instance_size: 0,
            instance_methods: Vec::new(),
            class_methods: Vec::new(),
            protocols: Vec::new(),
        }
    }

    /// Set the superclass name
    pub fn superclass(mut self, name: impl Into<String>) -> Self {
        self.superclass = Some(name.into());
        self
    }

    /// Set the number of instance slots
    pub fn instance_size(mut self, size: u32) -> Self {
        self.instance_size = size;
        self
    }

    /// Add an instance method
    pub fn method(mut self, name: &str, imp: Imp) -> Self {
        self.instance_methods
            .push(MethodDescriptor::new(name, None, imp));
        self
    }

    /// Add an instance method with a type encoding
    pub fn typed_method(mut self, name: &str, types: &str, imp: Imp) -> Self {
        self.instance_methods
            .push(MethodDescriptor::new(name, Some(types), imp));
        self
    }

    /// Add a class method
    pub fn class_method(mut self, name: &str, imp: Imp) -> Self {
        self.class_methods.push(MethodDescriptor::new(name, None, imp));
        self
    }

    /// Adopt a protocol
    pub fn protocol(mut self, protocol: Arc<Protocol>) -> Self {
        self.protocols.push(protocol);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_pair() {
        let class = Class::new_pair(ClassId(3), Arc::from("Point"), 2);
        assert_eq!(class.id(), ClassId(3));
        assert_eq!(class.name(), "Point");
        assert_eq!(class.kind(), ClassKind::Class);
        assert_eq!(class.instance_size(), 2);
        assert!(!class.is_linked());

        let meta = class.metaclass().unwrap();
        assert!(meta.is_metaclass());
        assert_eq!(meta.id(), class.id());
        assert!(meta.metaclass().is_none());
        assert!(Arc::ptr_eq(&class.isa().unwrap(), meta));
        assert!(meta.isa().is_none());
    }

    #[test]
    fn test_publish_and_withdraw() {
        let class = Class::new_pair(ClassId(0), Arc::from("Root"), 0);
        let mut table = DispatchTable::new();
        let imp = Imp::new(|_| Ok(crate::value::Value::Nil));
        table.set(Sel::from_uid(1), imp.clone());

        class.publish(table);
        assert!(class.is_linked());
        assert_eq!(class.lookup(Sel::from_uid(1)), Some(imp));
        assert_eq!(class.lookup(Sel::from_uid(2)), None);

        class.withdraw();
        assert!(!class.is_linked());
        assert_eq!(class.lookup(Sel::from_uid(1)), None);
    }

    #[test]
    fn test_initialize_flag_flips_once() {
        let class = Class::new_pair(ClassId(0), Arc::from("Root"), 0);
        assert!(!class.is_initialized());
        assert!(class.begin_initialize());
        assert!(!class.begin_initialize());
        assert!(class.is_initialized());
    }
}
