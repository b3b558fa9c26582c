//! The runtime state object and message send
//!
//! A [`Runtime`] owns the selector registry, the class registry and the
//! pending queues behind one lock. Registration, category application,
//! method addition and teardown take the lock; message sends do not. Each
//! class publishes its dispatch table atomically, so a send observes either
//! the table from before a rebuild or the one after it.
//!
//! Class initializers, forward handlers and method implementations always
//! run with the lock released, so they are free to call back into the
//! runtime.

use crate::category::{CategoryContribution, CategoryDescriptor, CategoryStatus};
use crate::class::{ClassDescriptor, ClassId, ClassKind, ClassRef, ClassState, MethodDescriptor};
use crate::imp::{Imp, Message};
use crate::options::{OptionsError, RuntimeOptions};
use crate::registry::{
    ClassRegistry, MethodEntry, RegistryError, ResolvedClass, UnresolvedSuperclassError,
};
use crate::selector::{Sel, SelectorNotFoundError, SelectorRegistry};
use crate::static_instances::{bind_all, StaticInstanceQueue};
use crate::value::{Object, ObjectRef, Value};
use arc_swap::ArcSwapOption;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Message send failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// The receiver's class has no implementation and no forward handler is installed
    #[error("{class} does not recognize selector {selector}")]
    DoesNotRecognize {
        /// Receiver class name
        class: String,
        /// Selector name
        selector: String,
    },

    /// The receiver is a primitive value
    #[error("Cannot send {selector} to a {kind} value")]
    NotAnObject {
        /// Value kind of the receiver
        kind: &'static str,
        /// Selector name
        selector: String,
    },

    /// The receiver's class is not linked (or was unregistered)
    #[error("Class {class} is not linked")]
    NotLinked {
        /// Class name
        class: String,
    },

    /// The receiver is a static instance whose class has not linked yet
    #[error("Cannot send {selector} to an uninitialized static instance")]
    UninitializedInstance {
        /// Selector name
        selector: String,
    },

    /// A method implementation reported a failure
    #[error("{0}")]
    Raised(String),
}

/// Snapshot of runtime counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RuntimeStats {
    /// Interned selectors
    pub selectors: usize,
    /// Registered classes
    pub classes: usize,
    /// Linked classes
    pub linked_classes: usize,
    /// Classes waiting for a superclass
    pub pending_classes: usize,
    /// Categories waiting for their class
    pub pending_categories: usize,
    /// Static instances waiting for their class
    pub pending_static_instances: usize,
    /// Dispatch tables built (class and metaclass count separately)
    pub dtable_builds: u64,
}

/// What was left unresolved when the runtime shut down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Classes whose superclass never arrived
    pub unresolved: Vec<UnresolvedSuperclassError>,
    /// `(class, category)` pairs whose class never registered
    pub orphan_categories: Vec<(String, String)>,
    /// `(class, count)` of static instances whose class never linked
    pub forgotten_static_instances: Vec<(String, usize)>,
    /// Selectors released
    pub selectors_released: usize,
    /// Classes released
    pub classes_released: usize,
}

impl ShutdownReport {
    /// Whether everything that was loaded got resolved
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty()
            && self.orphan_categories.is_empty()
            && self.forgotten_static_instances.is_empty()
    }
}

/// State guarded by the runtime lock
#[derive(Debug)]
pub(crate) struct RuntimeState {
    pub selectors: SelectorRegistry,
    pub classes: ClassRegistry,
    pub statics: StaticInstanceQueue,
}

impl RuntimeState {
    fn new(options: &RuntimeOptions) -> Self {
        Self {
            selectors: SelectorRegistry::new(
                options.initial_selector_capacity,
                options.type_mismatch,
            ),
            classes: ClassRegistry::new(options.category_conflicts),
            statics: StaticInstanceQueue::default(),
        }
    }

    fn resolve_methods(&mut self, methods: Vec<MethodDescriptor>) -> Vec<MethodEntry> {
        methods
            .into_iter()
            .map(|method| {
                let types = method.types.as_deref().filter(|t| !t.is_empty());
                MethodEntry {
                    sel: self.selectors.intern(&method.name, types),
                    types: types.map(Arc::from),
                    imp: method.imp,
                }
            })
            .collect()
    }

    pub fn resolve_class(&mut self, descriptor: ClassDescriptor) -> ResolvedClass {
        ResolvedClass {
            name: Arc::from(descriptor.name),
            superclass: descriptor.superclass.map(Arc::from),
            instance_size: descriptor.instance_size,
            instance_methods: self.resolve_methods(descriptor.instance_methods),
            class_methods: self.resolve_methods(descriptor.class_methods),
            protocols: descriptor.protocols,
        }
    }

    pub fn resolve_category(&mut self, descriptor: CategoryDescriptor) -> CategoryContribution {
        CategoryContribution {
            name: Arc::from(descriptor.name),
            class_name: Arc::from(descriptor.class_name),
            instance_methods: self.resolve_methods(descriptor.instance_methods),
            class_methods: self.resolve_methods(descriptor.class_methods),
            protocols: descriptor.protocols,
        }
    }

    /// Bind waiting static instances of newly linked classes. Returns the
    /// linked class handles and the number of literals bound.
    pub fn finish_linking(&mut self, linked: &[ClassId]) -> (Vec<ClassRef>, usize) {
        let mut classes = Vec::with_capacity(linked.len());
        let mut bound = 0;
        for &id in linked {
            let Some(record) = self.classes.record(id) else {
                continue;
            };
            let class = record.class.clone();
            let objects = self.statics.take(class.name());
            bound += bind_all(&class, &objects);
            classes.push(class);
        }
        (classes, bound)
    }
}

/// A dispatch runtime
pub struct Runtime {
    options: RuntimeOptions,
    state: Mutex<RuntimeState>,
    forward: ArcSwapOption<Imp>,
}

impl Runtime {
    /// Create a runtime with default options
    pub fn new() -> Self {
        Self::build(RuntimeOptions::default())
    }

    /// Create a runtime with the given options, rejecting invalid ones
    pub fn with_options(options: RuntimeOptions) -> Result<Self, OptionsError> {
        options.validate()?;
        Ok(Self::build(options))
    }

    fn build(options: RuntimeOptions) -> Self {
        Self {
            state: Mutex::new(RuntimeState::new(&options)),
            options,
            forward: ArcSwapOption::empty(),
        }
    }

    /// Options the runtime was created with
    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub(crate) fn lock(&self) -> parking_lot::MutexGuard<'_, RuntimeState> {
        self.state.lock()
    }

    // ------------------------------------------------------------------
    // Selectors
    // ------------------------------------------------------------------

    /// Intern a selector
    pub fn intern(&self, name: &str, types: Option<&str>) -> Sel {
        self.lock().selectors.intern(name, types)
    }

    /// Look up an already interned selector
    pub fn selector(&self, name: &str) -> Result<Sel, SelectorNotFoundError> {
        self.lock().selectors.lookup(name)
    }

    /// Name of an interned selector
    pub fn selector_name(&self, sel: Sel) -> Option<String> {
        self.lock().selectors.name(sel).map(|n| n.to_string())
    }

    /// Type encoding of an interned selector
    pub fn selector_types(&self, sel: Sel) -> Option<String> {
        self.lock().selectors.types(sel).map(|t| t.to_string())
    }

    fn describe(&self, sel: Sel) -> String {
        self.lock().selectors.describe(sel)
    }

    // ------------------------------------------------------------------
    // Classes
    // ------------------------------------------------------------------

    /// Register a class. It links now if its superclass chain is linked,
    /// otherwise when the missing superclass arrives.
    pub fn register_class(&self, descriptor: ClassDescriptor) -> Result<ClassRef, RegistryError> {
        let (class, linked) = {
            let mut state = self.lock();
            state.classes.check_available(&descriptor.name)?;
            let resolved = state.resolve_class(descriptor);
            let (class, linked) = state.classes.register(resolved)?;
            let (linked, _) = state.finish_linking(&linked);
            (class, linked)
        };
        self.run_initializers(&linked);
        Ok(class)
    }

    /// Apply a category to its class, or hold it until the class registers
    pub fn apply_category(&self, descriptor: CategoryDescriptor) -> CategoryStatus {
        let mut state = self.lock();
        let category = state.resolve_category(descriptor);
        state.classes.apply_category(category)
    }

    /// Queue object literals of `class_name`. Literals are bound right away
    /// if the class is linked. Returns how many were bound now.
    pub fn register_static_instances(&self, class_name: &str, objects: Vec<ObjectRef>) -> usize {
        let mut state = self.lock();
        match state.classes.class_for_name(class_name) {
            Some(class) => bind_all(&class, &objects),
            None => {
                state.statics.enqueue(class_name, objects);
                0
            }
        }
    }

    /// The linked class named `name`
    pub fn class_for_name(&self, name: &str) -> Option<ClassRef> {
        self.lock().classes.class_for_name(name)
    }

    /// Link state of the class named `name` (None if not registered)
    pub fn class_state(&self, name: &str) -> Option<ClassState> {
        self.lock().classes.state_of(name)
    }

    /// Names of all registered classes, sorted
    pub fn class_names(&self) -> Vec<String> {
        self.lock().classes.class_names()
    }

    /// Remove a class and all of its registered subclasses. Instances of
    /// removed classes report [`DispatchError::NotLinked`] from then on.
    /// Returns the names of the removed classes.
    pub fn unregister_class(&self, name: &str) -> Result<Vec<String>, RegistryError> {
        let removed = self.lock().classes.unregister(name)?;
        Ok(removed.iter().map(|c| c.name().to_string()).collect())
    }

    /// The linked superclass of `class`
    pub fn superclass_of(&self, class: &ClassRef) -> Option<ClassRef> {
        class.superclass()
    }

    /// Whether instances of `class` respond to `sel`. Pass a metaclass to
    /// ask about the class object.
    pub fn responds_to(&self, class: &ClassRef, sel: Sel) -> bool {
        class.lookup(sel).is_some()
    }

    /// Whether `class`, one of its categories or a superclass adopts
    /// `protocol` (directly or through protocol inheritance)
    pub fn conforms_to(&self, class: &ClassRef, protocol: &str) -> bool {
        let state = self.lock();
        match state.classes.resolve(class) {
            Ok(id) => state.classes.conforms_to(id, protocol),
            Err(_) => false,
        }
    }

    /// Allocate an instance of a linked class
    pub fn create_instance(&self, class: &ClassRef) -> Result<ObjectRef, RegistryError> {
        if class.is_metaclass() {
            return Err(RegistryError::ClassNotFound(class.name().to_string()));
        }
        if !class.is_linked() {
            return Err(RegistryError::ClassNotLinked(class.name().to_string()));
        }
        Ok(Object::new(class.clone(), class.instance_size() as usize))
    }

    /// Add a method the class does not define itself. Returns false if the
    /// class (or one of its categories) already implements `sel`; inherited
    /// implementations do not count. Pass a metaclass to add a class method.
    pub fn add_method(
        &self,
        class: &ClassRef,
        sel: Sel,
        imp: Imp,
        types: Option<&str>,
    ) -> Result<bool, RegistryError> {
        let mut state = self.lock();
        let id = state.classes.resolve(class)?;
        let entry = Self::entry(&mut state, sel, imp, types)?;
        Ok(state.classes.add_method(id, class.kind(), entry))
    }

    /// Set the class's own implementation of `sel`, returning the one it
    /// replaced
    pub fn replace_method(
        &self,
        class: &ClassRef,
        sel: Sel,
        imp: Imp,
        types: Option<&str>,
    ) -> Result<Option<Imp>, RegistryError> {
        let mut state = self.lock();
        let id = state.classes.resolve(class)?;
        let entry = Self::entry(&mut state, sel, imp, types)?;
        Ok(state.classes.replace_method(id, class.kind(), entry))
    }

    fn entry(
        state: &mut RuntimeState,
        sel: Sel,
        imp: Imp,
        types: Option<&str>,
    ) -> Result<MethodEntry, RegistryError> {
        if !state.selectors.contains(sel) {
            return Err(RegistryError::UnknownSelector(sel));
        }
        let types = types.filter(|t| !t.is_empty());
        state.selectors.reconcile_types(sel, types);
        Ok(MethodEntry {
            sel,
            types: types.map(Arc::from),
            imp,
        })
    }

    // ------------------------------------------------------------------
    // Message send
    // ------------------------------------------------------------------

    /// Send `sel` to `receiver`. Messages to nil return nil.
    pub fn send(&self, receiver: &Value, sel: Sel, args: &[Value]) -> Result<Value, DispatchError> {
        match self.receiver_class(receiver, sel)? {
            Some(class) => self.dispatch(&class, receiver, sel, args),
            None => Ok(Value::Nil),
        }
    }

    /// Send `sel` to `receiver`, starting the lookup at the superclass of
    /// `current` (on the metaclass side for class receivers)
    pub fn send_super(
        &self,
        receiver: &Value,
        current: &ClassRef,
        sel: Sel,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        if receiver.is_nil() {
            return Ok(Value::Nil);
        }

        let side = match (receiver, current.kind()) {
            (Value::Class(_), ClassKind::Class) => current.metaclass().cloned(),
            _ => Some(current.clone()),
        };
        let Some(side) = side else {
            return Err(DispatchError::NotLinked {
                class: current.name().to_string(),
            });
        };

        match side.superclass() {
            Some(superclass) => self.dispatch(&superclass, receiver, sel, args),
            None if !side.is_linked() => Err(DispatchError::NotLinked {
                class: current.name().to_string(),
            }),
            None => Err(DispatchError::DoesNotRecognize {
                class: current.name().to_string(),
                selector: self.describe(sel),
            }),
        }
    }

    /// Look up the implementation `receiver` would run for `sel`, without
    /// forwarding
    pub fn lookup_imp(&self, receiver: &Value, sel: Sel) -> Option<Imp> {
        self.receiver_class(receiver, sel).ok()??.lookup(sel)
    }

    /// Install (or remove) the handler for messages nobody implements. The
    /// handler receives the original message.
    pub fn set_forward_handler(&self, handler: Option<Imp>) {
        self.forward.store(handler.map(Arc::new));
    }

    fn receiver_class(&self, receiver: &Value, sel: Sel) -> Result<Option<ClassRef>, DispatchError> {
        match receiver {
            Value::Nil => Ok(None),
            Value::Object(object) => match object.class() {
                Some(class) => Ok(Some(class.clone())),
                None => Err(DispatchError::UninitializedInstance {
                    selector: self.describe(sel),
                }),
            },
            Value::Class(class) => match class.isa() {
                Some(isa) => Ok(Some(isa)),
                None => Err(DispatchError::NotLinked {
                    class: class.name().to_string(),
                }),
            },
            other => Err(DispatchError::NotAnObject {
                kind: other.kind(),
                selector: self.describe(sel),
            }),
        }
    }

    fn dispatch(
        &self,
        class: &ClassRef,
        receiver: &Value,
        sel: Sel,
        args: &[Value],
    ) -> Result<Value, DispatchError> {
        let Some(table) = class.dtable() else {
            return Err(DispatchError::NotLinked {
                class: class.name().to_string(),
            });
        };
        let imp = table.get(sel).cloned();
        drop(table);

        let message = Message {
            runtime: self,
            receiver,
            selector: sel,
            args,
        };

        if let Some(imp) = imp {
            return imp.call(&message);
        }

        if let Some(handler) = self.forward.load_full() {
            tracing::trace!(class = %class.name(), selector = sel.uid(), "forwarding message");
            return handler.call(&message);
        }

        Err(DispatchError::DoesNotRecognize {
            class: class.name().to_string(),
            selector: self.describe(sel),
        })
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Send the initializer to newly linked classes, superclasses first
    pub(crate) fn run_initializers(&self, classes: &[ClassRef]) {
        if !self.options.send_initialize || classes.is_empty() {
            return;
        }
        let lookup = self
            .lock()
            .selectors
            .lookup(&self.options.initializer_selector);
        let Ok(sel) = lookup else {
            return;
        };
        for class in classes {
            self.initialize(class, sel);
        }
    }

    fn initialize(&self, class: &ClassRef, sel: Sel) {
        if class.is_initialized() {
            return;
        }
        if let Some(superclass) = class.superclass() {
            self.initialize(&superclass, sel);
        }
        if !class.begin_initialize() {
            return;
        }

        let Some(imp) = class.metaclass().and_then(|meta| meta.lookup(sel)) else {
            return;
        };
        tracing::debug!(class = %class.name(), "initializing class");
        let receiver = Value::Class(class.clone());
        let message = Message {
            runtime: self,
            receiver: &receiver,
            selector: sel,
            args: &[],
        };
        if let Err(err) = imp.call(&message) {
            tracing::warn!(class = %class.name(), error = %err, "class initializer failed");
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Current counters
    pub fn stats(&self) -> RuntimeStats {
        let state = self.lock();
        RuntimeStats {
            selectors: state.selectors.len(),
            classes: state.classes.len(),
            linked_classes: state.classes.linked_count(),
            pending_classes: state.classes.pending_count(),
            pending_categories: state.classes.pending_category_count(),
            pending_static_instances: state.statics.len(),
            dtable_builds: state.classes.dtable_builds(),
        }
    }

    /// Report whatever never resolved, then release every selector, class
    /// and dispatch table. The runtime can be used again afterwards.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut state = self.lock();

        let unresolved = state.classes.unresolved();
        for error in &unresolved {
            tracing::warn!(class = %error.class, superclass = %error.superclass, "{}", error);
        }

        let orphan_categories = state.classes.orphan_categories();
        for (class, category) in &orphan_categories {
            tracing::warn!(%class, %category, "category never applied: class was not registered");
        }

        let forgotten_static_instances = state.statics.forget_all();
        for (class, count) in &forgotten_static_instances {
            tracing::warn!(%class, count, "static instances forgotten: class never linked");
        }

        let report = ShutdownReport {
            unresolved,
            orphan_categories,
            forgotten_static_instances,
            selectors_released: state.selectors.len(),
            classes_released: state.classes.len(),
        };

        state.classes.clear();
        state.selectors.clear();
        drop(state);
        self.forward.store(None);

        report
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish()
    }
}
