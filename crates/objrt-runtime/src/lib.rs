//! objrt dispatch runtime
//!
//! The dynamic method-dispatch core of an object runtime:
//! - **Selectors**: message names interned into small uids (`selector` module)
//! - **Dispatch tables**: per-class sparse uid → implementation maps
//!   (`sparse`, `dtable` modules)
//! - **Classes**: registration, out-of-order superclass linking, categories
//!   and static instances (`registry`, `category`, `static_instances` modules)
//! - **Message send**: lock-free lookup against published tables (`runtime` module)
//! - **Load units**: executing decoded `objrt-abi` units (`loader` module)
//!
//! # Example
//!
//! ```rust,ignore
//! use objrt_runtime::{ClassDescriptor, Imp, Runtime, Value};
//!
//! let runtime = Runtime::new();
//! let class = runtime.register_class(
//!     ClassDescriptor::new("Greeter").method("greet", Imp::new(|_| Ok(Value::from("hello")))),
//! )?;
//!
//! let greet = runtime.selector("greet")?;
//! let greeter = Value::Object(runtime.create_instance(&class)?);
//! assert_eq!(runtime.send(&greeter, greet, &[])?, Value::from("hello"));
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Log an error with its source location and abort the process.
///
/// Reserved for states the runtime cannot continue from: an exhausted
/// selector space or a broken registry invariant.
macro_rules! fatal {
    ($($arg:tt)+) => {{
        ::tracing::error!(file = file!(), line = line!(), $($arg)+);
        ::std::process::abort()
    }};
}

// ============================================================================
// Core Modules
// ============================================================================

/// String-keyed open-addressed hash table
pub mod hashtable;

/// Selector interning
pub mod selector;

/// Radix-256 sparse arrays
pub mod sparse;

/// Per-class dispatch tables
pub mod dtable;

/// Method implementations and the implementation registry
pub mod imp;

/// Values and objects
pub mod value;

/// Protocols
pub mod protocol;

/// Class handles and descriptors
pub mod class;

/// Class registry and linker
pub mod registry;

/// Categories
pub mod category;

/// Static instances
mod static_instances;

/// Runtime state and message send
pub mod runtime;

/// Load-unit execution
pub mod loader;

/// Runtime configuration
pub mod options;

/// Process-wide runtime
pub mod global;

// ============================================================================
// Re-exports
// ============================================================================

pub use category::{CategoryDescriptor, CategoryStatus};
pub use class::{
    Class, ClassDescriptor, ClassId, ClassKind, ClassRef, ClassState, MethodDescriptor,
};
pub use dtable::DispatchTable;
pub use global::{init_runtime, runtime, shutdown_runtime, GlobalRuntimeError};
pub use imp::{Imp, ImpRegistry, ImpResult, Message};
pub use loader::{LoadError, LoadReport};
pub use options::{CategoryConflictPolicy, OptionsError, RuntimeOptions, TypeMismatchPolicy};
pub use protocol::Protocol;
pub use registry::{ClassRegistry, RegistryError, UnresolvedSuperclassError};
pub use runtime::{DispatchError, Runtime, RuntimeStats, ShutdownReport};
pub use selector::{Sel, SelectorNotFoundError, SelectorRegistry, MAX_SELECTOR_UID};
pub use value::{Object, ObjectRef, Value};

pub use objrt_abi as abi;
