//! Method implementations
//!
//! An [`Imp`] is the executable half of a method: a shared closure receiving
//! the [`Message`] being delivered. Load units name implementations by symbol;
//! the embedder supplies an [`ImpRegistry`] mapping those symbols to closures.

use crate::runtime::{DispatchError, Runtime};
use crate::selector::Sel;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

/// Result of running an implementation
pub type ImpResult = Result<Value, DispatchError>;

type ImpFn = dyn Fn(&Message<'_>) -> ImpResult + Send + Sync;

/// A message being delivered to an implementation
pub struct Message<'a> {
    /// Runtime the message was sent through
    pub runtime: &'a Runtime,
    /// Receiver (an object or a class object)
    pub receiver: &'a Value,
    /// Selector that was sent
    pub selector: Sel,
    /// Arguments
    pub args: &'a [Value],
}

impl<'a> Message<'a> {
    /// Argument `index`, or nil if absent
    pub fn arg(&self, index: usize) -> &'a Value {
        const NIL: &Value = &Value::Nil;
        self.args.get(index).unwrap_or(NIL)
    }

    /// Send another message through the same runtime
    pub fn send(&self, receiver: &Value, selector: Sel, args: &[Value]) -> ImpResult {
        self.runtime.send(receiver, selector, args)
    }
}

/// A method implementation
#[derive(Clone)]
pub struct Imp(Arc<ImpFn>);

impl Imp {
    /// Wrap a closure
    pub fn new(f: impl Fn(&Message<'_>) -> ImpResult + Send + Sync + 'static) -> Self {
        Imp(Arc::new(f))
    }

    /// Run the implementation
    #[inline]
    pub fn call(&self, message: &Message<'_>) -> ImpResult {
        (self.0)(message)
    }

    /// Whether two handles refer to the same implementation
    pub fn ptr_eq(a: &Imp, b: &Imp) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&a.0), Arc::as_ptr(&b.0))
    }
}

impl PartialEq for Imp {
    fn eq(&self, other: &Self) -> bool {
        Imp::ptr_eq(self, other)
    }
}

impl Eq for Imp {}

impl fmt::Debug for Imp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Imp({:p})", Arc::as_ptr(&self.0) as *const ())
    }
}

/// Registry of implementations indexed by symbol name.
///
/// Used at load time to resolve the implementation symbols stored in a load
/// unit's method lists.
#[derive(Default, Clone)]
pub struct ImpRegistry {
    imps: FxHashMap<String, Imp>,
}

impl ImpRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an implementation under `symbol`
    pub fn register(
        &mut self,
        symbol: &str,
        f: impl Fn(&Message<'_>) -> ImpResult + Send + Sync + 'static,
    ) -> Imp {
        let imp = Imp::new(f);
        self.imps.insert(symbol.to_string(), imp.clone());
        imp
    }

    /// Register an existing implementation under `symbol`
    pub fn insert(&mut self, symbol: &str, imp: Imp) {
        self.imps.insert(symbol.to_string(), imp);
    }

    /// Get an implementation by symbol
    pub fn get(&self, symbol: &str) -> Option<Imp> {
        self.imps.get(symbol).cloned()
    }

    /// Check if a symbol is registered
    pub fn contains(&self, symbol: &str) -> bool {
        self.imps.contains_key(symbol)
    }

    /// Get the number of registered implementations
    pub fn len(&self) -> usize {
        self.imps.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.imps.is_empty()
    }
}

impl fmt::Debug for ImpRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpRegistry")
            .field("count", &self.imps.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_register_and_get() {
        let mut registry = ImpRegistry::new();
        registry.register("Point.x", |_| Ok(Value::Int(1)));

        assert!(registry.contains("Point.x"));
        assert!(!registry.contains("Point.y"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_get_returns_same_imp() {
        let mut registry = ImpRegistry::new();
        let imp = registry.register("Point.x", |_| Ok(Value::Nil));
        let fetched = registry.get("Point.x").unwrap();
        assert_eq!(imp, fetched);
        assert!(registry.get("Point.z").is_none());
    }

    #[test]
    fn test_distinct_closures_differ() {
        let a = Imp::new(|_| Ok(Value::Int(1)));
        let b = Imp::new(|_| Ok(Value::Int(1)));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_call_sees_arguments() {
        let runtime = Runtime::new();
        let imp = Imp::new(|msg| {
            let a = msg.arg(0).as_int().unwrap_or(0);
            let b = msg.arg(1).as_int().unwrap_or(0);
            Ok(Value::Int(a + b))
        });
        let args = [Value::Int(2), Value::Int(40)];
        let message = Message {
            runtime: &runtime,
            receiver: &Value::Nil,
            selector: Sel::from_uid(1),
            args: &args,
        };
        assert_eq!(imp.call(&message).unwrap(), Value::Int(42));
        assert!(message.arg(7).is_nil());
    }
}
