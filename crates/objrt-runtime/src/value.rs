//! Message arguments, results and objects

use crate::class::ClassRef;
use crate::selector::Sel;
use objrt_abi::ConstValue;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Shared reference to an object
pub type ObjectRef = Arc<Object>;

/// A value passed to or returned from a message send
#[derive(Clone, Default)]
pub enum Value {
    /// Nil (the receiver of a no-op send, and the result of one)
    #[default]
    Nil,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Float
    Float(f64),
    /// Immutable string
    Str(Arc<str>),
    /// Object instance
    Object(ObjectRef),
    /// Class object
    Class(ClassRef),
    /// Selector
    Sel(Sel),
}

impl Value {
    /// Short name of the value kind, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Class(_) => "class",
            Value::Sel(_) => "selector",
        }
    }

    /// Check if the value is nil
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as float (integers widen)
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get as string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Get as object
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Get as class
    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Value::Class(c) => Some(c),
            _ => None,
        }
    }

    /// Get as selector
    pub fn as_sel(&self) -> Option<Sel> {
        match self {
            Value::Sel(s) => Some(*s),
            _ => None,
        }
    }
}

/// Objects and classes compare by identity, everything else by value
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Arc::ptr_eq(a, b),
            (Value::Sel(a), Value::Sel(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Object(o) => match o.class() {
                Some(class) => write!(f, "<{} {:p}>", class.name(), Arc::as_ptr(o)),
                None => write!(f, "<uninitialized {:p}>", Arc::as_ptr(o)),
            },
            Value::Class(c) => write!(f, "{}", c.name()),
            Value::Sel(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(Arc::from(s))
    }
}

impl From<ObjectRef> for Value {
    fn from(o: ObjectRef) -> Self {
        Value::Object(o)
    }
}

impl From<ClassRef> for Value {
    fn from(c: ClassRef) -> Self {
        Value::Class(c)
    }
}

impl From<Sel> for Value {
    fn from(s: Sel) -> Self {
        Value::Sel(s)
    }
}

impl From<&ConstValue> for Value {
    fn from(c: &ConstValue) -> Self {
        match c {
            ConstValue::Nil => Value::Nil,
            ConstValue::Bool(b) => Value::Bool(*b),
            ConstValue::Int(i) => Value::Int(*i),
            ConstValue::Float(f) => Value::Float(*f),
            ConstValue::Str(s) => Value::Str(Arc::from(s.as_str())),
        }
    }
}

/// A heap object: a class reference and instance slots.
///
/// The class reference is set at most once. Objects created through
/// `Runtime::create_instance` get it immediately; static instances get it
/// when their class links.
pub struct Object {
    isa: OnceCell<ClassRef>,
    slots: Mutex<Vec<Value>>,
}

impl Object {
    /// Allocate an object of `class` with `slot_count` nil slots
    pub(crate) fn new(class: ClassRef, slot_count: usize) -> ObjectRef {
        Arc::new(Object {
            isa: OnceCell::with_value(class),
            slots: Mutex::new(vec![Value::Nil; slot_count]),
        })
    }

    /// Create an object whose class is bound later
    pub fn uninitialized(slots: Vec<Value>) -> ObjectRef {
        Arc::new(Object {
            isa: OnceCell::new(),
            slots: Mutex::new(slots),
        })
    }

    /// The object's class, if bound
    #[inline]
    pub fn class(&self) -> Option<&ClassRef> {
        self.isa.get()
    }

    /// Whether the class reference has been bound
    pub fn is_initialized(&self) -> bool {
        self.isa.get().is_some()
    }

    /// Bind the class reference. Returns false if it was already bound.
    pub(crate) fn bind(&self, class: ClassRef) -> bool {
        self.isa.set(class).is_ok()
    }

    /// Number of instance slots
    pub fn slot_count(&self) -> usize {
        self.slots.lock().len()
    }

    /// Read a slot
    pub fn get(&self, index: usize) -> Option<Value> {
        self.slots.lock().get(index).cloned()
    }

    /// Write a slot. Returns false if `index` is out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.slots.lock().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Object")
            .field("class", &self.isa.get().map(|c| c.name().to_string()))
            .field("slots", &self.slot_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_kinds() {
        assert_eq!(Value::Nil.kind(), "nil");
        assert_eq!(Value::from(3i64).kind(), "int");
        assert_eq!(Value::from("x").kind(), "string");
        assert!(Value::default().is_nil());
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from(7i64).as_int(), Some(7));
        assert_eq!(Value::from(7i64).as_float(), Some(7.0));
        assert_eq!(Value::from("abc").as_str(), Some("abc"));
        assert_eq!(Value::from(1.5).as_int(), None);
        assert_eq!(Value::Sel(Sel::from_uid(4)).as_sel(), Some(Sel::from_uid(4)));
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = Object::uninitialized(vec![Value::Int(1)]);
        let b = Object::uninitialized(vec![Value::Int(1)]);
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn test_const_conversion() {
        assert_eq!(Value::from(&ConstValue::Nil), Value::Nil);
        assert_eq!(Value::from(&ConstValue::Int(-2)), Value::Int(-2));
        assert_eq!(
            Value::from(&ConstValue::Str("hi".to_string())),
            Value::from("hi")
        );
    }

    #[test]
    fn test_object_slots() {
        let object = Object::uninitialized(vec![Value::Nil, Value::Int(2)]);
        assert!(!object.is_initialized());
        assert_eq!(object.slot_count(), 2);
        assert_eq!(object.get(1), Some(Value::Int(2)));
        assert!(object.set(0, Value::from("first")));
        assert_eq!(object.get(0), Some(Value::from("first")));
        assert!(!object.set(5, Value::Nil));
        assert_eq!(object.get(5), None);
    }
}
