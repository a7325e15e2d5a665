//! Runtime value representation
//!
//! Values mirror the kinds the client library sees at runtime.
//! - Undefined, Null, Bool, Number, BigInt: immediate values
//! - Strings: heap-allocated, reference-counted (Arc<String>), immutable
//! - Arrays and plain objects: copy-on-write wrappers around Arc
//! - Instance: a value built by a user-defined class; carries the class name
//!   and the intrinsic value it was derived from

use std::collections::BTreeMap;
use std::sync::Arc;

/// Copy-on-write array. Cheap to clone (refcount bump).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueArray(Arc<Vec<Value>>);

impl ValueArray {
    pub fn new() -> Self {
        ValueArray(Arc::new(Vec::new()))
    }

    pub fn from_vec(v: Vec<Value>) -> Self {
        ValueArray(Arc::new(v))
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// Mutating access; clones the payload if the Arc is shared.
    pub fn push(&mut self, value: Value) {
        Arc::make_mut(&mut self.0).push(value);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }
}

/// Copy-on-write property bag for plain objects
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueObject(Arc<BTreeMap<String, Value>>);

impl ValueObject {
    pub fn new() -> Self {
        ValueObject(Arc::new(BTreeMap::new()))
    }

    pub fn from_map(map: BTreeMap<String, Value>) -> Self {
        ValueObject(Arc::new(map))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        Arc::make_mut(&mut self.0).insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Flavor of a callable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FunctionKind {
    /// Plain function, arrow function, method or class constructor
    #[default]
    Normal,
    /// `async function`
    Async,
    /// `function*`
    Generator,
    /// `async function*`
    AsyncGenerator,
}

/// Function reference
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionRef {
    /// Declared name (empty for anonymous functions)
    pub name: Arc<str>,
    /// Number of declared parameters
    pub arity: usize,
    pub kind: FunctionKind,
}

/// Regular expression literal
#[derive(Debug, Clone, PartialEq)]
pub struct RegExpValue {
    pub source: String,
    pub flags: String,
}

/// Error object; `name` distinguishes `TypeError`, `RangeError`, etc.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorValue {
    pub name: String,
    pub message: String,
}

/// Settlement state of a promise
#[derive(Debug, Clone, PartialEq)]
pub enum PromiseState {
    Pending,
    Fulfilled(Value),
    Rejected(Value),
}

/// Element type of a typed array view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Uint8Clamped,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
    BigInt64,
    BigUint64,
}

impl TypedArrayKind {
    /// Size of one element in bytes
    pub fn element_size(&self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 | Self::Uint8Clamped => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 | Self::BigInt64 | Self::BigUint64 => 8,
        }
    }
}

/// Typed array view over a byte buffer
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    pub kind: TypedArrayKind,
    pub bytes: Arc<Vec<u8>>,
}

impl TypedArray {
    /// Number of elements in the view
    pub fn len(&self) -> usize {
        self.bytes.len() / self.kind.element_size()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Object constructed by a user-defined class.
///
/// `base` is the intrinsic value the class extends: a plain object for
/// ordinary classes, an array for `class Foo extends Array`, and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub class_name: Arc<str>,
    pub base: Arc<Value>,
}

/// Runtime value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Absent value (`undefined`)
    #[default]
    Undefined,
    /// Explicit null
    Null,
    Bool(bool),
    /// IEEE 754 double, including NaN and infinities
    Number(f64),
    BigInt(i128),
    String(Arc<String>),
    /// Symbol with optional description
    Symbol(Option<Arc<str>>),
    Array(ValueArray),
    Object(ValueObject),
    Function(FunctionRef),
    /// Milliseconds since the Unix epoch
    Date(f64),
    RegExp(Arc<RegExpValue>),
    Error(Arc<ErrorValue>),
    /// Insertion-ordered key/value pairs
    Map(Arc<Vec<(Value, Value)>>),
    Set(Arc<Vec<Value>>),
    Promise(Arc<PromiseState>),
    ArrayBuffer(Arc<Vec<u8>>),
    TypedArray(TypedArray),
    Instance(Instance),
}

impl Value {
    /// Create a new string value
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(Arc::new(s.into()))
    }

    /// Create a new array value
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(ValueArray::from_vec(values))
    }

    /// Create a plain object from key/value pairs
    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<BTreeMap<_, _>>();
        Value::Object(ValueObject::from_map(map))
    }

    /// Create a plain named function
    pub fn function(name: impl AsRef<str>, arity: usize) -> Self {
        Value::Function(FunctionRef {
            name: Arc::from(name.as_ref()),
            arity,
            kind: FunctionKind::Normal,
        })
    }

    /// Create a function of the given flavor
    pub fn function_of(name: impl AsRef<str>, arity: usize, kind: FunctionKind) -> Self {
        Value::Function(FunctionRef {
            name: Arc::from(name.as_ref()),
            arity,
            kind,
        })
    }

    /// Create an error object
    pub fn error(name: impl Into<String>, message: impl Into<String>) -> Self {
        Value::Error(Arc::new(ErrorValue {
            name: name.into(),
            message: message.into(),
        }))
    }

    /// Create a regular expression
    pub fn regexp(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Value::RegExp(Arc::new(RegExpValue {
            source: source.into(),
            flags: flags.into(),
        }))
    }

    /// Wrap `base` as an instance of a user-defined class
    pub fn instance(class_name: impl AsRef<str>, base: Value) -> Self {
        Value::Instance(Instance {
            class_name: Arc::from(class_name.as_ref()),
            base: Arc::new(base),
        })
    }

    /// Peel off any class wrappers to reach the intrinsic value
    pub fn intrinsic(&self) -> &Value {
        let mut current = self;
        while let Value::Instance(instance) = current {
            current = &instance.base;
        }
        current
    }

    /// Check for the absent value
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::string(s),
            serde_json::Value::Array(items) => {
                Value::array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::object(map.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Value::array(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_cow_push() {
        let mut a = ValueArray::from_vec(vec![Value::Number(1.0)]);
        let b = a.clone();
        a.push(Value::Number(2.0));
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn test_from_json_nested() {
        let value = Value::from(json!({"items": [1, "two", null], "ok": true}));
        let Value::Object(obj) = value else {
            panic!("expected object");
        };
        assert_eq!(obj.len(), 2);
        assert_eq!(obj.get("ok"), Some(&Value::Bool(true)));
        match obj.get("items") {
            Some(Value::Array(items)) => {
                assert_eq!(items.len(), 3);
                assert_eq!(items.get(2), Some(&Value::Null));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_intrinsic_unwraps_nested_instances() {
        let inner = Value::instance("Stack", Value::array(vec![]));
        let outer = Value::instance("BoundedStack", inner);
        assert!(matches!(outer.intrinsic(), Value::Array(_)));
    }

    #[test]
    fn test_typed_array_len() {
        let view = TypedArray {
            kind: TypedArrayKind::Uint16,
            bytes: Arc::new(vec![0; 8]),
        };
        assert_eq!(view.len(), 4);
        assert!(!view.is_empty());
    }

    #[test]
    fn test_default_is_undefined() {
        assert!(Value::default().is_undefined());
        assert!(!Value::Null.is_undefined());
    }
}
