//! Runtime type introspection
//!
//! Classifies values by their intrinsic kind, the way the host runtime's
//! internal class slot does. Classification never consults user-defined
//! class names: an instance of a class extending `Array` is an `"array"`.
//!
//! Two conventions coexist and both are part of the public contract:
//! - answers (`type_of`) are lowercase tags such as `"regexp"`
//! - queries (`is_type`) take the capitalized class name such as `"RegExp"`

use crate::value::{FunctionKind, TypedArrayKind, Value};
use std::fmt;

/// Normalized runtime classification of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Null,
    Boolean,
    Number,
    BigInt,
    String,
    Symbol,
    Array,
    Object,
    Function,
    AsyncFunction,
    GeneratorFunction,
    AsyncGeneratorFunction,
    Date,
    RegExp,
    Error,
    Map,
    Set,
    Promise,
    ArrayBuffer,
    Int8Array,
    Uint8Array,
    Uint8ClampedArray,
    Int16Array,
    Uint16Array,
    Int32Array,
    Uint32Array,
    Float32Array,
    Float64Array,
    BigInt64Array,
    BigUint64Array,
}

impl TypeTag {
    /// Lowercase tag, as returned by `type_of`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::BigInt => "bigint",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Array => "array",
            Self::Object => "object",
            Self::Function => "function",
            Self::AsyncFunction => "asyncfunction",
            Self::GeneratorFunction => "generatorfunction",
            Self::AsyncGeneratorFunction => "asyncgeneratorfunction",
            Self::Date => "date",
            Self::RegExp => "regexp",
            Self::Error => "error",
            Self::Map => "map",
            Self::Set => "set",
            Self::Promise => "promise",
            Self::ArrayBuffer => "arraybuffer",
            Self::Int8Array => "int8array",
            Self::Uint8Array => "uint8array",
            Self::Uint8ClampedArray => "uint8clampedarray",
            Self::Int16Array => "int16array",
            Self::Uint16Array => "uint16array",
            Self::Int32Array => "int32array",
            Self::Uint32Array => "uint32array",
            Self::Float32Array => "float32array",
            Self::Float64Array => "float64array",
            Self::BigInt64Array => "bigint64array",
            Self::BigUint64Array => "biguint64array",
        }
    }

    /// Capitalized internal class name, the form `is_type` matches against
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::Number => "Number",
            Self::BigInt => "BigInt",
            Self::String => "String",
            Self::Symbol => "Symbol",
            Self::Array => "Array",
            Self::Object => "Object",
            Self::Function => "Function",
            Self::AsyncFunction => "AsyncFunction",
            Self::GeneratorFunction => "GeneratorFunction",
            Self::AsyncGeneratorFunction => "AsyncGeneratorFunction",
            Self::Date => "Date",
            Self::RegExp => "RegExp",
            Self::Error => "Error",
            Self::Map => "Map",
            Self::Set => "Set",
            Self::Promise => "Promise",
            Self::ArrayBuffer => "ArrayBuffer",
            Self::Int8Array => "Int8Array",
            Self::Uint8Array => "Uint8Array",
            Self::Uint8ClampedArray => "Uint8ClampedArray",
            Self::Int16Array => "Int16Array",
            Self::Uint16Array => "Uint16Array",
            Self::Int32Array => "Int32Array",
            Self::Uint32Array => "Uint32Array",
            Self::Float32Array => "Float32Array",
            Self::Float64Array => "Float64Array",
            Self::BigInt64Array => "BigInt64Array",
            Self::BigUint64Array => "BigUint64Array",
        }
    }

    /// Classify a value that is known to be defined
    fn classify(value: &Value) -> Option<Self> {
        let tag = match value.intrinsic() {
            // an instance wrapping nothing is still an object
            Value::Undefined if !value.is_undefined() => Self::Object,
            Value::Undefined => return None,
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::BigInt(_) => Self::BigInt,
            Value::String(_) => Self::String,
            Value::Symbol(_) => Self::Symbol,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
            Value::Function(f) => match f.kind {
                FunctionKind::Normal => Self::Function,
                FunctionKind::Async => Self::AsyncFunction,
                FunctionKind::Generator => Self::GeneratorFunction,
                FunctionKind::AsyncGenerator => Self::AsyncGeneratorFunction,
            },
            Value::Date(_) => Self::Date,
            Value::RegExp(_) => Self::RegExp,
            Value::Error(_) => Self::Error,
            Value::Map(_) => Self::Map,
            Value::Set(_) => Self::Set,
            Value::Promise(_) => Self::Promise,
            Value::ArrayBuffer(_) => Self::ArrayBuffer,
            Value::TypedArray(view) => match view.kind {
                TypedArrayKind::Int8 => Self::Int8Array,
                TypedArrayKind::Uint8 => Self::Uint8Array,
                TypedArrayKind::Uint8Clamped => Self::Uint8ClampedArray,
                TypedArrayKind::Int16 => Self::Int16Array,
                TypedArrayKind::Uint16 => Self::Uint16Array,
                TypedArrayKind::Int32 => Self::Int32Array,
                TypedArrayKind::Uint32 => Self::Uint32Array,
                TypedArrayKind::Float32 => Self::Float32Array,
                TypedArrayKind::Float64 => Self::Float64Array,
                TypedArrayKind::BigInt64 => Self::BigInt64Array,
                TypedArrayKind::BigUint64 => Self::BigUint64Array,
            },
            // intrinsic() never yields an Instance
            Value::Instance(_) => Self::Object,
        };
        Some(tag)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialEq<str> for TypeTag {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for TypeTag {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

/// Result of the dual-mode `obj_type` query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjType {
    /// The value was undefined; no classification exists
    Absent,
    /// Classification of the value (no candidate supplied)
    Tag(TypeTag),
    /// Whether the value matched the supplied candidate class name
    Matches(bool),
}

/// Get the lowercase runtime classification of a value.
///
/// Returns `None` only for `Value::Undefined`. An explicit `Value::Null`
/// classifies as `"null"`.
pub fn type_of(value: &Value) -> Option<TypeTag> {
    if value.is_undefined() {
        return None;
    }
    TypeTag::classify(value)
}

/// Check a value against a capitalized class name (`"Array"`, `"String"`).
///
/// The comparison is case-sensitive: `is_type(&[], "array")` is `false`.
/// Undefined never matches.
pub fn is_type(value: &Value, candidate: &str) -> bool {
    type_of(value).is_some_and(|tag| tag.class_name() == candidate)
}

/// Classify `value`, or test it against `candidate` when one is given.
pub fn obj_type(value: &Value, candidate: Option<&str>) -> ObjType {
    match (type_of(value), candidate) {
        (None, _) => ObjType::Absent,
        (Some(tag), Some(name)) => ObjType::Matches(tag.class_name() == name),
        (Some(tag), None) => ObjType::Tag(tag),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_name_lowercases_to_tag() {
        let tags = [
            TypeTag::Null,
            TypeTag::RegExp,
            TypeTag::AsyncGeneratorFunction,
            TypeTag::Uint8ClampedArray,
            TypeTag::BigUint64Array,
        ];
        for tag in tags {
            assert_eq!(tag.class_name().to_lowercase(), tag.as_str());
        }
    }

    #[test]
    fn test_tag_display() {
        assert_eq!(TypeTag::ArrayBuffer.to_string(), "arraybuffer");
    }

    #[test]
    fn test_tag_compares_with_str() {
        assert!(TypeTag::Array == "array");
        assert!(TypeTag::Array != "Array");
    }

    #[test]
    fn test_obj_type_modes() {
        let v = Value::string("hello");
        assert_eq!(obj_type(&v, None), ObjType::Tag(TypeTag::String));
        assert_eq!(obj_type(&v, Some("String")), ObjType::Matches(true));
        assert_eq!(obj_type(&v, Some("Number")), ObjType::Matches(false));
        assert_eq!(obj_type(&Value::Undefined, Some("Undefined")), ObjType::Absent);
    }
}
