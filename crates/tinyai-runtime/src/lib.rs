//! tinyai runtime support
//!
//! Provides the dynamic value model used by the tinyai client library and
//! the type oracle that classifies those values:
//! - `Value`: closed set of runtime value kinds
//! - `type_of`: lowercase runtime classification (`"array"`, `"null"`, ...)
//! - `is_type`: match against a capitalized class name (`"Array"`)
//! - `obj_type`: dual-mode entry point combining both
//!
//! # Example
//!
//! ```
//! use tinyai_runtime::{is_type, type_of, Value};
//!
//! let list = Value::array(vec![Value::Number(1.0)]);
//! assert_eq!(type_of(&list).unwrap().as_str(), "array");
//! assert!(is_type(&list, "Array"));
//! assert!(type_of(&Value::Undefined).is_none());
//! ```

pub mod oracle;
pub mod value;

pub use oracle::{is_type, obj_type, type_of, ObjType, TypeTag};
pub use value::{
    ErrorValue, FunctionKind, FunctionRef, Instance, PromiseState, RegExpValue, TypedArray,
    TypedArrayKind, Value, ValueArray, ValueObject,
};
