//! Type oracle tests
//!
//! Covers classification of every value kind, the capitalized-query /
//! lowercase-answer contract, and the undefined short-circuit.

use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;
use tinyai_runtime::{
    is_type, obj_type, type_of, FunctionKind, ObjType, PromiseState, TypeTag, TypedArray,
    TypedArrayKind, Value,
};

fn tag(value: &Value) -> &'static str {
    type_of(value).expect("defined value").as_str()
}

#[rstest]
#[case(Value::array(vec![]), "array")]
#[case(Value::object(Vec::<(String, Value)>::new()), "object")]
#[case(Value::string("x"), "string")]
#[case(Value::Null, "null")]
#[case(Value::Number(42.0), "number")]
#[case(Value::Number(f64::NAN), "number")]
#[case(Value::Bool(false), "boolean")]
#[case(Value::BigInt(10), "bigint")]
#[case(Value::Symbol(Some(Arc::from("id"))), "symbol")]
#[case(Value::function("greet", 1), "function")]
#[case(Value::Date(0.0), "date")]
#[case(Value::regexp("^a+$", "g"), "regexp")]
#[case(Value::error("TypeError", "bad"), "error")]
#[case(Value::Map(Arc::new(vec![])), "map")]
#[case(Value::Set(Arc::new(vec![])), "set")]
#[case(Value::Promise(Arc::new(PromiseState::Pending)), "promise")]
#[case(Value::ArrayBuffer(Arc::new(vec![0; 4])), "arraybuffer")]
fn test_type_of_kinds(#[case] value: Value, #[case] expected: &str) {
    assert_eq!(tag(&value), expected);
}

#[rstest]
#[case(FunctionKind::Normal, "function")]
#[case(FunctionKind::Async, "asyncfunction")]
#[case(FunctionKind::Generator, "generatorfunction")]
#[case(FunctionKind::AsyncGenerator, "asyncgeneratorfunction")]
fn test_type_of_function_flavors(#[case] kind: FunctionKind, #[case] expected: &str) {
    assert_eq!(tag(&Value::function_of("f", 0, kind)), expected);
}

#[rstest]
#[case(TypedArrayKind::Uint8, "uint8array")]
#[case(TypedArrayKind::Float64, "float64array")]
#[case(TypedArrayKind::BigInt64, "bigint64array")]
fn test_type_of_typed_arrays(#[case] kind: TypedArrayKind, #[case] expected: &str) {
    let view = Value::TypedArray(TypedArray {
        kind,
        bytes: Arc::new(vec![0; 16]),
    });
    assert_eq!(tag(&view), expected);
}

#[test]
fn test_undefined_is_absent() {
    assert_eq!(type_of(&Value::Undefined), None);
}

#[test]
fn test_null_is_not_absent() {
    assert_eq!(type_of(&Value::Null), Some(TypeTag::Null));
}

#[test]
fn test_subclass_sees_through_to_base() {
    let list = Value::instance("TodoList", Value::array(vec![Value::Number(1.0)]));
    assert_eq!(tag(&list), "array");
    assert!(is_type(&list, "Array"));
    assert!(!is_type(&list, "TodoList"));

    let plain = Value::instance("TinyAiInstance", Value::object(Vec::<(String, Value)>::new()));
    assert_eq!(tag(&plain), "object");

    let custom_error = Value::instance("ApiError", Value::error("Error", "quota"));
    assert_eq!(tag(&custom_error), "error");
}

#[rstest]
#[case(Value::array(vec![]), "Array", true)]
#[case(Value::object(Vec::<(String, Value)>::new()), "Array", false)]
#[case(Value::string("x"), "String", true)]
#[case(Value::array(vec![]), "array", false)]
#[case(Value::Null, "Null", true)]
#[case(Value::Null, "null", false)]
#[case(Value::regexp("a", ""), "RegExp", true)]
#[case(Value::regexp("a", ""), "Regexp", false)]
#[case(Value::function_of("f", 0, FunctionKind::Async), "AsyncFunction", true)]
#[case(Value::function_of("f", 0, FunctionKind::Async), "Function", false)]
fn test_is_type_capitalized_queries(
    #[case] value: Value,
    #[case] candidate: &str,
    #[case] expected: bool,
) {
    assert_eq!(is_type(&value, candidate), expected);
}

#[test]
fn test_is_type_undefined_never_matches() {
    assert!(!is_type(&Value::Undefined, "Undefined"));
    assert!(!is_type(&Value::Undefined, "undefined"));
}

#[test]
fn test_obj_type_dual_mode() {
    let v = Value::array(vec![]);
    assert_eq!(obj_type(&v, None), ObjType::Tag(TypeTag::Array));
    assert_eq!(obj_type(&v, Some("Array")), ObjType::Matches(true));
    assert_eq!(obj_type(&Value::Undefined, None), ObjType::Absent);
}

#[test]
fn test_json_values_classify() {
    let payload = Value::from(json!({"candidates": [{"text": "hi"}], "usage": null}));
    assert_eq!(tag(&payload), "object");
    if let Value::Object(obj) = &payload {
        assert_eq!(tag(obj.get("candidates").unwrap()), "array");
        assert_eq!(tag(obj.get("usage").unwrap()), "null");
    }
}

fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<f64>().prop_map(Value::Number),
        any::<i64>().prop_map(|n| Value::BigInt(n as i128)),
        "[a-z]{0,8}".prop_map(|s| Value::string(s)),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::array),
            prop::collection::vec(("[a-z]{1,4}", inner.clone()), 0..4)
                .prop_map(|entries| Value::object(entries)),
            ("[A-Z][a-z]{0,6}", inner).prop_map(|(name, base)| Value::instance(name, base)),
        ]
    })
}

proptest! {
    #[test]
    fn prop_type_of_is_idempotent(value in arb_value()) {
        prop_assert_eq!(type_of(&value), type_of(&value));
    }

    #[test]
    fn prop_defined_values_get_lowercase_tags(value in arb_value()) {
        let undefined = value.is_undefined();
        match type_of(&value) {
            None => prop_assert!(undefined),
            Some(tag) => {
                prop_assert!(!undefined);
                prop_assert_eq!(tag.as_str().to_lowercase(), tag.as_str());
            }
        }
    }

    #[test]
    fn prop_is_type_agrees_with_type_of(value in arb_value()) {
        if let Some(tag) = type_of(&value) {
            prop_assert!(is_type(&value, tag.class_name()));
            prop_assert!(!is_type(&value, tag.as_str()));
        }
    }
}
