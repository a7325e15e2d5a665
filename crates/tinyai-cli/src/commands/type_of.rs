//! Typeof command - run the type oracle over a JSON literal

use anyhow::{Context, Result};
use tinyai_runtime::{obj_type, ObjType, Value};

/// Parse a JSON literal, accepting the bare word `undefined`
fn parse_value(input: &str) -> Result<Value> {
    let input = input.trim();
    if input == "undefined" {
        return Ok(Value::Undefined);
    }
    let json: serde_json::Value =
        serde_json::from_str(input).with_context(|| format!("Not a JSON value: {}", input))?;
    Ok(Value::from(json))
}

pub fn run(input: &str, class: Option<&str>, json: bool) -> Result<()> {
    let value = parse_value(input)?;
    let result = obj_type(&value, class);

    if json {
        let out = match result {
            ObjType::Absent => serde_json::json!({ "type": null }),
            ObjType::Tag(tag) => serde_json::json!({ "type": tag.as_str() }),
            ObjType::Matches(matches) => serde_json::json!({ "matches": matches }),
        };
        println!("{}", out);
        return Ok(());
    }

    match result {
        // Undefined has no classification, and matches no class name
        ObjType::Absent if class.is_some() => println!("false"),
        ObjType::Absent => println!("none"),
        ObjType::Tag(tag) => println!("{}", tag),
        ObjType::Matches(matches) => println!("{}", matches),
    }
    Ok(())
}
