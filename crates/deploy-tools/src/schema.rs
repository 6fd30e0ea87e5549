//! Runtime argument validation against a tool's JSON schema.
//!
//! Only the subset of JSON Schema the built-in tools declare is checked:
//! `required`, primitive `type`s for each property, and `enum` values.
//! Properties not listed in the schema pass through untouched.

use crate::{ToolError, ToolResult};
use serde_json::Value;

/// Validate `args` against an object schema.
pub fn validate(schema: &Value, args: &Value) -> ToolResult<()> {
    let Some(obj) = args.as_object() else {
        return Err(ToolError::validation("arguments must be a JSON object"));
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            match obj.get(name) {
                None | Some(Value::Null) => {
                    return Err(ToolError::validation(format!(
                        "missing required property '{name}'"
                    )))
                }
                Some(_) => {}
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };

    for (name, value) in obj {
        // Optional properties may be sent as explicit nulls.
        if value.is_null() {
            continue;
        }
        let Some(prop) = properties.get(name) else {
            continue;
        };

        if let Some(expected) = prop.get("type").and_then(Value::as_str) {
            if !type_matches(expected, value) {
                return Err(ToolError::validation(format!(
                    "property '{name}' must be of type {expected}, got {}",
                    type_name(value)
                )));
            }
        }

        if let Some(allowed) = prop.get("enum").and_then(Value::as_array) {
            if !allowed.contains(value) {
                let options: Vec<String> = allowed.iter().map(Value::to_string).collect();
                return Err(ToolError::validation(format!(
                    "property '{name}' must be one of {}",
                    options.join(", ")
                )));
            }
        }
    }

    Ok(())
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
