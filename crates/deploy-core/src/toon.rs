//! Token-oriented object notation.
//!
//! A compact, indentation-based rendering of JSON values used for the
//! context bundle. Uniform arrays of flat objects become tables:
//!
//! ```text
//! files[2]{name,content}:
//!   a.txt,hello
//!   b.txt,world
//! ```
//!
//! Scalars are written bare unless they would be ambiguous, in which case
//! they are quoted with JSON escapes.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

const INDENT: &str = "  ";
const MAX_DEPTH: usize = 32;

#[derive(Debug, Error)]
pub enum ToonError {
    #[error("value nested deeper than {0} levels")]
    TooDeep(usize),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Encode any serializable value, falling back to pretty JSON.
pub fn to_toon<T: Serialize>(data: &T) -> String {
    let encoded = serde_json::to_value(data)
        .map_err(ToonError::from)
        .and_then(|value| encode(&value));
    match encoded {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "TOON encoding failed, falling back to JSON");
            serde_json::to_string_pretty(data).unwrap_or_default()
        }
    }
}

/// Encode a JSON value.
pub fn encode(value: &Value) -> Result<String, ToonError> {
    let mut lines = Vec::new();
    match value {
        Value::Object(map) => write_object(map, 0, &mut lines)?,
        Value::Array(items) => write_array(None, items, 0, &mut lines)?,
        scalar => lines.push(scalar_to_string(scalar)),
    }
    Ok(lines.join("\n"))
}

fn indent(depth: usize) -> String {
    INDENT.repeat(depth)
}

fn write_object(map: &Map<String, Value>, depth: usize, lines: &mut Vec<String>) -> Result<(), ToonError> {
    if depth > MAX_DEPTH {
        return Err(ToonError::TooDeep(MAX_DEPTH));
    }
    for (key, value) in map {
        write_field(key, value, depth, lines)?;
    }
    Ok(())
}

fn write_field(key: &str, value: &Value, depth: usize, lines: &mut Vec<String>) -> Result<(), ToonError> {
    let key = encode_key(key);
    match value {
        Value::Object(inner) if inner.is_empty() => {
            lines.push(format!("{}{}:", indent(depth), key));
        }
        Value::Object(inner) => {
            lines.push(format!("{}{}:", indent(depth), key));
            write_object(inner, depth + 1, lines)?;
        }
        Value::Array(items) => write_array(Some(&key), items, depth, lines)?,
        scalar => lines.push(format!("{}{}: {}", indent(depth), key, scalar_to_string(scalar))),
    }
    Ok(())
}

fn write_array(
    key: Option<&str>,
    items: &[Value],
    depth: usize,
    lines: &mut Vec<String>,
) -> Result<(), ToonError> {
    if depth > MAX_DEPTH {
        return Err(ToonError::TooDeep(MAX_DEPTH));
    }
    let prefix = format!("{}{}[{}]", indent(depth), key.unwrap_or_default(), items.len());

    if items.iter().all(is_scalar) {
        let row: Vec<String> = items.iter().map(scalar_to_string).collect();
        if row.is_empty() {
            lines.push(format!("{}:", prefix));
        } else {
            lines.push(format!("{}: {}", prefix, row.join(",")));
        }
        return Ok(());
    }

    if let Some(fields) = table_fields(items) {
        let header: Vec<String> = fields.iter().map(|f| encode_key(f)).collect();
        lines.push(format!("{}{{{}}}:", prefix, header.join(",")));
        for item in items {
            if let Value::Object(map) = item {
                let row: Vec<String> = fields
                    .iter()
                    .map(|f| map.get(*f).map(scalar_to_string).unwrap_or_default())
                    .collect();
                lines.push(format!("{}{}", indent(depth + 1), row.join(",")));
            }
        }
        return Ok(());
    }

    lines.push(format!("{}:", prefix));
    for item in items {
        write_list_item(item, depth + 1, lines)?;
    }
    Ok(())
}

fn write_list_item(item: &Value, depth: usize, lines: &mut Vec<String>) -> Result<(), ToonError> {
    match item {
        Value::Object(map) if !map.is_empty() => {
            // The first field shares the dash line, the rest align under it.
            let mut nested = Vec::new();
            write_object(map, depth + 1, &mut nested)?;
            let pad = indent(depth + 1);
            for (i, line) in nested.into_iter().enumerate() {
                if i == 0 {
                    let rest = line.strip_prefix(pad.as_str()).unwrap_or(&line);
                    lines.push(format!("{}- {}", indent(depth), rest));
                } else {
                    lines.push(line);
                }
            }
        }
        Value::Object(_) => lines.push(format!("{}-", indent(depth))),
        Value::Array(inner) => {
            let mut nested = Vec::new();
            write_array(None, inner, depth, &mut nested)?;
            for (i, line) in nested.into_iter().enumerate() {
                if i == 0 {
                    let rest = line.trim_start();
                    lines.push(format!("{}- {}", indent(depth), rest));
                } else {
                    lines.push(line);
                }
            }
        }
        scalar => lines.push(format!("{}- {}", indent(depth), scalar_to_string(scalar))),
    }
    Ok(())
}

/// Field names when every item is an object with the same keys and only
/// scalar values.
fn table_fields(items: &[Value]) -> Option<Vec<&str>> {
    let Value::Object(first) = items.first()? else {
        return None;
    };
    if first.is_empty() {
        return None;
    }
    let fields: Vec<&str> = first.keys().map(String::as_str).collect();

    let uniform = items.iter().all(|item| match item {
        Value::Object(map) => {
            map.len() == fields.len()
                && fields.iter().all(|f| map.get(*f).is_some_and(is_scalar))
        }
        _ => false,
    });
    uniform.then_some(fields)
}

fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => encode_string(s),
        other => other.to_string(),
    }
}

fn encode_key(key: &str) -> String {
    let bare = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && !key.starts_with(|c: char| c.is_ascii_digit());
    if bare {
        key.to_string()
    } else {
        quote(key)
    }
}

fn encode_string(s: &str) -> String {
    if needs_quotes(s) {
        quote(s)
    } else {
        s.to_string()
    }
}

fn needs_quotes(s: &str) -> bool {
    s.is_empty()
        || s != s.trim()
        || matches!(s, "true" | "false" | "null")
        || s.parse::<f64>().is_ok()
        || s.starts_with('-')
        || s.chars().any(|c| {
            matches!(c, ',' | ':' | '"' | '\\' | '[' | ']' | '{' | '}') || c.is_control()
        })
}

fn quote(s: &str) -> String {
    // serde_json's string escaping matches the quoting rules we need.
    Value::String(s.to_string()).to_string()
}
