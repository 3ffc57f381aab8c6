//! Value helpers shared by record operations and match expressions

use serde_json::{Map, Value};

use super::cast::render;
use crate::errors::{HarvestError, HarvestResult};

/// Convert `[{name_key: k, value_key: v}, ...]` into `{k: v, ...}`
///
/// Entries without `name_key` are skipped; a missing `value_key` yields `null`.
/// A common use is turning tag lists like `[{Key: "Name", Value: "web"}]`
/// into `{Name: "web"}`.
pub fn key_value_list_to_dict(
    value: &Value,
    name_key: &str,
    value_key: &str,
) -> HarvestResult<Map<String, Value>> {
    let items = value
        .as_array()
        .ok_or_else(|| HarvestError::coercion(render(value), "list of mappings"))?;

    let mut map = Map::new();
    for item in items {
        let Some(entry) = item.as_object() else {
            continue;
        };
        let Some(name) = entry.get(name_key) else {
            continue;
        };
        map.insert(
            render(name),
            entry.get(value_key).cloned().unwrap_or(Value::Null),
        );
    }
    Ok(map)
}

/// Join the rendered elements of a list with `delimiter`
pub fn delimiter_list_to_string(value: &Value, delimiter: &str) -> HarvestResult<String> {
    let items = value
        .as_array()
        .ok_or_else(|| HarvestError::coercion(render(value), "list"))?;

    Ok(items.iter().map(render).collect::<Vec<_>>().join(delimiter))
}

/// Resolve a Python-style slice `[start:end]` against a length
///
/// Negative indices count from the end; out-of-range bounds clamp.
pub fn slice_bounds(len: usize, start: Option<i64>, end: Option<i64>) -> (usize, usize) {
    let len = len as i64;
    let clamp = |index: i64| -> i64 {
        let index = if index < 0 { index + len } else { index };
        index.clamp(0, len)
    };

    let from = start.map(clamp).unwrap_or(0);
    let to = end.map(clamp).unwrap_or(len);
    if to <= from {
        (from as usize, from as usize)
    } else {
        (from as usize, to as usize)
    }
}

/// Slice a string (by characters) or a list
pub fn slice_value(value: &Value, start: Option<i64>, end: Option<i64>) -> HarvestResult<Value> {
    match value {
        Value::String(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (from, to) = slice_bounds(chars.len(), start, end);
            Ok(Value::String(chars[from..to].iter().collect()))
        }
        Value::Array(items) => {
            let (from, to) = slice_bounds(items.len(), start, end);
            Ok(Value::Array(items[from..to].to_vec()))
        }
        other => Err(HarvestError::coercion(render(other), "sequence")),
    }
}

/// Render a value as JSON with object keys sorted at every level
///
/// Two values are content-equal regardless of key order iff their
/// canonical forms are equal. Integral floats are written as integers,
/// so `1` and `1.0` are the same content.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                out.push_str(&(f as i64).to_string())
            }
            _ => out.push_str(&n.to_string()),
        },
        scalar => out.push_str(&scalar.to_string()),
    }
}
