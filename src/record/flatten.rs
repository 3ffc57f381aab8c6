//! Flatten / unflatten of nested mappings
//!
//! `{"a": {"b": 1, "c": [true, false]}}` flattens to
//! `{"a.b": 1, "a.c.0": true, "a.c.1": false}`. Empty mappings and
//! sequences are kept as leaf values.
//!
//! Unflatten rebuilds nested mappings and turns any mapping whose keys are
//! exactly `0..n` into a sequence. The round trip is exact for mappings of
//! scalars whose keys contain neither the separator nor bare integers;
//! mappings keyed `"0".."n"` come back as sequences.

use serde_json::{Map, Value};

/// Collapse nested structure into separator-joined keys
pub fn flatten_map(map: &Map<String, Value>, separator: &str) -> Map<String, Value> {
    let mut out = Map::new();
    for (key, value) in map {
        flatten_into(key.clone(), value, separator, &mut out);
    }
    out
}

fn flatten_into(prefix: String, value: &Value, separator: &str, out: &mut Map<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(format!("{}{}{}", prefix, separator, key), child, separator, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(format!("{}{}{}", prefix, separator, index), child, separator, out);
            }
        }
        leaf => {
            out.insert(prefix, leaf.clone());
        }
    }
}

/// Rebuild nested structure from separator-joined keys
pub fn unflatten_map(map: &Map<String, Value>, separator: &str) -> Map<String, Value> {
    let mut root = Map::new();
    for (key, value) in map {
        let segments: Vec<&str> = if separator.is_empty() {
            vec![key.as_str()]
        } else {
            key.split(separator).collect()
        };
        insert_path(&mut root, &segments, value.clone());
    }

    root.into_iter()
        .map(|(key, value)| (key, restore_sequences(value)))
        .collect()
}

fn insert_path(map: &mut Map<String, Value>, segments: &[&str], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        map.insert((*first).to_string(), value);
        return;
    }

    let slot = map
        .entry((*first).to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    if let Value::Object(child) = slot {
        insert_path(child, rest, value);
    }
}

fn restore_sequences(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .into_iter()
                .map(|(key, child)| (key, restore_sequences(child)))
                .collect();
            match sequence_order(&map) {
                Some(order) => Value::Array(
                    order
                        .into_iter()
                        .filter_map(|key| map.get(&key).cloned())
                        .collect(),
                ),
                None => Value::Object(map),
            }
        }
        other => other,
    }
}

/// Keys in index order when the mapping's keys are exactly `0..n`
fn sequence_order(map: &Map<String, Value>) -> Option<Vec<String>> {
    if map.is_empty() {
        return None;
    }
    let mut seen = vec![false; map.len()];
    for key in map.keys() {
        if key.len() > 1 && key.starts_with('0') {
            return None;
        }
        let index: usize = key.parse().ok()?;
        if index >= seen.len() || seen[index] {
            return None;
        }
        seen[index] = true;
    }
    Some((0..map.len()).map(|i| i.to_string()).collect())
}
