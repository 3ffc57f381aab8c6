//! Record: an ordered key-value mapping with match state
//!
//! A record is matched iff none of the expressions evaluated against it so
//! far failed; a fresh record is matched. Transformation operations mutate
//! the record in place and return it for chaining.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::flatten::{flatten_map, unflatten_map};
use super::freshness::Freshness;
use crate::errors::{HarvestError, HarvestResult};
use crate::functions::{
    canonical_json, cast, is_truthy, key_value_list_to_dict, parse_timestamp, render, slice_value,
    CastKind, FunctionRegistry,
};
use crate::matching::{Expression, Match};

/// What `merge_json_string` does with the parsed document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonMergeMode {
    /// Store under a new key
    Key,
    /// Merge top-level keys into the record
    Merge,
    /// Overwrite the source key
    Replace,
}

impl FromStr for JsonMergeMode {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "key" => Ok(JsonMergeMode::Key),
            "merge" => Ok(JsonMergeMode::Merge),
            "replace" => Ok(JsonMergeMode::Replace),
            other => Err(HarvestError::invalid_argument(
                "mode",
                format!("expected key, merge or replace, got '{}'", other),
            )),
        }
    }
}

/// A single record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    data: Map<String, Value>,
    is_flat: bool,
    matching_expressions: Vec<Match>,
    non_matching_expressions: Vec<Match>,
}

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record from a mapping
    pub fn from_map(data: Map<String, Value>) -> Self {
        Self {
            data,
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------
    // Mapping access
    // ------------------------------------------------------------------

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.data.get_mut(key)
    }

    /// Insert or overwrite a value; new keys go last
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.data.insert(key.into(), value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.data.keys()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The record's mapping
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.data
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.data.clone())
    }

    fn require(&self, key: &str) -> HarvestResult<&Value> {
        self.data
            .get(key)
            .ok_or_else(|| HarvestError::KeyNotFound(key.to_string()))
    }

    /// Remove a key keeping the order of the remaining keys
    fn take(&mut self, key: &str) -> Option<Value> {
        if !self.data.contains_key(key) {
            return None;
        }
        let mut taken = None;
        self.data = std::mem::take(&mut self.data)
            .into_iter()
            .filter_map(|(k, v)| {
                if k == key {
                    taken = Some(v);
                    None
                } else {
                    Some((k, v))
                }
            })
            .collect();
        taken
    }

    // ------------------------------------------------------------------
    // Match state
    // ------------------------------------------------------------------

    /// True iff no evaluated expression failed
    pub fn is_matched(&self) -> bool {
        self.non_matching_expressions.is_empty()
    }

    pub fn is_flat(&self) -> bool {
        self.is_flat
    }

    pub fn matching_expressions(&self) -> &[Match] {
        &self.matching_expressions
    }

    pub fn non_matching_expressions(&self) -> &[Match] {
        &self.non_matching_expressions
    }

    /// Evaluate an expression and record the outcome
    ///
    /// Evaluation errors propagate and leave the match state untouched.
    pub fn match_expression(
        &mut self,
        expression: &Expression,
        functions: &FunctionRegistry,
    ) -> HarvestResult<bool> {
        let outcome = Match::evaluate(expression, &self.data, functions)?;
        let is_match = outcome.is_match();
        self.push_match(outcome);
        Ok(is_match)
    }

    /// Parse and evaluate an expression string
    pub fn match_str(&mut self, source: &str, functions: &FunctionRegistry) -> HarvestResult<bool> {
        let expression = Expression::parse(source)?;
        self.match_expression(&expression, functions)
    }

    /// Append an evaluated match to the matching or non-matching list
    pub fn push_match(&mut self, outcome: Match) {
        if outcome.is_match() {
            self.matching_expressions.push(outcome);
        } else {
            self.non_matching_expressions.push(outcome);
        }
    }

    /// Forget every evaluated expression; the record is matched again
    pub fn reset_matches(&mut self) -> &mut Self {
        self.matching_expressions.clear();
        self.non_matching_expressions.clear();
        self
    }

    /// Alias of [`reset_matches`](Self::reset_matches)
    pub fn clear_matches(&mut self) -> &mut Self {
        self.reset_matches()
    }

    // ------------------------------------------------------------------
    // Structural edits
    // ------------------------------------------------------------------

    /// Rename a key in place, keeping its position
    ///
    /// An existing `new_key` is overwritten.
    pub fn rename_key(&mut self, old_key: &str, new_key: &str) -> HarvestResult<&mut Self> {
        self.require(old_key)?;
        if old_key == new_key {
            return Ok(self);
        }
        self.data = std::mem::take(&mut self.data)
            .into_iter()
            .filter(|(k, _)| k != new_key)
            .map(|(k, v)| if k == old_key { (new_key.to_string(), v) } else { (k, v) })
            .collect();
        Ok(self)
    }

    pub fn copy_key(&mut self, source_key: &str, target_key: &str) -> HarvestResult<&mut Self> {
        let value = self.require(source_key)?.clone();
        self.data.insert(target_key.to_string(), value);
        Ok(self)
    }

    pub fn remove_key(&mut self, key: &str) -> HarvestResult<&mut Self> {
        self.take(key)
            .ok_or_else(|| HarvestError::KeyNotFound(key.to_string()))?;
        Ok(self)
    }

    /// Coerce a value, writing to `target_key` or overwriting `source_key`
    ///
    /// Unlike coercion inside match expressions, a failure here is an error.
    pub fn cast(
        &mut self,
        source_key: &str,
        kind: CastKind,
        target_key: Option<&str>,
    ) -> HarvestResult<&mut Self> {
        let value = cast(self.require(source_key)?, kind)?;
        self.data
            .insert(target_key.unwrap_or(source_key).to_string(), value);
        Ok(self)
    }

    /// Split a string value into a sequence; other values pass through
    pub fn split_key(
        &mut self,
        source_key: &str,
        target_key: Option<&str>,
        delimiter: &str,
    ) -> HarvestResult<&mut Self> {
        if delimiter.is_empty() {
            return Err(HarvestError::invalid_argument("delimiter", "empty delimiter"));
        }
        let value = match self.require(source_key)? {
            Value::String(s) => Value::Array(
                s.split(delimiter)
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ),
            other => other.clone(),
        };
        self.data
            .insert(target_key.unwrap_or(source_key).to_string(), value);
        Ok(self)
    }

    /// Slice a string or sequence value; out-of-range bounds clamp
    pub fn substring(
        &mut self,
        source_key: &str,
        start: Option<i64>,
        end: Option<i64>,
        target_key: Option<&str>,
    ) -> HarvestResult<&mut Self> {
        let value = slice_value(self.require(source_key)?, start, end)?;
        self.data
            .insert(target_key.unwrap_or(source_key).to_string(), value);
        Ok(self)
    }

    /// Slice a value and optionally join the sliced sequence with `delimiter`
    pub fn assign_elements(
        &mut self,
        source_key: &str,
        target_key: &str,
        start: Option<i64>,
        end: Option<i64>,
        delimiter: Option<&str>,
    ) -> HarvestResult<&mut Self> {
        let mut value = slice_value(self.require(source_key)?, start, end)?;
        if let (Some(delimiter), Value::Array(items)) = (delimiter, &value) {
            value = Value::String(items.iter().map(render).collect::<Vec<_>>().join(delimiter));
        }
        self.data.insert(target_key.to_string(), value);
        Ok(self)
    }

    /// Join the values of `sequence` into a new string key
    ///
    /// Entries that are not keys of the record are used literally.
    pub fn add_key_from_keys<S: AsRef<str>>(
        &mut self,
        new_key: &str,
        sequence: &[S],
        delimiter: &str,
    ) -> &mut Self {
        let joined = sequence
            .iter()
            .map(|item| {
                let item = item.as_ref();
                self.data
                    .get(item)
                    .map(render)
                    .unwrap_or_else(|| item.to_string())
            })
            .collect::<Vec<_>>()
            .join(delimiter);
        self.data.insert(new_key.to_string(), Value::String(joined));
        self
    }

    /// First truthy value among `keys`
    pub fn first_not_null_value<S: AsRef<str>>(&self, keys: &[S]) -> Option<&Value> {
        keys.iter()
            .filter_map(|key| self.data.get(key.as_ref()))
            .find(|value| is_truthy(value))
    }

    // ------------------------------------------------------------------
    // Reshaping
    // ------------------------------------------------------------------

    /// Collapse nested mappings into separator-joined keys; no-op when flat
    pub fn flatten(&mut self, separator: &str) -> &mut Self {
        if !self.is_flat {
            self.data = flatten_map(&self.data, separator);
            self.is_flat = true;
        }
        self
    }

    /// Rebuild nested mappings from separator-joined keys; no-op when nested
    pub fn unflatten(&mut self, separator: &str) -> &mut Self {
        if self.is_flat {
            self.data = unflatten_map(&self.data, separator);
            self.is_flat = false;
        }
        self
    }

    /// Parse a JSON string value and store, merge or substitute it
    pub fn merge_json_string(
        &mut self,
        source_key: &str,
        mode: JsonMergeMode,
        new_key: Option<&str>,
    ) -> HarvestResult<&mut Self> {
        let text = match self.require(source_key)? {
            Value::String(text) => text,
            other => return Err(HarvestError::coercion(render(other), "JSON string")),
        };
        let parsed: Value = serde_json::from_str(text)?;

        match mode {
            JsonMergeMode::Key => {
                let new_key = new_key.ok_or_else(|| {
                    HarvestError::invalid_argument("new_key", "required when mode is 'key'")
                })?;
                self.data.insert(new_key.to_string(), parsed);
            }
            JsonMergeMode::Merge => match parsed {
                Value::Object(map) => self.data.extend(map),
                other => return Err(HarvestError::coercion(other, "mapping")),
            },
            JsonMergeMode::Replace => {
                self.data.insert(source_key.to_string(), parsed);
            }
        }
        Ok(self)
    }

    /// Convert a list of `{name_key: k, value_key: v}` into `{k: v}`
    ///
    /// The source key is removed when a distinct `target_key` is given and
    /// `preserve_original` is false.
    pub fn list_of_pairs_to_mapping(
        &mut self,
        source_key: &str,
        name_key: &str,
        value_key: &str,
        target_key: Option<&str>,
        preserve_original: bool,
    ) -> HarvestResult<&mut Self> {
        let map = key_value_list_to_dict(self.require(source_key)?, name_key, value_key)?;
        let target = target_key.unwrap_or(source_key);
        self.data.insert(target.to_string(), Value::Object(map));

        if !preserve_original && target != source_key {
            self.take(source_key);
        }
        Ok(self)
    }

    // ------------------------------------------------------------------
    // Derived values
    // ------------------------------------------------------------------

    fn lookup_path(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.data.get(*first)?;
        for segment in rest {
            current = current.as_object()?.get(*segment)?;
        }
        Some(current)
    }

    fn harvest_date(&self, name: &str) -> Option<&Value> {
        let dotted = format!("Harvest.Dates.{}", name);
        [
            self.lookup_path(&["Harvest", "Dates", name]),
            self.data.get(&dotted),
            self.data.get(name),
        ]
        .into_iter()
        .flatten()
        .find(|value| is_truthy(value))
    }

    /// Write a freshness code under `key`, relative to the current time
    pub fn add_freshness(&mut self, fresh_seconds: i64, aging_seconds: i64, key: &str) -> &mut Self {
        self.add_freshness_at(Utc::now(), fresh_seconds, aging_seconds, key)
    }

    /// Write a freshness code under `key`, relative to `now`
    ///
    /// Reads `Harvest.Dates.Active` / `Harvest.Dates.LastSeen`, falling back
    /// to top-level `Active` / `LastSeen`.
    pub fn add_freshness_at(
        &mut self,
        now: DateTime<Utc>,
        fresh_seconds: i64,
        aging_seconds: i64,
        key: &str,
    ) -> &mut Self {
        let active = self.harvest_date("Active").is_some();
        let last_seen = self.harvest_date("LastSeen").and_then(parse_timestamp);

        let freshness = Freshness::classify(active, last_seen, now, fresh_seconds, aging_seconds);
        self.data
            .insert(key.to_string(), Value::String(freshness.code().to_string()));
        self
    }

    /// SHA-256 of the record's key-order-independent content
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content_key().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Canonical JSON of the record's content
    pub fn content_key(&self) -> String {
        canonical_json(&Value::Object(self.data.clone()))
    }
}

impl From<Map<String, Value>> for Record {
    fn from(data: Map<String, Value>) -> Self {
        Self::from_map(data)
    }
}

impl TryFrom<Value> for Record {
    type Error = HarvestError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(HarvestError::coercion(other, "record mapping")),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.data.serialize(serializer)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.data.clone()))
    }
}
