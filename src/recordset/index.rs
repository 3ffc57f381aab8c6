//! Named snapshot indexes over a record set
//!
//! An index maps an unordered composite key, built from the values of its
//! fields, to a copy of the last record seen with that key. Indexes are
//! snapshots: later mutation of the set does not reach them until
//! `rebuild_index` is called.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use crate::functions::canonical_json;
use crate::record::Record;

/// Unordered composite key
///
/// Holds the canonical JSON of each field value. A missing field
/// contributes `null`. Equal values collapse, so `(a, a)` and `(a)` are
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey(BTreeSet<String>);

impl IndexKey {
    /// Create a key from field values
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        IndexKey(values.into_iter().map(canonical_json).collect())
    }

    /// Create a key from a record's values for `fields`
    pub fn from_record(record: &Record, fields: &[String]) -> Self {
        IndexKey(
            fields
                .iter()
                .map(|field| record.get(field).map(canonical_json).unwrap_or_else(|| "null".to_string()))
                .collect(),
        )
    }

    /// Canonical JSON of each component, sorted
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// A named index snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Index {
    name: String,
    fields: Vec<String>,
    entries: BTreeMap<IndexKey, Record>,
}

impl Index {
    /// Build an index over `records`
    ///
    /// Records sharing a key overwrite each other; the last one wins.
    pub fn build<'a, I>(name: impl Into<String>, fields: Vec<String>, records: I) -> Self
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut index = Self {
            name: name.into(),
            fields,
            entries: BTreeMap::new(),
        };
        index.refresh(records);
        index
    }

    /// Replace the snapshot with one taken from `records`
    pub fn refresh<'a, I>(&mut self, records: I)
    where
        I: IntoIterator<Item = &'a Record>,
    {
        self.entries.clear();
        for record in records {
            let key = IndexKey::from_record(record, &self.fields);
            self.entries.insert(key, record.clone());
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn get(&self, key: &IndexKey) -> Option<&Record> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &IndexKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &Record)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.entries.keys()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
