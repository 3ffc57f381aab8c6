//! Named record sets and cross-set joins

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::index::IndexKey;
use super::set::RecordSet;
use crate::errors::{HarvestError, HarvestResult};
use crate::observability::{log_event_with_fields, Event};
use crate::operations::{Args, OperationContext, OperationRegistry, Outcome};
use crate::record::Record;

/// Join semantics for [`RecordSetCollection::join`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    /// Keys present on both sides
    Inner,
    /// Every left key
    Left,
    /// Every right key
    Right,
    /// Every key on either side
    Outer,
}

impl JoinType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Right => "right",
            JoinType::Outer => "outer",
        }
    }

    fn keeps_left_only(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Outer)
    }

    fn keeps_right_only(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Outer)
    }
}

impl FromStr for JoinType {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inner" => Ok(JoinType::Inner),
            "left" => Ok(JoinType::Left),
            "right" => Ok(JoinType::Right),
            "outer" => Ok(JoinType::Outer),
            other => Err(HarvestError::NotSupported(format!("join type '{}'", other))),
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Per-set summary returned by [`RecordSetCollection::list`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSetSummary {
    pub name: String,
    pub keys: Vec<String>,
    pub matches: usize,
    pub total: usize,
}

/// Record sets by name
///
/// Each set is owned by exactly one entry.
#[derive(Debug, Clone, Default)]
pub struct RecordSetCollection {
    sets: BTreeMap<String, RecordSet>,
}

impl RecordSetCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a set under `name`, replacing any previous one
    pub fn add(&mut self, name: impl Into<String>, set: RecordSet) -> &mut Self {
        self.sets.insert(name.into(), set);
        self
    }

    pub fn get(&self, name: &str) -> HarvestResult<&RecordSet> {
        self.sets
            .get(name)
            .ok_or_else(|| HarvestError::RecordSetNotFound(name.to_string()))
    }

    pub fn get_mut(&mut self, name: &str) -> HarvestResult<&mut RecordSet> {
        self.sets
            .get_mut(name)
            .ok_or_else(|| HarvestError::RecordSetNotFound(name.to_string()))
    }

    /// Lookup that treats a missing set as `None`
    pub fn query(&self, name: &str) -> Option<&RecordSet> {
        self.sets.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sets.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn remove(&mut self, name: &str) -> HarvestResult<RecordSet> {
        self.sets
            .remove(name)
            .ok_or_else(|| HarvestError::RecordSetNotFound(name.to_string()))
    }

    /// Move a set to a new name, replacing any set already there
    pub fn rename(&mut self, old_name: &str, new_name: &str) -> HarvestResult<&mut Self> {
        let set = self.remove(old_name)?;
        self.sets.insert(new_name.to_string(), set);
        log_event_with_fields(Event::RecordSetRenamed, &[("from", old_name), ("to", new_name)]);
        Ok(self)
    }

    /// Drop every set
    pub fn purge(&mut self) -> &mut Self {
        let purged = self.sets.len().to_string();
        self.sets.clear();
        log_event_with_fields(Event::RecordSetsPurged, &[("sets", &purged)]);
        self
    }

    /// Create an index on a named set
    pub fn index<S: AsRef<str>>(
        &mut self,
        set_name: &str,
        index_name: &str,
        fields: &[S],
    ) -> HarvestResult<&mut Self> {
        self.get_mut(set_name)?.create_index(index_name, fields)?;
        Ok(self)
    }

    /// Join two sets on an index both of them carry
    ///
    /// Matching entries merge with right-side fields overwriting left-side
    /// ones. The result is stored under `new_name`, carries a fresh copy of
    /// the join index and starts with no evaluated expressions.
    pub fn join(
        &mut self,
        new_name: &str,
        left: &str,
        right: &str,
        index_name: &str,
        join_type: JoinType,
    ) -> HarvestResult<&RecordSet> {
        let left_index = self.get(left)?.index(index_name)?;
        let right_index = self.get(right)?.index(index_name)?;

        let mut joined: Vec<Record> = Vec::new();
        for (key, left_record) in left_index.iter() {
            match right_index.get(key) {
                Some(right_record) => joined.push(merge(left_record, right_record)),
                None if join_type.keeps_left_only() => joined.push(fresh(left_record)),
                None => {}
            }
        }
        if join_type.keeps_right_only() {
            let right_only = right_index
                .iter()
                .filter(|(key, _)| !left_index.contains(key))
                .map(|(_, record)| fresh(record));
            joined.extend(right_only);
        }

        let fields = left_index.fields().to_vec();
        let mut result = RecordSet::from_records(joined);
        result.create_index(index_name, &fields)?;

        log_event_with_fields(
            Event::RecordSetJoined,
            &[
                ("name", new_name),
                ("left", left),
                ("right", right),
                ("index", index_name),
                ("join_type", join_type.as_str()),
                ("records", &result.len().to_string()),
            ],
        );

        self.sets.insert(new_name.to_string(), result);
        self.get(new_name)
    }

    /// Summary of every set in name order
    pub fn list(&self) -> Vec<RecordSetSummary> {
        self.sets
            .iter()
            .map(|(name, set)| RecordSetSummary {
                name: name.clone(),
                keys: set.keys(),
                matches: set.matched_count(),
                total: set.len(),
            })
            .collect()
    }

    /// Dispatch a named operation against a named set
    pub fn apply(
        &mut self,
        set_name: &str,
        operation: &str,
        args: &Args,
        registry: &OperationRegistry,
        context: &OperationContext,
    ) -> HarvestResult<Outcome> {
        let set = self.get_mut(set_name)?;
        registry.apply(set, operation, args, context)
    }

    /// Fetch the record stored under `values` in a set's index
    pub fn lookup(
        &self,
        set_name: &str,
        index_name: &str,
        values: &[serde_json::Value],
    ) -> HarvestResult<Option<&Record>> {
        let index = self.get(set_name)?.index(index_name)?;
        Ok(index.get(&IndexKey::from_values(values)))
    }
}

fn fresh(record: &Record) -> Record {
    Record::from_map(record.data().clone())
}

fn merge(left: &Record, right: &Record) -> Record {
    let mut data = left.data().clone();
    data.extend(right.data().clone());
    Record::from_map(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn collection() -> RecordSetCollection {
        let mut left = RecordSet::from_values(vec![
            json!({"id": 1, "name": "a", "side": "left"}),
            json!({"id": 2, "name": "b", "side": "left"}),
        ])
        .unwrap();
        let mut right = RecordSet::from_values(vec![
            json!({"id": 2, "size": 20, "side": "right"}),
            json!({"id": 3, "size": 30, "side": "right"}),
        ])
        .unwrap();
        left.create_index("by_id", &["id"]).unwrap();
        right.create_index("by_id", &["id"]).unwrap();

        let mut collection = RecordSetCollection::new();
        collection.add("left", left).add("right", right);
        collection
    }

    fn ids(set: &RecordSet) -> Vec<i64> {
        set.iter()
            .filter_map(|r| r.get("id").and_then(|v| v.as_i64()))
            .collect()
    }

    #[test]
    fn test_join_types() {
        let mut c = collection();

        let inner = c.join("j", "left", "right", "by_id", JoinType::Inner).unwrap();
        assert_eq!(ids(inner), vec![2]);
        let merged = inner.get(0).unwrap();
        assert_eq!(merged.get("name"), Some(&json!("b")));
        assert_eq!(merged.get("size"), Some(&json!(20)));
        assert_eq!(merged.get("side"), Some(&json!("right")));

        assert_eq!(ids(c.join("j", "left", "right", "by_id", JoinType::Left).unwrap()), vec![1, 2]);
        assert_eq!(ids(c.join("j", "left", "right", "by_id", JoinType::Right).unwrap()), vec![2, 3]);
        assert_eq!(
            ids(c.join("j", "left", "right", "by_id", JoinType::Outer).unwrap()),
            vec![1, 2, 3]
        );
        assert!(c.get("j").unwrap().has_index("by_id"));
    }

    #[test]
    fn test_join_requires_index_on_both_sides() {
        let mut c = collection();
        c.get_mut("right").unwrap().drop_index("by_id").unwrap();
        assert!(matches!(
            c.join("j", "left", "right", "by_id", JoinType::Inner).unwrap_err(),
            HarvestError::IndexNotFound(_)
        ));
        assert!(!c.contains("j"));
    }

    #[test]
    fn test_unknown_join_type() {
        assert!(matches!(
            "cross".parse::<JoinType>().unwrap_err(),
            HarvestError::NotSupported(_)
        ));
        assert_eq!("outer".parse::<JoinType>().unwrap(), JoinType::Outer);
    }

    #[test]
    fn test_rename_remove_purge() {
        let mut c = collection();
        c.rename("left", "primary").unwrap();
        assert!(c.query("left").is_none());
        assert!(c.query("primary").is_some());

        assert!(matches!(
            c.rename("missing", "x").unwrap_err(),
            HarvestError::RecordSetNotFound(_)
        ));

        c.remove("right").unwrap();
        assert_eq!(c.names(), vec!["primary"]);

        c.purge();
        assert!(c.is_empty());
    }

    #[test]
    fn test_list_summaries() {
        let c = collection();
        let summaries = c.list();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].name, "left");
        assert_eq!(summaries[0].keys, vec!["id", "name", "side"]);
        assert_eq!(summaries[0].matches, 2);
        assert_eq!(summaries[0].total, 2);

        let value = serde_json::to_value(&summaries[1]).unwrap();
        assert_eq!(value["Name"], json!("right"));
        assert_eq!(value["Total"], json!(2));
    }

    #[test]
    fn test_index_and_lookup() {
        let mut c = collection();
        c.index("left", "by_name", &["name"]).unwrap();
        let found = c.lookup("left", "by_name", &[json!("a")]).unwrap().unwrap();
        assert_eq!(found.get("id"), Some(&json!(1)));
    }
}
