//! RecordSet: an ordered sequence of records plus named index snapshots
//!
//! Bulk operations either complete or leave the set untouched: results are
//! staged on the side and swapped in once nothing can fail anymore.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::index::{Index, IndexKey};
use crate::errors::{HarvestError, HarvestResult};
use crate::functions::FunctionRegistry;
use crate::matching::{Expression, Match};
use crate::observability::{log_event_with_fields, Event};
use crate::record::Record;

/// An ordered collection of records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    records: Vec<Record>,
    indexes: BTreeMap<String, Index>,
}

impl RecordSet {
    /// Creates an empty record set
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record set from records, keeping their order
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            indexes: BTreeMap::new(),
        }
    }

    /// Creates a record set from raw JSON values
    ///
    /// Fails without building anything if a value is not a mapping.
    pub fn from_values(values: Vec<Value>) -> HarvestResult<Self> {
        let records = values
            .into_iter()
            .map(Record::try_from)
            .collect::<HarvestResult<Vec<_>>>()?;
        Ok(Self::from_records(records))
    }

    /// Append records or raw mappings in order
    pub fn add<I, R>(&mut self, records: I) -> &mut Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Record>,
    {
        let before = self.records.len();
        self.records.extend(records.into_iter().map(Into::into));
        let added = (self.records.len() - before).to_string();
        log_event_with_fields(
            Event::RecordsAdded,
            &[("added", &added), ("total", &self.records.len().to_string())],
        );
        self
    }

    /// Append raw JSON values; nothing is added if one is not a mapping
    pub fn add_values(&mut self, values: Vec<Value>) -> HarvestResult<&mut Self> {
        let records = Self::from_values(values)?.records;
        Ok(self.add(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Record> {
        self.records.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut Record> {
        self.records.get_mut(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Record> {
        self.records.iter_mut()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Sorted union of the keys of every record
    pub fn keys(&self) -> Vec<String> {
        self.records
            .iter()
            .flat_map(|record| record.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Export every record as a JSON mapping
    pub fn to_values(&self) -> Vec<Value> {
        self.records.iter().map(Record::to_value).collect()
    }

    // ------------------------------------------------------------------
    // Indexes
    // ------------------------------------------------------------------

    /// Snapshot the current records under a new index
    ///
    /// Records that share a composite key collapse to the last one seen.
    pub fn create_index<S: AsRef<str>>(&mut self, name: &str, fields: &[S]) -> HarvestResult<&Index> {
        if self.indexes.contains_key(name) {
            return Err(HarvestError::DuplicateIndex(name.to_string()));
        }
        if fields.is_empty() {
            return Err(HarvestError::invalid_argument("fields", "an index needs at least one field"));
        }

        let fields: Vec<String> = fields.iter().map(|f| f.as_ref().to_string()).collect();
        let index = Index::build(name, fields.clone(), &self.records);
        log_event_with_fields(
            Event::IndexCreated,
            &[
                ("index", name),
                ("fields", &fields.join(",")),
                ("entries", &index.len().to_string()),
            ],
        );

        Ok(&*self.indexes.entry(name.to_string()).or_insert(index))
    }

    /// Re-snapshot an existing index from the current records
    pub fn rebuild_index(&mut self, name: &str) -> HarvestResult<&Index> {
        let index = self
            .indexes
            .get_mut(name)
            .ok_or_else(|| HarvestError::IndexNotFound(name.to_string()))?;
        index.refresh(&self.records);
        log_event_with_fields(
            Event::IndexRebuilt,
            &[("index", name), ("entries", &index.len().to_string())],
        );
        Ok(&*index)
    }

    pub fn drop_index(&mut self, name: &str) -> HarvestResult<&mut Self> {
        self.indexes
            .remove(name)
            .ok_or_else(|| HarvestError::IndexNotFound(name.to_string()))?;
        log_event_with_fields(Event::IndexDropped, &[("index", name)]);
        Ok(self)
    }

    pub fn index(&self, name: &str) -> HarvestResult<&Index> {
        self.indexes
            .get(name)
            .ok_or_else(|| HarvestError::IndexNotFound(name.to_string()))
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn index_names(&self) -> Vec<&str> {
        self.indexes.keys().map(String::as_str).collect()
    }

    /// Fetch the snapshot stored under the composite key built from `values`
    pub fn lookup(&self, name: &str, values: &[Value]) -> HarvestResult<Option<&Record>> {
        Ok(self.index(name)?.get(&IndexKey::from_values(values)))
    }

    // ------------------------------------------------------------------
    // Matching
    // ------------------------------------------------------------------

    /// Parse `source` once and evaluate it against every record
    ///
    /// Returns the number of records that satisfied the expression.
    pub fn apply_match(&mut self, source: &str, functions: &FunctionRegistry) -> HarvestResult<usize> {
        let expression = Expression::parse(source)?;
        self.apply_expression(&expression, functions)
    }

    /// Evaluate a parsed expression against every record
    ///
    /// Recoverable failures (coercion, incomparable operands) count as a
    /// failed match for that record. Any other failure aborts before a
    /// single record is updated.
    pub fn apply_expression(
        &mut self,
        expression: &Expression,
        functions: &FunctionRegistry,
    ) -> HarvestResult<usize> {
        expression.check_functions(functions)?;

        let mut staged = Vec::with_capacity(self.records.len());
        let mut degraded = 0usize;
        for record in &self.records {
            let outcome = match Match::evaluate(expression, record.data(), functions) {
                Ok(outcome) => outcome,
                Err(e) if e.is_recoverable() => {
                    degraded += 1;
                    Match::degraded(expression, &e)
                }
                Err(e) => return Err(e),
            };
            staged.push(outcome);
        }

        if degraded > 0 {
            log_event_with_fields(
                Event::MatchDegraded,
                &[
                    ("expression", expression.source()),
                    ("records", &degraded.to_string()),
                ],
            );
        }

        let mut matched = 0usize;
        for (record, outcome) in self.records.iter_mut().zip(staged) {
            if outcome.is_match() {
                matched += 1;
            }
            record.push_match(outcome);
        }

        log_event_with_fields(
            Event::MatchApplied,
            &[
                ("expression", expression.source()),
                ("matched", &matched.to_string()),
                ("total", &self.records.len().to_string()),
            ],
        );
        Ok(matched)
    }

    /// Forget every evaluated expression on every record
    pub fn clear_matches(&mut self) -> &mut Self {
        for record in &mut self.records {
            record.clear_matches();
        }
        self
    }

    /// A new set holding copies of the matched records, without indexes
    pub fn matched(&self) -> RecordSet {
        self.filtered(true)
    }

    /// A new set holding copies of the unmatched records, without indexes
    pub fn unmatched(&self) -> RecordSet {
        self.filtered(false)
    }

    fn filtered(&self, matched: bool) -> RecordSet {
        RecordSet::from_records(
            self.records
                .iter()
                .filter(|record| record.is_matched() == matched)
                .cloned()
                .collect(),
        )
    }

    /// Number of matched records
    pub fn matched_count(&self) -> usize {
        self.records.iter().filter(|record| record.is_matched()).count()
    }

    /// Drop unmatched records; returns how many were removed
    pub fn remove_unmatched_records(&mut self) -> usize {
        let before = self.records.len();
        self.records.retain(Record::is_matched);
        let removed = before - self.records.len();
        log_event_with_fields(
            Event::UnmatchedRemoved,
            &[("removed", &removed.to_string()), ("total", &self.records.len().to_string())],
        );
        removed
    }

    // ------------------------------------------------------------------
    // Bulk reshaping
    // ------------------------------------------------------------------

    /// Collapse records with identical content; returns how many were removed
    ///
    /// Key order does not matter. Which duplicate survives is not part of
    /// the contract; currently the first one does.
    pub fn remove_duplicates(&mut self) -> usize {
        let before = self.records.len();
        let mut seen = HashSet::with_capacity(before);
        self.records.retain(|record| seen.insert(record.content_key()));
        let removed = before - self.records.len();
        log_event_with_fields(
            Event::DuplicatesRemoved,
            &[("removed", &removed.to_string()), ("total", &self.records.len().to_string())],
        );
        removed
    }

    /// Expand sequence values at `key` into one record per element
    ///
    /// Records whose value at `key` is not a sequence pass through. With
    /// `preserve_empty` false, records where `key` is missing, null or an
    /// empty sequence are dropped.
    pub fn unwind(&mut self, key: &str, preserve_empty: bool) -> &mut Self {
        let before = self.records.len();
        let mut unwound = Vec::with_capacity(before);

        for record in std::mem::take(&mut self.records) {
            match record.get(key) {
                Some(Value::Array(items)) if !items.is_empty() => {
                    for item in items {
                        let mut copy = record.clone();
                        copy.insert(key, item.clone());
                        unwound.push(copy);
                    }
                }
                None | Some(Value::Null) if !preserve_empty => {}
                Some(Value::Array(_)) if !preserve_empty => {}
                _ => unwound.push(record),
            }
        }

        self.records = unwound;
        log_event_with_fields(
            Event::RecordsUnwound,
            &[
                ("key", key),
                ("before", &before.to_string()),
                ("after", &self.records.len().to_string()),
            ],
        );
        self
    }

    /// Apply `operation` to every record, all or nothing
    ///
    /// The operation runs against copies; the set changes only if it
    /// succeeded for every record.
    pub fn modify_records<F>(&mut self, mut operation: F) -> HarvestResult<&mut Self>
    where
        F: FnMut(&mut Record) -> HarvestResult<()>,
    {
        let mut staged = self.records.clone();
        for record in &mut staged {
            operation(record)?;
        }
        self.records = staged;
        Ok(self)
    }
}

impl From<Vec<Record>> for RecordSet {
    fn from(records: Vec<Record>) -> Self {
        Self::from_records(records)
    }
}

impl From<Vec<Map<String, Value>>> for RecordSet {
    fn from(maps: Vec<Map<String, Value>>) -> Self {
        Self::from_records(maps.into_iter().map(Record::from).collect())
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl Serialize for RecordSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(values: Value) -> RecordSet {
        match values {
            Value::Array(items) => RecordSet::from_values(items).unwrap(),
            _ => panic!("fixture must be an array"),
        }
    }

    #[test]
    fn test_add_preserves_order() {
        let mut rs = set(json!([{"n": 1}]));
        rs.add(vec![Record::try_from(json!({"n": 2})).unwrap()]);
        rs.add_values(vec![json!({"n": 3})]).unwrap();

        let ns: Vec<&Value> = rs.iter().filter_map(|r| r.get("n")).collect();
        assert_eq!(ns, vec![&json!(1), &json!(2), &json!(3)]);
        assert!(rs.add_values(vec![json!({"n": 4}), json!(5)]).is_err());
        assert_eq!(rs.len(), 3);
    }

    #[test]
    fn test_keys_union_sorted() {
        let rs = set(json!([{"b": 1, "a": 2}, {"c": 3, "a": 4}]));
        assert_eq!(rs.keys(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_index_lifecycle() {
        let mut rs = set(json!([{"name": "x", "n": 1}, {"name": "y", "n": 2}]));
        rs.create_index("by_name", &["name"]).unwrap();
        assert!(rs.has_index("by_name"));
        assert_eq!(rs.lookup("by_name", &[json!("y")]).unwrap().unwrap().get("n"), Some(&json!(2)));

        assert!(matches!(
            rs.create_index("by_name", &["n"]).unwrap_err(),
            HarvestError::DuplicateIndex(_)
        ));

        rs.drop_index("by_name").unwrap();
        assert!(!rs.has_index("by_name"));
        assert!(matches!(
            rs.drop_index("by_name").unwrap_err(),
            HarvestError::IndexNotFound(_)
        ));
    }

    #[test]
    fn test_rebuild_index_refreshes_snapshot() {
        let mut rs = set(json!([{"name": "x"}]));
        rs.create_index("by_name", &["name"]).unwrap();
        rs.add_values(vec![json!({"name": "z"})]).unwrap();
        assert!(rs.lookup("by_name", &[json!("z")]).unwrap().is_none());

        rs.rebuild_index("by_name").unwrap();
        assert!(rs.lookup("by_name", &[json!("z")]).unwrap().is_some());
    }

    #[test]
    fn test_apply_match_and_partitions() {
        let functions = FunctionRegistry::default();
        let mut rs = set(json!([{"age": 7}, {"age": 12}, {"age": 3}]));
        assert_eq!(rs.apply_match("age>6", &functions).unwrap(), 2);
        assert_eq!(rs.matched().len(), 2);
        assert_eq!(rs.unmatched().len(), 1);

        rs.clear_matches();
        assert_eq!(rs.matched_count(), 3);
    }

    #[test]
    fn test_apply_match_degrades_incomparable_records() {
        let functions = FunctionRegistry::default();
        let mut rs = set(json!([{"age": 7}, {"age": true}]));
        assert_eq!(rs.apply_match("age>6", &functions).unwrap(), 1);

        let failed = &rs.get(1).unwrap().non_matching_expressions()[0];
        assert!(failed.final_match_operation().starts_with("error:"));
    }

    #[test]
    fn test_apply_match_invalid_expression_leaves_set_untouched() {
        let functions = FunctionRegistry::default();
        let mut rs = set(json!([{"age": 7}]));
        assert!(rs.apply_match("age", &functions).is_err());
        assert!(rs.apply_match("nope(age)>1", &functions).is_err());
        assert!(rs.get(0).unwrap().matching_expressions().is_empty());
        assert!(rs.get(0).unwrap().non_matching_expressions().is_empty());
    }

    #[test]
    fn test_remove_unmatched_keeps_matched() {
        let functions = FunctionRegistry::default();
        let mut rs = set(json!([{"k": "keep"}, {"k": "drop"}]));
        rs.apply_match("k==keep", &functions).unwrap();
        assert_eq!(rs.remove_unmatched_records(), 1);
        assert_eq!(rs.get(0).unwrap().get("k"), Some(&json!("keep")));
    }

    #[test]
    fn test_remove_duplicates() {
        let mut rs = set(json!([{"a": 1}, {"a": 1}, {"a": 2}]));
        assert_eq!(rs.remove_duplicates(), 1);
        assert_eq!(rs.len(), 2);

        let mut rs = set(json!([{"a": 1, "b": 2}, {"b": 2, "a": 1}]));
        rs.remove_duplicates();
        assert_eq!(rs.len(), 1);
    }

    #[test]
    fn test_remove_duplicates_integral_float() {
        let mut rs = set(json!([{"a": 1}, {"a": 1.0}, {"a": 1.5}]));
        assert_eq!(rs.remove_duplicates(), 1);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs.get(0).unwrap().get("a"), Some(&json!(1)));
    }

    #[test]
    fn test_unwind() {
        let mut rs = set(json!([{"tags": ["a", "b", "c"], "id": 1}]));
        rs.unwind("tags", true);
        let tags: Vec<&Value> = rs.iter().filter_map(|r| r.get("tags")).collect();
        assert_eq!(tags, vec![&json!("a"), &json!("b"), &json!("c")]);
        assert!(rs.iter().all(|r| r.get("id") == Some(&json!(1))));
    }

    #[test]
    fn test_unwind_empty_handling() {
        let fixture = json!([{"id": 1}, {"id": 2, "tags": null}, {"id": 3, "tags": []}, {"id": 4, "tags": "x"}]);

        let mut rs = set(fixture.clone());
        rs.unwind("tags", true);
        assert_eq!(rs.len(), 4);

        let mut rs = set(fixture);
        rs.unwind("tags", false);
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.get(0).unwrap().get("id"), Some(&json!(4)));
    }

    #[test]
    fn test_modify_records_is_all_or_nothing() {
        let mut rs = set(json!([{"a": 1}, {"b": 2}]));
        let err = rs
            .modify_records(|record| record.rename_key("a", "z").map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, HarvestError::KeyNotFound(_)));
        assert!(rs.get(0).unwrap().contains_key("a"));

        rs.modify_records(|record| {
            record.insert("seen", json!(true));
            Ok(())
        })
        .unwrap();
        assert!(rs.iter().all(|r| r.contains_key("seen")));
    }
}
