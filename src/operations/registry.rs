//! Operation dispatch by name
//!
//! Two tables of typed handlers, one per granularity. A name resolves
//! against the set table first, then the record table; a record-level
//! operation runs on every record of the set, all or nothing.

use std::collections::BTreeMap;
use std::fmt;

use super::args::Args;
use crate::config::EngineConfig;
use crate::errors::{HarvestError, HarvestResult};
use crate::functions::{CastKind, FunctionRegistry};
use crate::matching::{Expression, Match};
use crate::observability::{log_event_with_fields, Event};
use crate::record::{JsonMergeMode, Record};
use crate::recordset::RecordSet;

/// Environment shared by every dispatched operation
#[derive(Debug, Clone, Default)]
pub struct OperationContext {
    pub functions: FunctionRegistry,
    pub config: EngineConfig,
}

impl OperationContext {
    pub fn new(functions: FunctionRegistry, config: EngineConfig) -> Self {
        Self { functions, config }
    }
}

/// Handler applied to one record
pub type RecordOperation = fn(&mut Record, &Args, &OperationContext) -> HarvestResult<()>;

/// Handler applied to a whole set
pub type SetOperation = fn(&mut RecordSet, &Args, &OperationContext) -> HarvestResult<Outcome>;

/// Which table an operation name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Record,
    RecordSet,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Record => write!(f, "record"),
            Granularity::RecordSet => write!(f, "recordset"),
        }
    }
}

/// Result of a dispatched operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A record-level operation was applied to this many records
    Records(usize),
    /// A set-level operation reporting a count (matched, removed, ...)
    Count(usize),
    /// A set-level operation with nothing to report
    Done,
}

/// Named operation tables
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    record_operations: BTreeMap<&'static str, RecordOperation>,
    set_operations: BTreeMap<&'static str, SetOperation>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl OperationRegistry {
    /// Registry with no operations
    pub fn empty() -> Self {
        Self {
            record_operations: BTreeMap::new(),
            set_operations: BTreeMap::new(),
        }
    }

    /// Registry with every built-in record and set operation
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();

        registry.record_operations.insert("add_freshness", record_add_freshness);
        registry.record_operations.insert("add_key_from_keys", record_add_key_from_keys);
        registry.record_operations.insert("assign_elements", record_assign_elements);
        registry
            .record_operations
            .insert("assign_elements_at_index_to_key", record_assign_elements);
        registry.record_operations.insert("cast", record_cast);
        registry.record_operations.insert("copy_key", record_copy_key);
        registry.record_operations.insert("flatten", record_flatten);
        registry.record_operations.insert("unflatten", record_unflatten);
        registry.record_operations.insert("merge_json_string", record_merge_json_string);
        registry.record_operations.insert("dict_from_json_string", record_merge_json_string);
        registry
            .record_operations
            .insert("list_of_pairs_to_mapping", record_list_of_pairs_to_mapping);
        registry
            .record_operations
            .insert("key_value_list_to_dict", record_list_of_pairs_to_mapping);
        registry.record_operations.insert("match", record_match);
        registry.record_operations.insert("remove_key", record_remove_key);
        registry.record_operations.insert("rename_key", record_rename_key);
        registry.record_operations.insert("reset_matches", record_reset_matches);
        registry.record_operations.insert("split_key", record_split_key);
        registry.record_operations.insert("substring", record_substring);

        registry.set_operations.insert("add_match", set_add_match);
        registry.set_operations.insert("clear_matches", set_clear_matches);
        registry.set_operations.insert("create_index", set_create_index);
        registry.set_operations.insert("drop_index", set_drop_index);
        registry.set_operations.insert("rebuild_index", set_rebuild_index);
        registry.set_operations.insert("remove_duplicates", set_remove_duplicates);
        registry
            .set_operations
            .insert("remove_unmatched_records", set_remove_unmatched_records);
        registry.set_operations.insert("unwind", set_unwind);

        registry
    }

    /// Add or replace a record-level operation
    pub fn register_record(&mut self, name: &'static str, operation: RecordOperation) {
        self.record_operations.insert(name, operation);
    }

    /// Add or replace a set-level operation
    pub fn register_set(&mut self, name: &'static str, operation: SetOperation) {
        self.set_operations.insert(name, operation);
    }

    /// Which table `name` resolves to, set level first
    pub fn granularity(&self, name: &str) -> Option<Granularity> {
        if self.set_operations.contains_key(name) {
            Some(Granularity::RecordSet)
        } else if self.record_operations.contains_key(name) {
            Some(Granularity::Record)
        } else {
            None
        }
    }

    pub fn record_operation_names(&self) -> Vec<&'static str> {
        self.record_operations.keys().copied().collect()
    }

    pub fn set_operation_names(&self) -> Vec<&'static str> {
        self.set_operations.keys().copied().collect()
    }

    /// Apply an operation by name to a set
    ///
    /// Fails with `UnsupportedOperation` when neither table knows `name`.
    pub fn apply(
        &self,
        set: &mut RecordSet,
        name: &str,
        args: &Args,
        context: &OperationContext,
    ) -> HarvestResult<Outcome> {
        let result = match self.granularity(name) {
            Some(Granularity::RecordSet) => match self.set_operations.get(name) {
                Some(operation) => operation(set, args, context),
                None => Err(HarvestError::UnsupportedOperation(name.to_string())),
            },
            Some(Granularity::Record) => match self.record_operations.get(name) {
                Some(operation) => set
                    .modify_records(|record| operation(record, args, context))
                    .map(|set| Outcome::Records(set.len())),
                None => Err(HarvestError::UnsupportedOperation(name.to_string())),
            },
            None => Err(HarvestError::UnsupportedOperation(name.to_string())),
        };

        let granularity = self
            .granularity(name)
            .map(|g| g.to_string())
            .unwrap_or_else(|| "none".to_string());
        match &result {
            Ok(_) => log_event_with_fields(
                Event::OperationDispatched,
                &[("operation", name), ("granularity", &granularity)],
            ),
            Err(e) => log_event_with_fields(
                Event::OperationFailed,
                &[
                    ("operation", name),
                    ("granularity", &granularity),
                    ("error_code", e.code().code()),
                    ("reason", &e.to_string()),
                ],
            ),
        }
        result
    }

    /// Apply a record-level operation to a single record
    pub fn apply_to_record(
        &self,
        record: &mut Record,
        name: &str,
        args: &Args,
        context: &OperationContext,
    ) -> HarvestResult<()> {
        let operation = self
            .record_operations
            .get(name)
            .ok_or_else(|| HarvestError::UnsupportedOperation(name.to_string()))?;
        operation(record, args, context)
    }
}

// ----------------------------------------------------------------------
// Record-level handlers
// ----------------------------------------------------------------------

fn record_add_freshness(record: &mut Record, args: &Args, ctx: &OperationContext) -> HarvestResult<()> {
    let fresh = match args.opt_i64("fresh_range")? {
        Some(value) => value,
        None => args.i64_or("fresh_seconds", ctx.config.fresh_seconds)?,
    };
    let aging = match args.opt_i64("aging_range")? {
        Some(value) => value,
        None => args.i64_or("aging_seconds", ctx.config.aging_seconds)?,
    };
    let key = args.str_or("key", &ctx.config.freshness_key)?;
    record.add_freshness(fresh, aging, key);
    Ok(())
}

fn record_add_key_from_keys(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    let sequence = args.str_list("sequence")?;
    record.add_key_from_keys(args.str("new_key")?, &sequence, args.str_or("delimiter", " ")?);
    Ok(())
}

fn record_assign_elements(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    record.assign_elements(
        args.str("source_key")?,
        args.str("target_key")?,
        args.opt_i64("start")?,
        args.opt_i64("end")?,
        args.opt_str("delimiter")?,
    )?;
    Ok(())
}

fn record_cast(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    let kind: CastKind = args
        .first_str(&["format_string", "kind"])?
        .ok_or_else(|| HarvestError::invalid_argument("format_string", "required"))?
        .parse()?;
    record.cast(args.str("source_key")?, kind, args.opt_str("target_key")?)?;
    Ok(())
}

fn record_copy_key(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    record.copy_key(args.str("source_key")?, args.str("target_key")?)?;
    Ok(())
}

fn record_flatten(record: &mut Record, args: &Args, ctx: &OperationContext) -> HarvestResult<()> {
    record.flatten(args.str_or("separator", &ctx.config.flatten_separator)?);
    Ok(())
}

fn record_unflatten(record: &mut Record, args: &Args, ctx: &OperationContext) -> HarvestResult<()> {
    record.unflatten(args.str_or("separator", &ctx.config.flatten_separator)?);
    Ok(())
}

fn record_merge_json_string(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    let mode: JsonMergeMode = args
        .first_str(&["mode", "operation"])?
        .ok_or_else(|| HarvestError::invalid_argument("mode", "required"))?
        .parse()?;
    record.merge_json_string(args.str("source_key")?, mode, args.opt_str("new_key")?)?;
    Ok(())
}

fn record_list_of_pairs_to_mapping(
    record: &mut Record,
    args: &Args,
    _: &OperationContext,
) -> HarvestResult<()> {
    record.list_of_pairs_to_mapping(
        args.str("source_key")?,
        args.str_or("name_key", "Name")?,
        args.str_or("value_key", "Value")?,
        args.opt_str("target_key")?,
        args.bool_or("preserve_original", false)?,
    )?;
    Ok(())
}

fn record_match(record: &mut Record, args: &Args, ctx: &OperationContext) -> HarvestResult<()> {
    let source = args
        .first_str(&["syntax", "expression"])?
        .ok_or_else(|| HarvestError::invalid_argument("syntax", "required"))?;
    let expression = Expression::parse(source)?;
    expression.check_functions(&ctx.functions)?;
    match Match::evaluate(&expression, record.data(), &ctx.functions) {
        Ok(outcome) => record.push_match(outcome),
        Err(e) if e.is_recoverable() => {
            log_event_with_fields(
                Event::MatchDegraded,
                &[("expression", expression.source()), ("records", "1")],
            );
            record.push_match(Match::degraded(&expression, &e));
        }
        Err(e) => return Err(e),
    }
    Ok(())
}

fn record_remove_key(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    record.remove_key(args.str("key")?)?;
    Ok(())
}

fn record_rename_key(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    record.rename_key(args.str("old_key")?, args.str("new_key")?)?;
    Ok(())
}

fn record_reset_matches(record: &mut Record, _: &Args, _: &OperationContext) -> HarvestResult<()> {
    record.reset_matches();
    Ok(())
}

fn record_split_key(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    record.split_key(
        args.str("source_key")?,
        args.opt_str("target_key")?,
        args.str_or("delimiter", " ")?,
    )?;
    Ok(())
}

fn record_substring(record: &mut Record, args: &Args, _: &OperationContext) -> HarvestResult<()> {
    record.substring(
        args.str("source_key")?,
        args.opt_i64("start")?,
        args.opt_i64("end")?,
        args.opt_str("target_key")?,
    )?;
    Ok(())
}

// ----------------------------------------------------------------------
// Set-level handlers
// ----------------------------------------------------------------------

fn set_add_match(set: &mut RecordSet, args: &Args, ctx: &OperationContext) -> HarvestResult<Outcome> {
    let source = args
        .first_str(&["syntax", "expression"])?
        .ok_or_else(|| HarvestError::invalid_argument("syntax", "required"))?;
    Ok(Outcome::Count(set.apply_match(source, &ctx.functions)?))
}

fn set_clear_matches(set: &mut RecordSet, _: &Args, _: &OperationContext) -> HarvestResult<Outcome> {
    set.clear_matches();
    Ok(Outcome::Done)
}

fn set_create_index(set: &mut RecordSet, args: &Args, _: &OperationContext) -> HarvestResult<Outcome> {
    let fields = args.str_list("fields")?;
    let index = set.create_index(args.str("index_name")?, &fields)?;
    Ok(Outcome::Count(index.len()))
}

fn set_drop_index(set: &mut RecordSet, args: &Args, _: &OperationContext) -> HarvestResult<Outcome> {
    set.drop_index(args.str("index_name")?)?;
    Ok(Outcome::Done)
}

fn set_rebuild_index(set: &mut RecordSet, args: &Args, _: &OperationContext) -> HarvestResult<Outcome> {
    let index = set.rebuild_index(args.str("index_name")?)?;
    Ok(Outcome::Count(index.len()))
}

fn set_remove_duplicates(set: &mut RecordSet, _: &Args, _: &OperationContext) -> HarvestResult<Outcome> {
    Ok(Outcome::Count(set.remove_duplicates()))
}

fn set_remove_unmatched_records(
    set: &mut RecordSet,
    _: &Args,
    _: &OperationContext,
) -> HarvestResult<Outcome> {
    Ok(Outcome::Count(set.remove_unmatched_records()))
}

fn set_unwind(set: &mut RecordSet, args: &Args, _: &OperationContext) -> HarvestResult<Outcome> {
    let key = args
        .first_str(&["source_key", "key"])?
        .ok_or_else(|| HarvestError::invalid_argument("source_key", "required"))?;
    let preserve = args.bool_or("preserve_null_and_empty_keys", true)?;
    Ok(Outcome::Count(set.unwind(key, preserve).len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fixture() -> RecordSet {
        RecordSet::from_values(vec![
            json!({"name": "a", "tags": "x y"}),
            json!({"name": "b", "tags": "z"}),
        ])
        .unwrap()
    }

    #[test]
    fn test_granularity_resolution() {
        let registry = OperationRegistry::default();
        assert_eq!(registry.granularity("unwind"), Some(Granularity::RecordSet));
        assert_eq!(registry.granularity("rename_key"), Some(Granularity::Record));
        assert_eq!(registry.granularity("teleport"), None);
    }

    #[test]
    fn test_record_operation_applies_to_every_record() {
        let registry = OperationRegistry::default();
        let ctx = OperationContext::default();
        let mut set = fixture();

        let args = Args::new()
            .with("source_key", "tags")
            .with("target_key", "tag_list");
        let outcome = registry.apply(&mut set, "split_key", &args, &ctx).unwrap();
        assert_eq!(outcome, Outcome::Records(2));
        assert_eq!(set.get(0).unwrap().get("tag_list"), Some(&json!(["x", "y"])));
        assert_eq!(set.get(1).unwrap().get("tag_list"), Some(&json!(["z"])));
    }

    #[test]
    fn test_set_operation() {
        let registry = OperationRegistry::default();
        let ctx = OperationContext::default();
        let mut set = fixture();

        let args = Args::new().with("syntax", "name==a");
        assert_eq!(registry.apply(&mut set, "add_match", &args, &ctx).unwrap(), Outcome::Count(1));
        assert_eq!(
            registry
                .apply(&mut set, "remove_unmatched_records", &Args::new(), &ctx)
                .unwrap(),
            Outcome::Count(1)
        );
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_unknown_operation() {
        let registry = OperationRegistry::default();
        let ctx = OperationContext::default();
        let mut set = fixture();
        assert!(matches!(
            registry.apply(&mut set, "teleport", &Args::new(), &ctx).unwrap_err(),
            HarvestError::UnsupportedOperation(_)
        ));
    }

    #[test]
    fn test_failed_record_operation_leaves_set_untouched() {
        let registry = OperationRegistry::default();
        let ctx = OperationContext::default();
        let mut set = fixture();
        set.get_mut(1).unwrap().remove_key("tags").unwrap();

        let args = Args::new().with("old_key", "tags").with("new_key", "labels");
        assert!(registry.apply(&mut set, "rename_key", &args, &ctx).is_err());
        assert!(set.get(0).unwrap().contains_key("tags"));
        assert!(!set.get(0).unwrap().contains_key("labels"));
    }

    #[test]
    fn test_config_defaults_fill_missing_arguments() {
        let registry = OperationRegistry::default();
        let mut ctx = OperationContext::default();
        ctx.config.flatten_separator = "/".to_string();

        let mut record = Record::try_from(json!({"a": {"b": 1}})).unwrap();
        registry
            .apply_to_record(&mut record, "flatten", &Args::new(), &ctx)
            .unwrap();
        assert_eq!(record.get("a/b"), Some(&json!(1)));

        registry
            .apply_to_record(&mut record, "add_freshness", &Args::new(), &ctx)
            .unwrap();
        assert_eq!(record.get("f"), Some(&json!("I")));
    }

    #[test]
    fn test_legacy_operation_names() {
        let registry = OperationRegistry::default();
        let ctx = OperationContext::default();
        let mut record = Record::try_from(json!({
            "Tags": [{"Name": "env", "Value": "prod"}],
            "raw": "{\"x\": 1}"
        }))
        .unwrap();

        registry
            .apply_to_record(
                &mut record,
                "key_value_list_to_dict",
                &Args::new().with("source_key", "Tags"),
                &ctx,
            )
            .unwrap();
        assert_eq!(record.get("Tags"), Some(&json!({"env": "prod"})));

        registry
            .apply_to_record(
                &mut record,
                "dict_from_json_string",
                &Args::new().with("source_key", "raw").with("operation", "merge"),
                &ctx,
            )
            .unwrap();
        assert_eq!(record.get("x"), Some(&json!(1)));
    }
}
