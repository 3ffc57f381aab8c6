//! Matching Property Tests
//!
//! Tests for match-expression invariants:
//! - Operator detection and evaluation traces
//! - Literal equality is case-sensitive, search is not
//! - Numeric comparisons reconcile textual operands
//! - Coercion failures inside expressions degrade, explicit casts raise
//! - Backend filter translation

use harvest::functions::{cast, is_number, CastKind};
use harvest::{BackendFilter, Expression, FunctionRegistry, HarvestError, Match, Operator, Record};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn evaluate(record: Value, source: &str) -> Match {
    let functions = FunctionRegistry::default();
    let expression = Expression::parse(source).unwrap();
    let map = record.as_object().cloned().unwrap();
    Match::evaluate(&expression, &map, &functions).unwrap()
}

fn matches(record: Value, source: &str) -> bool {
    evaluate(record, source).is_match()
}

// =============================================================================
// Search and Equality Tests
// =============================================================================

/// Search produces a rendered trace without spaces.
#[test]
fn test_search_trace() {
    let outcome = evaluate(json!({"key1": "value1"}), "key1=value1");
    assert!(outcome.is_match());
    assert_eq!(outcome.final_match_operation(), "value1=value1");
    assert_eq!(outcome.key(), "key1");
    assert_eq!(outcome.operator(), Operator::Search);
    assert_eq!(outcome.value(), "value1");

    assert!(!matches(json!({"key1": "value1"}), "key1=value2"));
}

/// Search is a case-insensitive pattern match.
#[test]
fn test_search_is_case_insensitive_pattern() {
    assert!(matches(json!({"name": "John Doe"}), "name=doe"));
    assert!(matches(json!({"name": "John Doe"}), "name=^john"));
    assert!(!matches(json!({"name": "John Doe"}), "name=^doe"));
}

/// Literal equality is case-sensitive.
#[test]
fn test_literal_equality_case_sensitive() {
    assert!(matches(json!({"key1": "ABCD"}), "key1==ABCD"));
    assert!(!matches(json!({"key1": "ABCD"}), "key1==abcd"));
}

/// Not-equal is the negated search.
#[test]
fn test_not_equal() {
    assert!(matches(json!({"name": "John Doe"}), "name!=smith"));
    assert!(!matches(json!({"name": "John Doe"}), "name!=DOE"));
}

// =============================================================================
// Numeric Comparison Tests
// =============================================================================

/// Ordering operators on a numeric left side.
#[test]
fn test_numeric_comparisons() {
    let record = json!({"age": 7});
    assert!(matches(record.clone(), "age>6"));
    assert!(matches(record.clone(), "age>=7"));
    assert!(matches(record.clone(), "age<8"));
    assert!(matches(record.clone(), "age<=7"));
    assert!(!matches(record.clone(), "age>7"));
    assert!(matches(record, "age==7"));
}

/// Function calls on both sides.
#[test]
fn test_function_calls_on_both_sides() {
    let record = json!({"age": "7"});
    assert!(matches(record.clone(), "cast(age,int)>=cast(7,int)"));
    assert!(!matches(record, "cast(age,int)>cast(7,int)"));
}

/// A failed coercion inside an expression resolves to null instead of failing.
#[test]
fn test_coercion_failure_in_expression_degrades() {
    let outcome = evaluate(json!({"age": "seven"}), "cast(age,int)==7");
    assert!(!outcome.is_match());
}

/// Ordering incomparable operands is an error at record level.
#[test]
fn test_incomparable_ordering_is_error() {
    let functions = FunctionRegistry::default();
    let mut record = Record::try_from(json!({"flag": true})).unwrap();
    let err = record.match_str("flag>1", &functions).unwrap_err();
    assert!(matches!(err, HarvestError::NotComparable { .. }));
    assert!(err.is_recoverable());
}

/// The first operator by priority wins, even inside the value.
#[test]
fn test_first_operator_wins() {
    let expression = Expression::parse("key=a>b").unwrap();
    assert_eq!(expression.operator(), Operator::Gt);
    assert_eq!(expression.key(), "key=a");
}

/// Expressions without an operator are rejected.
#[test]
fn test_missing_operator() {
    assert!(matches!(
        Expression::parse("just_a_key").unwrap_err(),
        HarvestError::InvalidExpression { .. }
    ));
}

// =============================================================================
// Coercion Tests
// =============================================================================

/// Bool cast is false for exactly the falsy set.
#[test]
fn test_bool_cast_falsy_set() {
    for falsy in [json!(false), Value::Null, json!("False"), json!("false"), json!("No"), json!("no")] {
        assert_eq!(cast(&falsy, CastKind::Bool).unwrap(), json!(false), "{}", falsy);
    }
    for truthy in [json!(0), json!(""), json!("0"), json!(true), json!([]), json!("yes")] {
        assert_eq!(cast(&truthy, CastKind::Bool).unwrap(), json!(true), "{}", truthy);
    }
}

/// is_number accepts integer literals only.
#[test]
fn test_is_number() {
    assert!(is_number(&json!("123")));
    assert!(!is_number(&json!("1.5")));
    assert!(!is_number(&json!("abc")));
}

/// Explicit cast operations raise on failure.
#[test]
fn test_explicit_cast_raises() {
    let mut record = Record::try_from(json!({"age": "seven"})).unwrap();
    assert!(matches!(
        record.cast("age", CastKind::Int, None).unwrap_err(),
        HarvestError::CoercionFailure { .. }
    ));
}

// =============================================================================
// Backend Filter Tests
// =============================================================================

/// Each operator maps onto the backend grammar.
#[test]
fn test_backend_filter_operators() {
    assert_eq!(
        BackendFilter::translate_str("name=doe").unwrap(),
        json!({"$regexMatch": {"input": "$name", "regex": "doe", "options": "i"}})
    );
    assert_eq!(BackendFilter::translate_str("name==Doe").unwrap(), json!({"name": "Doe"}));
    assert_eq!(BackendFilter::translate_str("age<8").unwrap(), json!({"$lt": ["$age", 8]}));
    assert!(BackendFilter::translate_str("no operator").is_err());
}
