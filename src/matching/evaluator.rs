//! Match evaluation
//!
//! Resolves both sides of an [`Expression`] against a record, reconciles
//! types and applies the operator. Type reconciliation is left-driven: the
//! right side is read as a number only when the left value is already a
//! number, so `"7" == "7.0"` compares as text.

use std::cmp::Ordering;

use serde_json::{Map, Number, Value};

use super::expression::{compile_pattern, Expression, Operand};
use super::operator::Operator;
use crate::errors::{HarvestError, HarvestResult};
use crate::functions::{render, FunctionRegistry};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// The result of evaluating one expression against one record
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    expression: String,
    key: String,
    operator: Operator,
    value: String,
    final_match_operation: String,
    is_match: bool,
}

impl Match {
    /// Evaluate `expression` against `record`
    ///
    /// Coercion failures inside function calls resolve to `null`. Ordering
    /// operands that cannot be ordered fail with `NotComparable`.
    pub fn evaluate(
        expression: &Expression,
        record: &Map<String, Value>,
        functions: &FunctionRegistry,
    ) -> HarvestResult<Self> {
        let left = resolve_left(expression, record, functions)?;
        let right = resolve_right(expression, record, functions)?;
        let right = reconcile(&left, right);

        let is_match = compare(expression, &left, &right)?;
        let final_match_operation = format!(
            "{}{}{}",
            render(&left),
            expression.operator().symbol(),
            render(&right)
        );

        if Logger::enabled(Severity::Trace) {
            log_event_with_fields(
                Event::MatchEvaluated,
                &[
                    ("expression", expression.source()),
                    ("operation", &final_match_operation),
                    ("matched", if is_match { "true" } else { "false" }),
                ],
            );
        }

        Ok(Self {
            expression: expression.source().to_string(),
            key: expression.key().to_string(),
            operator: expression.operator(),
            value: expression.value().to_string(),
            final_match_operation,
            is_match,
        })
    }

    /// A failed match recorded after a recoverable evaluation error
    pub fn degraded(expression: &Expression, error: &HarvestError) -> Self {
        Self {
            expression: expression.source().to_string(),
            key: expression.key().to_string(),
            operator: expression.operator(),
            value: expression.value().to_string(),
            final_match_operation: format!("error: {}", error),
            is_match: false,
        }
    }

    /// The expression as written
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    /// Raw text of the right side
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Rendered `<left><op><right>` of the resolved operands
    pub fn final_match_operation(&self) -> &str {
        &self.final_match_operation
    }

    pub fn is_match(&self) -> bool {
        self.is_match
    }
}

fn call(
    function: &str,
    args: &[String],
    record: &Map<String, Value>,
    functions: &FunctionRegistry,
) -> HarvestResult<Value> {
    let values: Vec<Value> = args
        .iter()
        .enumerate()
        .map(|(i, arg)| match record.get(arg) {
            Some(value) if i == 0 => value.clone(),
            _ => Value::String(arg.clone()),
        })
        .collect();

    match functions.call(function, &values) {
        Ok(value) => Ok(value),
        Err(e) if e.is_recoverable() => Ok(Value::Null),
        Err(e) => Err(e),
    }
}

fn resolve_left(
    expression: &Expression,
    record: &Map<String, Value>,
    functions: &FunctionRegistry,
) -> HarvestResult<Value> {
    match expression.left() {
        Operand::Text(key) => Ok(record.get(key).cloned().unwrap_or(Value::Null)),
        Operand::Call { function, args } => call(function, args, record, functions),
    }
}

fn resolve_right(
    expression: &Expression,
    record: &Map<String, Value>,
    functions: &FunctionRegistry,
) -> HarvestResult<Value> {
    match expression.right() {
        Operand::Text(text) => Ok(Value::String(text.clone())),
        Operand::Call { function, args } => call(function, args, record, functions),
    }
}

/// Read a textual right side as a number when the left side is a number
///
/// Any finite decimal is accepted, so `age>6.5` compares numerically.
fn reconcile(left: &Value, right: Value) -> Value {
    match (left, &right) {
        (Value::Number(_), Value::String(text)) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(right),
        _ => right,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        _ => left == right,
    }
}

fn order(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn search(expression: &Expression, subject: &str, pattern: &str) -> HarvestResult<bool> {
    match expression.pattern() {
        Some(regex) => Ok(regex.is_match(subject)),
        None => Ok(compile_pattern(expression.source(), pattern)?.is_match(subject)),
    }
}

fn compare(expression: &Expression, left: &Value, right: &Value) -> HarvestResult<bool> {
    let operator = expression.operator();

    if operator.is_ordering() {
        let ordering = order(left, right).ok_or_else(|| HarvestError::NotComparable {
            left: render(left),
            right: render(right),
        })?;
        return Ok(match operator {
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            _ => ordering != Ordering::Greater,
        });
    }

    match (operator, left, right) {
        (Operator::Search, Value::String(subject), Value::String(pattern)) => {
            search(expression, subject, pattern)
        }
        (Operator::Ne, Value::String(subject), Value::String(pattern)) => {
            Ok(!search(expression, subject, pattern)?)
        }
        (Operator::Ne, _, _) => Ok(!values_equal(left, right)),
        _ => Ok(values_equal(left, right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval(record: Value, source: &str) -> HarvestResult<Match> {
        let expression = Expression::parse(source)?;
        let map = record.as_object().cloned().unwrap();
        Match::evaluate(&expression, &map, &FunctionRegistry::with_builtins())
    }

    #[test]
    fn test_search_match_and_trace() {
        let record = json!({"key1": "value1", "key2": "value2"});

        let m = eval(record.clone(), "key1=value1").unwrap();
        assert!(m.is_match());
        assert_eq!(m.final_match_operation(), "value1=value1");

        let m = eval(record, "key1=value2").unwrap();
        assert!(!m.is_match());
        assert_eq!(m.final_match_operation(), "value1=value2");
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let record = json!({"name": "John Doe"});
        assert!(eval(record.clone(), "name=doe").unwrap().is_match());
        assert!(eval(record.clone(), "name=^john").unwrap().is_match());
        assert!(!eval(record, "name=^doe").unwrap().is_match());
    }

    #[test]
    fn test_literal_equality_is_case_sensitive() {
        let record = json!({"key1": "ABCD"});
        assert!(eval(record.clone(), "key1==ABCD").unwrap().is_match());
        assert!(!eval(record, "key1==abcd").unwrap().is_match());
    }

    #[test]
    fn test_numeric_comparisons() {
        let record = json!({"age": 7});
        for source in ["age>6", "age>=7", "age<8", "age<=7", "age==7", "age=7", "age>6.5"] {
            assert!(eval(record.clone(), source).unwrap().is_match(), "{}", source);
        }
        for source in ["age>7", "age<7", "age!=7"] {
            assert!(!eval(record.clone(), source).unwrap().is_match(), "{}", source);
        }
    }

    #[test]
    fn test_left_driven_reconciliation() {
        // left is text, so the right side stays text
        let record = json!({"version": "7"});
        assert!(!eval(record.clone(), "version==7.0").unwrap().is_match());
        assert!(eval(record, "version==7").unwrap().is_match());
    }

    #[test]
    fn test_fractional_right_side_against_numeric_left() {
        let record = json!({"age": 7});
        assert!(eval(record.clone(), "age>6.5").unwrap().is_match());
        assert!(!eval(record.clone(), "age<6.5").unwrap().is_match());
        assert_eq!(eval(record.clone(), "age>6.5").unwrap().final_match_operation(), "7>6.5");

        // text that is not a number stays text and cannot be ordered against 7
        let err = eval(record, "age>six").unwrap_err();
        assert!(matches!(err, HarvestError::NotComparable { .. }));
    }

    #[test]
    fn test_not_equal_on_strings_is_negated_search() {
        let record = json!({"key6": "value6"});
        assert!(!eval(record.clone(), "key6!=VALUE").unwrap().is_match());
        assert!(eval(record, "key6!=other").unwrap().is_match());
    }

    #[test]
    fn test_ordering_incomparable_operands() {
        let err = eval(json!({"name": "doe"}), "missing>3").unwrap_err();
        assert!(err.is_recoverable());

        let err = eval(json!({"flag": true}), "flag>3").unwrap_err();
        assert!(matches!(err, HarvestError::NotComparable { .. }));
    }

    #[test]
    fn test_string_ordering() {
        let record = json!({"name": "bravo"});
        assert!(eval(record.clone(), "name>alpha").unwrap().is_match());
        assert!(eval(record, "name<charlie").unwrap().is_match());
    }

    #[test]
    fn test_function_calls() {
        let record = json!({"age": "7"});
        let m = eval(record.clone(), "cast(age,int)==cast(7,int)").unwrap();
        assert!(m.is_match());
        assert_eq!(m.key(), "age");
        assert_eq!(m.final_match_operation(), "7==7");

        assert!(eval(record.clone(), "cast(age,int)>6").unwrap().is_match());
        assert!(eval(record, "is_number(age)==cast(true,bool)").unwrap().is_match());
    }

    #[test]
    fn test_failed_coercion_in_call_degrades_to_null() {
        let record = json!({"age": "seven"});
        let m = eval(record.clone(), "cast(age,int)==7").unwrap();
        assert!(!m.is_match());
        assert_eq!(m.final_match_operation(), "null==7");
    }

    #[test]
    fn test_unknown_function_is_an_error() {
        let err = eval(json!({"name": "doe"}), "upper(name)==DOE").unwrap_err();
        assert!(!err.is_recoverable());
    }
}
