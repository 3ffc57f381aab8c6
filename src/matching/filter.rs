//! Backend filter translation
//!
//! Maps a parsed expression onto the aggregation-expression grammar of a
//! document query backend. Field references are prefixed with `$`.
//!
//! | operator | filter |
//! |---|---|
//! | `=`  | `{"$regexMatch": {"input": "$key", "regex": value, "options": "i"}}` |
//! | `==` | `{key: value}` |
//! | `!=` | `{"$not": [{"$regexMatch": ...}]}` |
//! | `<`, `<=`, `>`, `>=` | `{"$lt": ["$key", value]}` etc. |
//!
//! Numeric literals are emitted as numbers for `==` and the range
//! operators; pattern operators always carry the literal text.

use serde_json::{json, Number, Value};

use super::expression::{Expression, Operand};
use super::operator::Operator;
use crate::errors::{HarvestError, HarvestResult};
use crate::functions::is_number;

/// Translator from match expressions to backend filters
pub struct BackendFilter;

impl BackendFilter {
    /// Translate a parsed expression
    ///
    /// A call on the left side filters on its first argument. A call on the
    /// right side has no backend equivalent and fails with `NotSupported`.
    pub fn translate(expression: &Expression) -> HarvestResult<Value> {
        if let Operand::Call { function, .. } = expression.right() {
            return Err(HarvestError::NotSupported(format!(
                "function '{}' on the value side of '{}' has no backend filter",
                function,
                expression.source()
            )));
        }

        let key = expression.key();
        let field = format!("${}", key);
        let text = expression.value();

        let filter = match expression.operator() {
            Operator::Search => regex_match(&field, text),
            Operator::Ne => json!({ "$not": [regex_match(&field, text)] }),
            Operator::Eq => {
                let mut filter = serde_json::Map::new();
                filter.insert(key.to_string(), literal(text));
                Value::Object(filter)
            }
            Operator::Gt => json!({ "$gt": [field, literal(text)] }),
            Operator::Gte => json!({ "$gte": [field, literal(text)] }),
            Operator::Lt => json!({ "$lt": [field, literal(text)] }),
            Operator::Lte => json!({ "$lte": [field, literal(text)] }),
        };

        Ok(filter)
    }

    /// Parse and translate an expression string
    ///
    /// Fails with `InvalidExpression` when no known operator is present.
    pub fn translate_str(source: &str) -> HarvestResult<Value> {
        Self::translate(&Expression::parse(source)?)
    }
}

fn regex_match(field: &str, pattern: &str) -> Value {
    json!({
        "$regexMatch": {
            "input": field,
            "regex": pattern,
            "options": "i"
        }
    })
}

fn literal(text: &str) -> Value {
    let value = Value::String(text.to_string());
    if is_number(&value) {
        if let Ok(i) = text.trim().parse::<i64>() {
            return Value::from(i);
        }
    }
    if text.contains('.') {
        if let Some(n) = text.trim().parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    value
}
