//! Match expression parser
//!
//! Grammar: `<left><operator><right>`, split on the first occurrence of the
//! detected operator. Either side may be a call of the form
//! `name(arg1,arg2,...)`: one level, comma-separated, no escaping.

use std::fmt;
use std::sync::OnceLock;

use regex::{Regex, RegexBuilder};

use super::operator::Operator;
use crate::errors::{HarvestError, HarvestResult};
use crate::functions::FunctionRegistry;

fn call_shape() -> Option<&'static Regex> {
    static CALL: OnceLock<Option<Regex>> = OnceLock::new();
    CALL.get_or_init(|| Regex::new(r"^\s*([A-Za-z_][A-Za-z0-9_.]*)\((.*)\)\s*$").ok())
        .as_ref()
}

/// Compile a pattern for the `=` / `!=` operators
pub(crate) fn compile_pattern(expression: &str, pattern: &str) -> HarvestResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| HarvestError::invalid_expression(expression, format!("invalid pattern: {}", e)))
}

/// One side of an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Plain text: a record key on the left, a literal on the right
    Text(String),
    /// `function(arg, ...)`
    Call { function: String, args: Vec<String> },
}

impl Operand {
    fn parse(text: &str) -> Self {
        match call_shape().and_then(|shape| shape.captures(text)) {
            Some(caps) => {
                let inner = caps[2].trim();
                let args = if inner.is_empty() {
                    Vec::new()
                } else {
                    inner.split(',').map(|a| a.trim().to_string()).collect()
                };
                Operand::Call {
                    function: caps[1].to_string(),
                    args,
                }
            }
            None => Operand::Text(text.to_string()),
        }
    }

    /// Name of the called function, if any
    pub fn function(&self) -> Option<&str> {
        match self {
            Operand::Call { function, .. } => Some(function),
            Operand::Text(_) => None,
        }
    }
}

/// A parsed match expression
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    operator: Operator,
    left: Operand,
    right: Operand,
    key: String,
    value: String,
    pattern: Option<Regex>,
}

impl Expression {
    /// Parse an expression
    ///
    /// Fails with `InvalidExpression` when no operator is present or the
    /// key side is empty.
    pub fn parse(source: &str) -> HarvestResult<Self> {
        let operator = Operator::detect(source)
            .ok_or_else(|| HarvestError::invalid_expression(source, "no operator found"))?;

        let (left_text, right_text) = source
            .split_once(operator.symbol())
            .ok_or_else(|| HarvestError::invalid_expression(source, "no operator found"))?;

        if left_text.trim().is_empty() {
            return Err(HarvestError::invalid_expression(source, "missing key"));
        }

        let left = Operand::parse(left_text);
        let right = Operand::parse(right_text);

        let key = match &left {
            Operand::Call { args, .. } => args.first().cloned().unwrap_or_default(),
            Operand::Text(text) => text.clone(),
        };

        let pattern = match (&right, operator.is_pattern()) {
            (Operand::Text(text), true) => Some(compile_pattern(source, text)?),
            _ => None,
        };

        Ok(Self {
            source: source.to_string(),
            operator,
            left,
            right,
            key,
            value: right_text.to_string(),
            pattern,
        })
    }

    /// Check every called function exists in `registry`
    pub fn check_functions(&self, registry: &FunctionRegistry) -> HarvestResult<()> {
        for function in [self.left.function(), self.right.function()].into_iter().flatten() {
            if !registry.contains(function) {
                return Err(HarvestError::invalid_expression(
                    &self.source,
                    format!("unknown function '{}'", function),
                ));
            }
        }
        Ok(())
    }

    /// The expression as written
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn left(&self) -> &Operand {
        &self.left
    }

    pub fn right(&self) -> &Operand {
        &self.right
    }

    /// Record key the expression targets (first argument of a left-side call)
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw text of the right side
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Precompiled pattern when the right side is a literal and the operator is `=` or `!=`
    pub(crate) fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}
