//! Match operators
//!
//! Detection follows a fixed priority list, longest symbols first, and
//! picks the first operator found anywhere in the expression text. A value
//! containing an operator character (`key=a>b`) therefore parses as the
//! higher-priority operator (`>` here); this is a known limitation kept
//! for compatibility with existing expressions.

use std::fmt;
use std::str::FromStr;

use crate::errors::HarvestError;

/// Comparison operator of a match expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `==` literal equality
    Eq,
    /// `>=`
    Gte,
    /// `<=`
    Lte,
    /// `!=` no case-insensitive match (strings) or inequality
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `=` case-insensitive regex search (strings) or equality
    Search,
}

impl Operator {
    /// Detection priority
    pub const PRIORITY: [Operator; 7] = [
        Operator::Eq,
        Operator::Gte,
        Operator::Lte,
        Operator::Ne,
        Operator::Gt,
        Operator::Lt,
        Operator::Search,
    ];

    /// Operator symbol as written in expressions
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Search => "=",
        }
    }

    /// First operator, by priority, occurring in `expression`
    pub fn detect(expression: &str) -> Option<Operator> {
        Self::PRIORITY
            .into_iter()
            .find(|op| expression.contains(op.symbol()))
    }

    /// Returns true for `<`, `<=`, `>`, `>=`
    pub fn is_ordering(&self) -> bool {
        matches!(self, Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte)
    }

    /// Returns true for operators that treat string operands as patterns
    pub fn is_pattern(&self) -> bool {
        matches!(self, Operator::Search | Operator::Ne)
    }
}

impl FromStr for Operator {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::PRIORITY
            .into_iter()
            .find(|op| op.symbol() == s)
            .ok_or_else(|| HarvestError::invalid_expression(s, "unknown operator"))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}
