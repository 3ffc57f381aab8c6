//! Operation arguments
//!
//! A JSON object of named arguments with typed accessors. `null` reads the
//! same as an absent argument. Type mismatches fail with `InvalidArgument`.

use serde_json::{Map, Value};

use crate::errors::{HarvestError, HarvestResult};

/// Named operation arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Map<String, Value>);

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON object; `null` gives empty arguments
    pub fn from_value(value: Value) -> HarvestResult<Self> {
        match value {
            Value::Object(map) => Ok(Args(map)),
            Value::Null => Ok(Args::new()),
            other => Err(HarvestError::invalid_argument(
                "arguments",
                format!("expected an object, got {}", other),
            )),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    fn present(&self, name: &str) -> Option<&Value> {
        self.0.get(name).filter(|value| !value.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.present(name).is_some()
    }

    /// Raw value of an argument
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.present(name)
    }

    /// Required string argument
    pub fn str(&self, name: &str) -> HarvestResult<&str> {
        self.opt_str(name)?
            .ok_or_else(|| HarvestError::invalid_argument(name, "required"))
    }

    pub fn opt_str(&self, name: &str) -> HarvestResult<Option<&str>> {
        match self.present(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(mismatch(name, "a string", other)),
        }
    }

    pub fn str_or<'a>(&'a self, name: &str, default: &'a str) -> HarvestResult<&'a str> {
        Ok(self.opt_str(name)?.unwrap_or(default))
    }

    /// First present string among `names`
    pub fn first_str(&self, names: &[&str]) -> HarvestResult<Option<&str>> {
        for name in names {
            if let Some(value) = self.opt_str(name)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn bool_or(&self, name: &str, default: bool) -> HarvestResult<bool> {
        match self.present(name) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(mismatch(name, "a boolean", other)),
        }
    }

    pub fn opt_i64(&self, name: &str) -> HarvestResult<Option<i64>> {
        match self.present(name) {
            None => Ok(None),
            Some(value) => value
                .as_i64()
                .map(Some)
                .ok_or_else(|| mismatch(name, "an integer", value)),
        }
    }

    pub fn i64_or(&self, name: &str, default: i64) -> HarvestResult<i64> {
        Ok(self.opt_i64(name)?.unwrap_or(default))
    }

    /// A list of strings; a single string reads as a one-element list
    pub fn str_list(&self, name: &str) -> HarvestResult<Vec<String>> {
        match self.present(name) {
            None => Err(HarvestError::invalid_argument(name, "required")),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    other => Err(mismatch(name, "a list of strings", other)),
                })
                .collect(),
            Some(other) => Err(mismatch(name, "a list of strings", other)),
        }
    }
}

fn mismatch(name: &str, expected: &str, actual: &Value) -> HarvestError {
    HarvestError::invalid_argument(name, format!("expected {}, got {}", expected, actual))
}

impl From<Map<String, Value>> for Args {
    fn from(map: Map<String, Value>) -> Self {
        Args(map)
    }
}

impl TryFrom<Value> for Args {
    type Error = HarvestError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Args::from_value(value)
    }
}
