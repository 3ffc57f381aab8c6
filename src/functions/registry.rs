//! # Value Function Registry
//!
//! Named functions callable from match expressions, e.g.
//! `cast(age,int)>=cast(18,int)`. The registry is built once and passed
//! explicitly to the evaluator.

use std::collections::BTreeMap;

use serde_json::Value;

use super::cast::{cast, is_number, render, CastKind};
use super::helpers::{delimiter_list_to_string, key_value_list_to_dict};
use crate::errors::{HarvestError, HarvestResult};

/// A value function: positional arguments in, one value out
pub type ValueFunction = fn(&[Value]) -> HarvestResult<Value>;

/// Registry of value functions
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, ValueFunction>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            functions: BTreeMap::new(),
        }
    }

    /// Create a registry holding the built-in functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.functions.insert("cast".into(), builtin_cast);
        registry.functions.insert("is_number".into(), builtin_is_number);
        registry
            .functions
            .insert("key_value_list_to_dict".into(), builtin_key_value_list_to_dict);
        registry
            .functions
            .insert("delimiter_list_to_string".into(), builtin_delimiter_list_to_string);
        registry
    }

    /// Register a function
    pub fn register(&mut self, name: impl Into<String>, function: ValueFunction) -> HarvestResult<()> {
        let name = name.into();
        if self.functions.contains_key(&name) {
            return Err(HarvestError::invalid_argument(
                "name",
                format!("function '{}' already registered", name),
            ));
        }
        self.functions.insert(name, function);
        Ok(())
    }

    /// Get a function by name
    pub fn get(&self, name: &str) -> Option<ValueFunction> {
        self.functions.get(name).copied()
    }

    /// Whether a function is registered
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Call a function by name
    pub fn call(&self, name: &str, args: &[Value]) -> HarvestResult<Value> {
        let function = self
            .get(name)
            .ok_or_else(|| HarvestError::invalid_expression(name, "unknown function"))?;
        function(args)
    }

    /// Registered function names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    /// Get function count
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

fn arg<'a>(args: &'a [Value], position: usize, name: &str) -> HarvestResult<&'a Value> {
    args.get(position)
        .ok_or_else(|| HarvestError::invalid_argument(name, "missing positional argument"))
}

fn text_arg(args: &[Value], position: usize, default: &str) -> String {
    args.get(position).map(render).unwrap_or_else(|| default.to_string())
}

fn builtin_cast(args: &[Value]) -> HarvestResult<Value> {
    let value = arg(args, 0, "value")?;
    let kind: CastKind = render(arg(args, 1, "kind")?).parse()?;
    cast(value, kind)
}

fn builtin_is_number(args: &[Value]) -> HarvestResult<Value> {
    Ok(Value::Bool(is_number(arg(args, 0, "value")?)))
}

fn builtin_key_value_list_to_dict(args: &[Value]) -> HarvestResult<Value> {
    let value = arg(args, 0, "value")?;
    let name_key = text_arg(args, 1, "Key");
    let value_key = text_arg(args, 2, "Value");
    key_value_list_to_dict(value, &name_key, &value_key).map(Value::Object)
}

fn builtin_delimiter_list_to_string(args: &[Value]) -> HarvestResult<Value> {
    let value = arg(args, 0, "value")?;
    let delimiter = text_arg(args, 1, " ");
    delimiter_list_to_string(value, &delimiter).map(Value::String)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_registered() {
        let registry = FunctionRegistry::with_builtins();
        assert_eq!(
            registry.names(),
            vec!["cast", "delimiter_list_to_string", "is_number", "key_value_list_to_dict"]
        );
        assert!(registry.contains("cast"));
        assert!(!registry.contains("eval"));
    }

    #[test]
    fn test_call_cast() {
        let registry = FunctionRegistry::default();
        assert_eq!(registry.call("cast", &[json!("7"), json!("int")]).unwrap(), json!(7));
        assert!(registry.call("cast", &[json!("x"), json!("int")]).is_err());
        assert!(registry.call("cast", &[json!("7")]).is_err());
    }

    #[test]
    fn test_call_unknown_function() {
        let registry = FunctionRegistry::default();
        let err = registry.call("upper", &[json!("x")]).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_register_duplicate() {
        fn identity(args: &[Value]) -> HarvestResult<Value> {
            Ok(args.first().cloned().unwrap_or(Value::Null))
        }

        let mut registry = FunctionRegistry::empty();
        assert!(registry.is_empty());
        registry.register("identity", identity).unwrap();
        assert!(registry.register("identity", identity).is_err());
        assert_eq!(registry.call("identity", &[json!(3)]).unwrap(), json!(3));
    }
}
