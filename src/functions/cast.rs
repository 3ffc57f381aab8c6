//! Value coercion
//!
//! Converts untyped textual or native values into a target kind. Boolean
//! coercion is not truthiness: only `false`, `null` and the strings
//! `False`, `false`, `No`, `no` become `false`.
//!
//! Timestamps are written as UTC RFC 3339 strings with microsecond
//! precision, so lexical order of two coerced timestamps equals their
//! chronological order.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Number, Value};

use crate::errors::{HarvestError, HarvestResult};

const FALSE_STRINGS: [&str; 4] = ["False", "false", "No", "no"];

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Target kinds accepted by [`cast`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastKind {
    Bool,
    Str,
    Int,
    Float,
    List,
    Dict,
    /// Seconds since the Unix epoch
    TimestampFromEpoch,
    /// ISO 8601 / RFC 3339 text
    TimestampFromIso,
}

impl CastKind {
    /// Textual name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            CastKind::Bool => "bool",
            CastKind::Str => "str",
            CastKind::Int => "int",
            CastKind::Float => "float",
            CastKind::List => "list",
            CastKind::Dict => "dict",
            CastKind::TimestampFromEpoch => "datetime.fromtimestamp",
            CastKind::TimestampFromIso => "datetime.fromisoformat",
        }
    }
}

impl FromStr for CastKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bool" => Ok(CastKind::Bool),
            "str" => Ok(CastKind::Str),
            "int" => Ok(CastKind::Int),
            "float" => Ok(CastKind::Float),
            "list" => Ok(CastKind::List),
            "dict" => Ok(CastKind::Dict),
            "datetime.fromtimestamp" => Ok(CastKind::TimestampFromEpoch),
            "datetime.fromisoformat" => Ok(CastKind::TimestampFromIso),
            other => Err(HarvestError::invalid_argument(
                "kind",
                format!("unknown cast kind '{}'", other),
            )),
        }
    }
}

impl fmt::Display for CastKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Render a value as plain text: strings without quotes, everything else as JSON
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Convert `value` into `kind`
///
/// Returns [`HarvestError::CoercionFailure`] when the conversion is impossible.
pub fn cast(value: &Value, kind: CastKind) -> HarvestResult<Value> {
    let fail = || HarvestError::coercion(render(value), kind.as_str());

    match kind {
        CastKind::Bool => Ok(Value::Bool(to_bool(value))),
        CastKind::Str => Ok(Value::String(render(value))),
        CastKind::Int => to_int(value).map(Value::from).ok_or_else(fail),
        CastKind::Float => to_float(value)
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(fail),
        CastKind::List => match value {
            Value::Array(_) => Ok(value.clone()),
            Value::String(s) => Ok(Value::Array(
                s.chars().map(|c| Value::String(c.to_string())).collect(),
            )),
            Value::Object(map) => Ok(Value::Array(
                map.keys().cloned().map(Value::String).collect(),
            )),
            _ => Err(fail()),
        },
        CastKind::Dict => match value {
            Value::Object(_) => Ok(value.clone()),
            Value::Array(items) => pairs_to_map(items).map(Value::Object).ok_or_else(fail),
            _ => Err(fail()),
        },
        CastKind::TimestampFromEpoch => to_float(value)
            .and_then(from_epoch)
            .map(|dt| Value::String(format_timestamp(&dt)))
            .ok_or_else(fail),
        CastKind::TimestampFromIso => parse_timestamp(value)
            .map(|dt| Value::String(format_timestamp(&dt)))
            .ok_or_else(fail),
    }
}

/// Boolean coercion (not truthiness)
pub fn to_bool(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !FALSE_STRINGS.contains(&s.as_str()),
        _ => true,
    }
}

/// Python-style truthiness, used where the engine tests for "present and non-empty"
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// True iff the value is an integer or a string holding an integer literal
///
/// `"1.5"` is deliberately not a number here.
pub fn is_number(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// Numeric view of a value, parsing strings as floats
pub fn to_float(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn pairs_to_map(items: &[Value]) -> Option<Map<String, Value>> {
    let mut map = Map::new();
    for item in items {
        match item {
            Value::Array(pair) if pair.len() == 2 => {
                map.insert(render(&pair[0]), pair[1].clone());
            }
            _ => return None,
        }
    }
    Some(map)
}

fn from_epoch(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let secs = seconds.floor();
    let nanos = ((seconds - secs) * 1_000_000_000.0).round() as u32;
    Utc.timestamp_opt(secs as i64, nanos.min(999_999_999)).single()
}

/// Parse an ISO 8601 value into a UTC timestamp
///
/// Offsets are honoured; naive date-times and bare dates are taken as UTC.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let text = match value {
        Value::String(s) => s.trim(),
        _ => return None,
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Canonical text form of a timestamp
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}
