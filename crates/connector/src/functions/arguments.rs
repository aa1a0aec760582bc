//! Decoded call arguments.

use super::FunctionError;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Argument name used when the argument text is not a JSON object.
pub const RAW_INPUT_ARGUMENT: &str = "input";

/// A single argument value, coerced to its native scalar type.
///
/// Nested arrays and objects are kept as their raw JSON text.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Json(String),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert back to a JSON value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::String(s) => Value::String(s.clone()),
            Self::Json(raw) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone())),
        }
    }
}

impl From<&Value> for ArgValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => Self::String(s.clone()),
            Value::Array(_) | Value::Object(_) => Self::Json(value.to_string()),
        }
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

/// Named arguments for a function invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments(BTreeMap<String, ArgValue>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an argument value as found in a call object.
    ///
    /// Objects are walked key by key. A string is treated as argument text
    /// (some models double-encode the object). Any other value becomes the
    /// single [`RAW_INPUT_ARGUMENT`].
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self::from_map(map),
            Value::Null => Self::new(),
            Value::String(text) => Self::from_text(text),
            other => Self::single(ArgValue::from(other)),
        }
    }

    /// Decode raw argument text.
    ///
    /// Text that is not valid JSON becomes the single [`RAW_INPUT_ARGUMENT`]
    /// holding the text unchanged.
    pub fn from_text(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::new();
        }
        match serde_json::from_str::<Value>(raw.trim()) {
            Ok(Value::Object(map)) => Self::from_map(&map),
            Ok(Value::Null) => Self::new(),
            Ok(other) => Self::single(ArgValue::from(&other)),
            Err(_) => Self::single(ArgValue::String(raw.to_string())),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        Self(
            map.iter()
                .map(|(key, value)| (key.clone(), ArgValue::from(value)))
                .collect(),
        )
    }

    fn single(value: ArgValue) -> Self {
        let mut args = Self::new();
        args.insert(RAW_INPUT_ARGUMENT, value);
        args
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.0.insert(name.into(), value);
    }

    pub fn with(mut self, name: impl Into<String>, value: ArgValue) -> Self {
        self.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// A string argument, or `InvalidArgument` if absent or not a string.
    pub fn require_str(&self, name: &str) -> Result<&str, FunctionError> {
        self.get(name)
            .ok_or_else(|| FunctionError::missing(name))?
            .as_str()
            .ok_or_else(|| FunctionError::invalid_argument(name, "expected a string"))
    }

    /// A numeric argument, or `InvalidArgument` if absent or not numeric.
    pub fn require_f64(&self, name: &str) -> Result<f64, FunctionError> {
        self.get(name)
            .ok_or_else(|| FunctionError::missing(name))?
            .as_f64()
            .ok_or_else(|| FunctionError::invalid_argument(name, "expected a number"))
    }

    /// All arguments as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, ArgValue)> for Arguments {
    fn from_iter<T: IntoIterator<Item = (String, ArgValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
