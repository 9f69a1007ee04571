//! Setting values as a closed tagged union.
//!
//! The remote server speaks JSON, but only a subset of JSON is a valid
//! setting value: no `null`, no fractional numbers. Conversion happens once at
//! the boundary ([`SettingValue::try_from`]) and fails loudly instead of
//! coercing, so every value the store holds is one of the five shapes below.
//!
//! Structural equality is the derived `PartialEq`: lists compare pointwise in
//! order, objects compare by key set and per-key value regardless of the order
//! keys arrived in (a `BTreeMap` compares sorted entries). `Clone` is a deep
//! copy, so a cloned list or object shares nothing with its source.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum SettingValue {
    Bool(bool),
    Str(String),
    Int(i64),
    List(Vec<SettingValue>),
    Object(BTreeMap<String, SettingValue>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueError {
    #[error("null at {pointer} is not a setting value")]
    Null { pointer: String },
    #[error("number {number} at {pointer} is not a 64-bit integer")]
    NotInteger { number: String, pointer: String },
}

impl SettingValue {
    /// Short name of the variant, for logs and error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Str(_) => "string",
            Self::Int(_) => "int",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[SettingValue]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&BTreeMap<String, SettingValue>> {
        match self {
            Self::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Convert an arbitrary JSON value, reporting the JSON pointer of the
    /// first offending element.
    pub fn from_json(value: Value) -> Result<Self, ValueError> {
        let mut pointer = String::from("$");
        Self::convert(value, &mut pointer)
    }

    fn convert(value: Value, pointer: &mut String) -> Result<Self, ValueError> {
        match value {
            Value::Null => Err(ValueError::Null {
                pointer: pointer.clone(),
            }),
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::String(s) => Ok(Self::Str(s)),
            Value::Number(n) => n.as_i64().map(Self::Int).ok_or_else(|| ValueError::NotInteger {
                number: n.to_string(),
                pointer: pointer.clone(),
            }),
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    let len = pointer.len();
                    pointer.push_str(&format!("/{index}"));
                    out.push(Self::convert(item, pointer)?);
                    pointer.truncate(len);
                }
                Ok(Self::List(out))
            }
            Value::Object(map) => {
                let mut out = BTreeMap::new();
                for (key, item) in map {
                    let len = pointer.len();
                    pointer.push('/');
                    pointer.push_str(&key);
                    let converted = Self::convert(item, pointer)?;
                    pointer.truncate(len);
                    out.insert(key, converted);
                }
                Ok(Self::Object(out))
            }
        }
    }
}

impl TryFrom<Value> for SettingValue {
    type Error = ValueError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

impl From<SettingValue> for Value {
    fn from(value: SettingValue) -> Self {
        match value {
            SettingValue::Bool(b) => Value::Bool(b),
            SettingValue::Str(s) => Value::String(s),
            SettingValue::Int(i) => Value::from(i),
            SettingValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            SettingValue::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::from(self.clone()))
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<Vec<SettingValue>> for SettingValue {
    fn from(value: Vec<SettingValue>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, SettingValue>> for SettingValue {
    fn from(value: BTreeMap<String, SettingValue>) -> Self {
        Self::Object(value)
    }
}
