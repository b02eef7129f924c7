//! Records: named mappings from feature key to number-or-null.

use crate::errors::{Result, SynthError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

/// A single feature value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Number(f64),
    Null,
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(f64::from(value))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Number(v) => serializer.serialize_f64(*v),
            Value::Null => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.into())
    }
}

/// Feature key to value mapping
pub type Record = BTreeMap<String, Value>;

/// Build a record from `(key, value)` pairs.
pub fn record<K, V, I>(pairs: I) -> Record
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Convert a JSON object into a record, rejecting anything that is not a
/// number or null.
pub fn record_from_json(value: &serde_json::Value) -> Result<Record> {
    let object = value.as_object().ok_or_else(|| SynthError::InvalidValueKind {
        key: String::new(),
        found: format!("expected a JSON object, got {value}"),
    })?;

    let mut out = Record::new();
    for (key, raw) in object {
        let parsed = match raw {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(v) => Value::Number(v),
                None => {
                    return Err(SynthError::InvalidValueKind {
                        key: key.clone(),
                        found: n.to_string(),
                    })
                }
            },
            other => {
                return Err(SynthError::InvalidValueKind {
                    key: key.clone(),
                    found: other.to_string(),
                })
            }
        };
        out.insert(key.clone(), parsed);
    }
    Ok(out)
}

/// Convert a JSON array of objects into records.
pub fn records_from_json(value: &serde_json::Value) -> Result<Vec<Record>> {
    let items = value.as_array().ok_or_else(|| SynthError::InvalidValueKind {
        key: String::new(),
        found: format!("expected a JSON array, got {value}"),
    })?;
    items.iter().map(record_from_json).collect()
}
