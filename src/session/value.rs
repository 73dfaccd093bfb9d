//! Session payload values.
//!
//! A session payload is a map of string keys to [`Value`]s. `Value` is a
//! closed, serializable union so that encoding and decoding are total: any
//! payload that can be built can be written to a cookie and read back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// The payload carried by a session.
pub type Values = BTreeMap<String, Value>;

/// A heterogeneous session value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// JSON has no NaN or infinity, so non-finite floats fail to encode
    /// rather than coming back as `null`.
    Float(#[serde(serialize_with = "serialize_finite")] f64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

fn serialize_finite<S: Serializer>(v: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if !v.is_finite() {
        return Err(serde::ser::Error::custom(format!(
            "non-finite float {} cannot be stored in a session",
            v
        )));
    }
    serializer.serialize_f64(*v)
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_serialization_keeps_variants_apart() {
        let values: Values = [
            ("s".to_string(), Value::from("1")),
            ("i".to_string(), Value::from(1)),
            ("b".to_string(), Value::from(vec![1u8])),
            ("l".to_string(), Value::from(vec![Value::from(1)])),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_string(&values).unwrap();
        let back: Values = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
        assert_eq!(back["s"].as_str(), Some("1"));
        assert_eq!(back["i"].as_i64(), Some(1));
    }
}
