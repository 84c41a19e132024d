// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key and value coercion.
//
// Callers hand the adapter loosely typed input (`Input`); the store only
// ever sees strings and binary (`Slice`). Empty input (null, "", an empty
// buffer, an empty array or object) is never a valid key and is stored as
// the empty string when used as a value.

use std::fmt;

use reql_driver::Datum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Loosely typed caller input for keys and values.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Null,
    Text(String),
    Bytes(Vec<u8>),
    /// Any other JSON value; stored as its JSON text.
    Json(Value),
}

/// A key or value as the store holds it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Slice {
    Text(String),
    Bytes(Vec<u8>),
}

/// A key/value pair read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Slice,
    pub value: Slice,
}

impl Input {
    pub fn is_empty(&self) -> bool {
        match self {
            Input::Null => true,
            Input::Text(s) => s.is_empty(),
            Input::Bytes(b) => b.is_empty(),
            Input::Json(Value::Null) => true,
            Input::Json(Value::String(s)) => s.is_empty(),
            Input::Json(Value::Array(items)) => items.is_empty(),
            Input::Json(Value::Object(map)) => map.is_empty(),
            Input::Json(_) => false,
        }
    }

    /// True for the string and binary shapes accepted as range bounds.
    pub fn is_text_or_bytes(&self) -> bool {
        matches!(
            self,
            Input::Text(_) | Input::Bytes(_) | Input::Json(Value::String(_))
        )
    }

    fn stringify(self) -> Slice {
        match self {
            Input::Null => Slice::Text(String::new()),
            Input::Text(s) | Input::Json(Value::String(s)) => Slice::Text(s),
            Input::Bytes(b) => Slice::Bytes(b),
            Input::Json(other) => Slice::Text(other.to_string()),
        }
    }
}

impl Slice {
    pub fn is_empty(&self) -> bool {
        match self {
            Slice::Text(s) => s.is_empty(),
            Slice::Bytes(b) => b.is_empty(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Slice::Text(s) => s.as_bytes(),
            Slice::Bytes(b) => b,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Slice::Text(s) => s.into_bytes(),
            Slice::Bytes(b) => b,
        }
    }

    pub fn to_datum(&self) -> Datum {
        match self {
            Slice::Text(s) => Datum::String(s.clone()),
            Slice::Bytes(b) => Datum::Binary(b.clone()),
        }
    }
}

/// Binary renders as lossy UTF-8.
impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slice::Text(s) => f.write_str(s),
            Slice::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
        }
    }
}

/// Validate and normalize a key.
pub fn coerce_key(key: impl Into<Input>) -> Result<Slice> {
    let key = key.into();
    if key.is_empty() {
        return Err(Error::InvalidKey("key cannot be an empty value".into()));
    }
    let key = key.stringify();
    if key.is_empty() {
        return Err(Error::InvalidKey("key cannot stringify to an empty value".into()));
    }
    Ok(key)
}

/// Normalize a value; empty input becomes the empty string.
pub fn coerce_value(value: impl Into<Input>) -> Slice {
    let value = value.into();
    if value.is_empty() {
        Slice::Text(String::new())
    } else {
        value.stringify()
    }
}

/// Convert a stored datum to the representation the caller asked for.
pub fn as_buffer(datum: Datum, want_buffer: bool) -> Slice {
    let slice = match datum {
        Datum::Null => Slice::Text(String::new()),
        Datum::String(s) => Slice::Text(s),
        Datum::Binary(b) => Slice::Bytes(b),
        other => Slice::Text(other.to_json().to_string()),
    };
    match (slice, want_buffer) {
        (Slice::Text(s), true) => Slice::Bytes(s.into_bytes()),
        (Slice::Bytes(b), false) => Slice::Text(String::from_utf8_lossy(&b).into_owned()),
        (slice, _) => slice,
    }
}

/// Keeps text as text and bytes as bytes; empty input is not collapsed.
impl From<Input> for Slice {
    fn from(input: Input) -> Self {
        input.stringify()
    }
}

impl From<&str> for Input {
    fn from(value: &str) -> Self {
        Input::Text(value.to_string())
    }
}

impl From<String> for Input {
    fn from(value: String) -> Self {
        Input::Text(value)
    }
}

impl From<&String> for Input {
    fn from(value: &String) -> Self {
        Input::Text(value.clone())
    }
}

impl From<&[u8]> for Input {
    fn from(value: &[u8]) -> Self {
        Input::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for Input {
    fn from(value: Vec<u8>) -> Self {
        Input::Bytes(value)
    }
}

impl From<Slice> for Input {
    fn from(value: Slice) -> Self {
        match value {
            Slice::Text(s) => Input::Text(s),
            Slice::Bytes(b) => Input::Bytes(b),
        }
    }
}

impl From<&Slice> for Input {
    fn from(value: &Slice) -> Self {
        value.clone().into()
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Input::Null,
            Value::String(s) => Input::Text(s),
            other => Input::Json(other),
        }
    }
}

impl From<i64> for Input {
    fn from(value: i64) -> Self {
        Input::Json(Value::from(value))
    }
}

impl<T: Into<Input>> From<Option<T>> for Input {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Input::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_inputs() {
        assert!(Input::Null.is_empty());
        assert!(Input::from("").is_empty());
        assert!(Input::from(Vec::<u8>::new()).is_empty());
        assert!(Input::from(json!([])).is_empty());
        assert!(Input::from(json!({})).is_empty());
        assert!(!Input::from(json!(0)).is_empty());
        assert!(!Input::from("a").is_empty());
    }

    #[test]
    fn test_coerce_key_rejects_empty() {
        assert!(matches!(coerce_key(""), Err(Error::InvalidKey(_))));
        assert!(matches!(coerce_key(None::<&str>), Err(Error::InvalidKey(_))));
        assert!(matches!(coerce_key(Vec::<u8>::new()), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_coerce_key_stringifies() {
        assert_eq!(coerce_key(42i64).unwrap(), Slice::Text("42".into()));
        assert_eq!(coerce_key(json!([1, 2])).unwrap(), Slice::Text("[1,2]".into()));
        assert_eq!(coerce_key(b"k".to_vec()).unwrap(), Slice::Bytes(b"k".to_vec()));
    }

    #[test]
    fn test_coerce_value() {
        assert_eq!(coerce_value(Input::Null), Slice::Text(String::new()));
        assert_eq!(coerce_value(json!([])), Slice::Text(String::new()));
        assert_eq!(coerce_value(b"raw".to_vec()), Slice::Bytes(b"raw".to_vec()));
        assert_eq!(coerce_value(json!({"a": 1})), Slice::Text(r#"{"a":1}"#.into()));
    }

    #[test]
    fn test_slice_from_input_keeps_type() {
        assert_eq!(Slice::from(Input::from(Vec::<u8>::new())), Slice::Bytes(vec![]));
        assert_eq!(Slice::from(Input::from("")), Slice::Text(String::new()));
    }

    #[test]
    fn test_as_buffer() {
        assert_eq!(
            as_buffer(Datum::from("v"), true),
            Slice::Bytes(b"v".to_vec())
        );
        assert_eq!(
            as_buffer(Datum::Binary(b"v".to_vec()), false),
            Slice::Text("v".into())
        );
        assert_eq!(as_buffer(Datum::Null, false), Slice::Text(String::new()));
        assert_eq!(as_buffer(Datum::from(1.0), false), Slice::Text("1".into()));
    }

    #[test]
    fn test_slice_deserializes_untagged() {
        let text: Slice = serde_json::from_value(json!("a")).unwrap();
        assert_eq!(text, Slice::Text("a".into()));
        let bytes: Slice = serde_json::from_value(json!([1, 2])).unwrap();
        assert_eq!(bytes, Slice::Bytes(vec![1, 2]));
    }
}
