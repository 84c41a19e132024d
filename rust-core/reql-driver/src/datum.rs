// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Datum model for the document store.
//
// A `Datum` is a fully evaluated JSON-like value with one extra scalar,
// `Binary`, which travels on the wire as a `$reql_type$` pseudo-object.
// Datums are totally ordered the way the store orders them: first by type
// name, then by value.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Number, Value};

use crate::error::DriverError;

/// Field marking a pseudo-type object on the wire.
pub const REQL_TYPE_FIELD: &str = "$reql_type$";

// Integral numbers below 2^53 travel as JSON integers.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// A fully evaluated value stored in, or returned by, the document store.
#[derive(Debug, Clone)]
pub enum Datum {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<Datum>),
    Object(BTreeMap<String, Datum>),
}

impl Datum {
    /// The store's name for this datum's type, as reported by `type_of`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Datum::Null => "NULL",
            Datum::Bool(_) => "BOOL",
            Datum::Number(_) => "NUMBER",
            Datum::String(_) => "STRING",
            Datum::Binary(_) => "PTYPE<BINARY>",
            Datum::Array(_) => "ARRAY",
            Datum::Object(_) => "OBJECT",
        }
    }

    // ARRAY < BOOL < NULL < NUMBER < OBJECT < PTYPE<BINARY> < STRING
    fn type_rank(&self) -> u8 {
        match self {
            Datum::Array(_) => 0,
            Datum::Bool(_) => 1,
            Datum::Null => 2,
            Datum::Number(_) => 3,
            Datum::Object(_) => 4,
            Datum::Binary(_) => 5,
            Datum::String(_) => 6,
        }
    }

    /// Build an object datum from `(field, value)` pairs.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Datum)>,
    {
        Datum::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Truthiness used by `branch`, `filter`, `and` and `or`: only `false`
    /// and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Datum::Null | Datum::Bool(false))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Datum::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Datum>> {
        match self {
            Datum::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Look up `field` on an object datum.
    pub fn field(&self, field: &str) -> Option<&Datum> {
        self.as_object().and_then(|map| map.get(field))
    }

    /// Encode this datum in the store's JSON wire form.
    ///
    /// Arrays are emitted as plain JSON arrays; the term encoder wraps them
    /// in `MAKE_ARRAY` where the wire protocol requires it.
    pub fn to_json(&self) -> Value {
        match self {
            Datum::Null => Value::Null,
            Datum::Bool(b) => Value::Bool(*b),
            Datum::Number(n) if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER => {
                Value::from(*n as i64)
            }
            Datum::Number(n) => Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            Datum::String(s) => Value::String(s.clone()),
            Datum::Binary(bytes) => {
                let mut map = Map::new();
                map.insert(REQL_TYPE_FIELD.to_string(), Value::String("BINARY".into()));
                map.insert("data".to_string(), Value::String(STANDARD.encode(bytes)));
                Value::Object(map)
            }
            Datum::Array(items) => Value::Array(items.iter().map(Datum::to_json).collect()),
            Datum::Object(map) => Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    /// Decode a datum from the store's JSON wire form.
    pub fn from_json(value: Value) -> Result<Self, DriverError> {
        Ok(match value {
            Value::Null => Datum::Null,
            Value::Bool(b) => Datum::Bool(b),
            Value::Number(n) => Datum::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Datum::String(s),
            Value::Array(items) => Datum::Array(
                items
                    .into_iter()
                    .map(Datum::from_json)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(mut map) => {
                let is_binary = map.get(REQL_TYPE_FIELD).and_then(Value::as_str) == Some("BINARY");
                if is_binary {
                    let data = map
                        .remove("data")
                        .and_then(|d| d.as_str().map(str::to_owned))
                        .ok_or_else(|| DriverError::client("binary pseudo-type without data"))?;
                    let bytes = STANDARD
                        .decode(data)
                        .map_err(|e| DriverError::client(format!("invalid binary data: {e}")))?;
                    Datum::Binary(bytes)
                } else {
                    Datum::Object(
                        map.into_iter()
                            .map(|(k, v)| Ok((k, Datum::from_json(v)?)))
                            .collect::<Result<_, DriverError>>()?,
                    )
                }
            }
        })
    }
}

impl PartialEq for Datum {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Datum {}

impl PartialOrd for Datum {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Datum {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Datum::Null, Datum::Null) => Ordering::Equal,
            (Datum::Bool(a), Datum::Bool(b)) => a.cmp(b),
            (Datum::Number(a), Datum::Number(b)) => a.total_cmp(b),
            (Datum::String(a), Datum::String(b)) => a.cmp(b),
            (Datum::Binary(a), Datum::Binary(b)) => a.cmp(b),
            (Datum::Array(a), Datum::Array(b)) => a.cmp(b),
            (Datum::Object(a), Datum::Object(b)) => a.cmp(b),
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }
}

/// Strings render raw and binary renders as (lossy) UTF-8; everything else
/// renders as its JSON text.
impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::String(s) => f.write_str(s),
            Datum::Binary(bytes) => f.write_str(&String::from_utf8_lossy(bytes)),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::String(value.to_string())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::String(value)
    }
}

impl From<Vec<u8>> for Datum {
    fn from(value: Vec<u8>) -> Self {
        Datum::Binary(value)
    }
}

impl From<bool> for Datum {
    fn from(value: bool) -> Self {
        Datum::Bool(value)
    }
}

impl From<f64> for Datum {
    fn from(value: f64) -> Self {
        Datum::Number(value)
    }
}

impl From<i64> for Datum {
    fn from(value: i64) -> Self {
        Datum::Number(value as f64)
    }
}

impl From<usize> for Datum {
    fn from(value: usize) -> Self {
        Datum::Number(value as f64)
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(value: Vec<Datum>) -> Self {
        Datum::Array(value)
    }
}
