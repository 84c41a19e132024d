// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Batch operations and the chained batch builder.

use serde_json::Value;

use crate::codec::{coerce_key, coerce_value, Input};
use crate::engine::StorageEngine;
use crate::error::{Error, Result};
use crate::options::WriteOptions;
use crate::query::WriteOp;

/// One entry of a batch as supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOperation {
    Put { key: Input, value: Input },
    Del { key: Input },
}

impl BatchOperation {
    pub fn put(key: impl Into<Input>, value: impl Into<Input>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn del(key: impl Into<Input>) -> Self {
        BatchOperation::Del { key: key.into() }
    }

    /// Decode `{ "type": "put" | "del", "key": .., "value": .. }`.
    pub fn from_json(op: &Value) -> Result<Self> {
        let field = |name: &str| Input::from(op.get(name).cloned().unwrap_or(Value::Null));
        match op.get("type").and_then(Value::as_str) {
            Some("put") => Ok(BatchOperation::put(field("key"), field("value"))),
            Some("del") => Ok(BatchOperation::del(field("key"))),
            _ => Err(Error::InvalidBatchOperation),
        }
    }

    /// Coerce the key (and value) into their stored form.
    pub(crate) fn validate(self) -> Result<WriteOp> {
        match self {
            BatchOperation::Put { key, value } => Ok(WriteOp::Put {
                key: coerce_key(key)?,
                value: coerce_value(value),
            }),
            BatchOperation::Del { key } => Ok(WriteOp::Del {
                key: coerce_key(key)?,
            }),
        }
    }
}

/// Validate every operation before any is sent.
pub(crate) fn validate_all(operations: Vec<BatchOperation>) -> Result<Vec<WriteOp>> {
    operations.into_iter().map(BatchOperation::validate).collect()
}

/// Accumulates puts and deletes and submits them as one batch.
pub struct ChainedBatch<'a, E: StorageEngine + ?Sized> {
    engine: &'a E,
    operations: Vec<BatchOperation>,
}

impl<'a, E: StorageEngine + ?Sized> ChainedBatch<'a, E> {
    pub fn new(engine: &'a E) -> Self {
        Self {
            engine,
            operations: Vec::new(),
        }
    }

    pub fn put(&mut self, key: impl Into<Input>, value: impl Into<Input>) -> &mut Self {
        self.operations.push(BatchOperation::put(key, value));
        self
    }

    pub fn del(&mut self, key: impl Into<Input>) -> &mut Self {
        self.operations.push(BatchOperation::del(key));
        self
    }

    /// Drop every queued operation.
    pub fn clear(&mut self) -> &mut Self {
        self.operations.clear();
        self
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Submit the queued operations.
    pub async fn write(self, options: WriteOptions) -> Result<()> {
        self.engine.batch(self.operations, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Slice;
    use serde_json::json;

    #[test]
    fn test_from_json() {
        let put = BatchOperation::from_json(&json!({ "type": "put", "key": "k", "value": "v" }));
        assert_eq!(put, Ok(BatchOperation::put("k", "v")));
        let del = BatchOperation::from_json(&json!({ "type": "del", "key": "k" }));
        assert_eq!(del, Ok(BatchOperation::del("k")));
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let op = BatchOperation::from_json(&json!({ "type": "merge", "key": "k" }));
        assert_eq!(op, Err(Error::InvalidBatchOperation));
        let op = BatchOperation::from_json(&json!({ "key": "k" }));
        assert_eq!(op, Err(Error::InvalidBatchOperation));
    }

    #[test]
    fn test_validate_all_fails_on_any_bad_key() {
        let ops = vec![
            BatchOperation::put("a", "1"),
            BatchOperation::del(""),
            BatchOperation::put("b", "2"),
        ];
        assert!(matches!(validate_all(ops), Err(Error::InvalidKey(_))));
    }

    #[test]
    fn test_validate_normalizes_values() {
        let ops = vec![BatchOperation::put("a", Input::Null)];
        assert_eq!(
            validate_all(ops).unwrap(),
            vec![WriteOp::Put {
                key: Slice::Text("a".into()),
                value: Slice::Text(String::new()),
            }]
        );
    }
}
