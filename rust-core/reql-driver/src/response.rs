// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Decoded write responses.

use serde::{Deserialize, Serialize};

use crate::datum::Datum;
use crate::error::DriverError;

/// Summary object returned by `insert`, `delete` and `for_each` writes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteSummary {
    pub inserted: u64,
    pub replaced: u64,
    pub unchanged: u64,
    pub skipped: u64,
    pub deleted: u64,
    pub errors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_error: Option<String>,
}

impl WriteSummary {
    /// Decode a summary from a write result. Missing counters read as zero.
    pub fn from_datum(datum: &Datum) -> Result<Self, DriverError> {
        serde_json::from_value(datum.to_json())
            .map_err(|e| DriverError::client(format!("malformed write summary: {e}")))
    }

    /// The first reported error, when the write recorded any.
    pub fn failure(&self) -> Option<&str> {
        if self.errors > 0 {
            self.first_error.as_deref()
        } else {
            None
        }
    }

    /// Fold another summary into this one, keeping the earliest error.
    pub fn merge(&mut self, other: WriteSummary) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.deleted += other.deleted;
        self.errors += other.errors;
        if self.first_error.is_none() {
            self.first_error = other.first_error;
        }
    }

    pub fn to_datum(&self) -> Datum {
        let mut fields = vec![
            ("inserted", Datum::from(self.inserted as f64)),
            ("replaced", Datum::from(self.replaced as f64)),
            ("unchanged", Datum::from(self.unchanged as f64)),
            ("skipped", Datum::from(self.skipped as f64)),
            ("deleted", Datum::from(self.deleted as f64)),
            ("errors", Datum::from(self.errors as f64)),
        ];
        if let Some(first_error) = &self.first_error {
            fields.push(("first_error", Datum::from(first_error.as_str())));
        }
        Datum::object(fields)
    }
}
