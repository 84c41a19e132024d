// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-call options.

use reql_driver::Durability;
use serde::{Deserialize, Serialize};

/// Options for `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpenOptions {
    /// Create the database and table when they are missing.
    pub create_if_missing: bool,
    /// Fail when the table already exists.
    pub error_if_exists: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
        }
    }
}

/// Options for `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReadOptions {
    /// Return values as bytes rather than text.
    pub as_buffer: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { as_buffer: true }
    }
}

/// Options for `put`, `del` and `batch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteOptions {
    /// Wait for the write to reach disk.
    pub sync: bool,
}

impl WriteOptions {
    pub fn durability(&self) -> Durability {
        if self.sync {
            Durability::Hard
        } else {
            Durability::Soft
        }
    }
}
