// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adapter error taxonomy and driver error normalization.
//
// Every failure reported by the adapter is an `Error`. Errors raised by the
// store travel back as plain messages, so the messages produced here double
// as a wire contract: `Error::classify` maps a message back to its variant,
// whether it was raised by an `error` term the adapter composed or by the
// store itself.

use std::sync::OnceLock;

use regex::Regex;
use reql_driver::DriverError;
use thiserror::Error;

/// Errors returned by the adapter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The location string could not be parsed.
    #[error("{0}")]
    Config(String),

    /// A key was empty or stringified to nothing.
    #[error("{0}")]
    InvalidKey(String),

    /// A caller argument had the wrong type.
    #[error("Invalid parameter {name} must be type {expected} with valid value")]
    InvalidParam {
        name: &'static str,
        expected: &'static str,
    },

    #[error("Key {0} not found")]
    NotFound(String),

    #[error("Table {0} already exists")]
    TableExists(String),

    #[error("Table {0} does not exist")]
    TableMissing(String),

    #[error("Database {0} does not exist")]
    DatabaseMissing(String),

    /// The table exists but is keyed on something other than `key`.
    #[error(
        "Database {db} table {table} does not have its primary key set to \"key\" and cannot \
         be used, please re-create the table with the option \"{{ primaryKey: 'key' }}\" or \
         remove the table and use the \"createIfMissing\" option in the open method"
    )]
    SchemaMismatch { db: String, table: String },

    #[error("Invalid batch operation. Valid operations are \"put\" and \"del\"")]
    InvalidBatchOperation,

    #[error("{0} is not implemented")]
    NotImplemented(&'static str),

    /// An operation was issued while the adapter was not open.
    #[error("Database is not open")]
    NotOpen,

    /// `next` or `end` was called after the iterator ended.
    #[error("Iterator has already ended")]
    IteratorEnded,

    /// Any other error surfaced by the store or its driver.
    #[error("{0}")]
    Store(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

struct Patterns {
    not_found: Regex,
    table_exists: Regex,
    table_missing: Regex,
    database_missing: Regex,
    schema_mismatch: Regex,
    no_more_rows: Regex,
}

fn compile() -> std::result::Result<Patterns, regex::Error> {
    Ok(Patterns {
        not_found: Regex::new(r"(?s)^Key (.*) not found$")?,
        table_exists: Regex::new(r"^(?:TableExists|Table `?(.+?)`? already exists\.?)$")?,
        table_missing: Regex::new(r"^Table `?(.+?)`? does not exist\.?$")?,
        database_missing: Regex::new(r"^Database `?(.+?)`? does not exist\.?$")?,
        schema_mismatch: Regex::new(
            r"^Database (.+?) table (.+?) does not have its primary key set",
        )?,
        no_more_rows: Regex::new(r"(?i)no more rows")?,
    })
}

fn patterns() -> Option<&'static Patterns> {
    static PATTERNS: OnceLock<std::result::Result<Patterns, regex::Error>> = OnceLock::new();
    PATTERNS.get_or_init(compile).as_ref().ok()
}

impl Error {
    /// Map a store message back onto the variant that produced it.
    pub fn classify(message: &str) -> Self {
        let Some(p) = patterns() else {
            return Error::Store(message.to_string());
        };
        let capture = |re: &Regex, group: usize| {
            re.captures(message)
                .and_then(|c| c.get(group))
                .map(|m| m.as_str().to_string())
        };

        if let Some(key) = capture(&p.not_found, 1) {
            Error::NotFound(key)
        } else if p.table_exists.is_match(message) {
            Error::TableExists(capture(&p.table_exists, 1).unwrap_or_default())
        } else if let Some(table) = capture(&p.table_missing, 1) {
            Error::TableMissing(table)
        } else if let Some(db) = capture(&p.database_missing, 1) {
            Error::DatabaseMissing(db)
        } else if let (Some(db), Some(table)) = (
            capture(&p.schema_mismatch, 1),
            capture(&p.schema_mismatch, 2),
        ) {
            Error::SchemaMismatch { db, table }
        } else if message == Error::InvalidBatchOperation.to_string() {
            Error::InvalidBatchOperation
        } else {
            Error::Store(message.to_string())
        }
    }

    /// Normalize any driver error into an adapter error.
    ///
    /// Errors carrying a message are classified by it; untyped payloads
    /// without one are reported as their JSON text; native errors as their
    /// display form.
    pub fn from_driver(err: DriverError) -> Self {
        match err.msg() {
            Some(msg) => Error::classify(msg),
            None => Error::Store(err.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::from_driver(err)
    }
}

/// True when `err` is a cursor reporting exhaustion rather than a failure.
pub(crate) fn is_end_of_stream(err: &DriverError) -> bool {
    match (err.msg(), patterns()) {
        (Some(msg), Some(p)) => p.no_more_rows.is_match(msg),
        _ => false,
    }
}
