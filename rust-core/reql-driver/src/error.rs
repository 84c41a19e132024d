// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Driver error types.
//
// Mirrors the shapes a document-store driver actually hands back: an error
// raised by the server while evaluating a query (carrying a `msg`), an error
// produced inside the client (closed connection, exhausted cursor), an
// untyped payload passed through verbatim, or a native Rust error from the
// transport.

use thiserror::Error;

/// Message used by drivers when a cursor has no further rows.
pub const NO_MORE_ROWS: &str = "No more rows in the cursor.";

/// Errors reported by a driver or by the server behind it.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The server failed to evaluate a query. `msg` is the server's text,
    /// including messages raised by `error` terms.
    #[error("{msg}")]
    Query {
        /// Server-provided message.
        msg: String,
    },

    /// A client-side failure (closed connection, drained pool, exhausted
    /// cursor).
    #[error("{msg}")]
    Client {
        /// Driver-provided message.
        msg: String,
    },

    /// An untyped error payload.
    #[error("{0}")]
    Payload(serde_json::Value),

    /// A native error from the transport or runtime.
    #[error(transparent)]
    Native(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl DriverError {
    /// Build a server-side query error.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query { msg: msg.into() }
    }

    /// Build a client-side driver error.
    pub fn client(msg: impl Into<String>) -> Self {
        Self::Client { msg: msg.into() }
    }

    /// The error raised by a cursor once it is exhausted.
    pub fn no_more_rows() -> Self {
        Self::client(NO_MORE_ROWS)
    }

    /// Return the `msg` carried by this error, if its shape has one.
    ///
    /// Payloads qualify when they are objects with a string `msg` or
    /// `message` field.
    pub fn msg(&self) -> Option<&str> {
        match self {
            Self::Query { msg } | Self::Client { msg } => Some(msg),
            Self::Payload(value) => value
                .get("msg")
                .or_else(|| value.get("message"))
                .and_then(|m| m.as_str()),
            Self::Native(_) => None,
        }
    }
}
