// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Driver capability traits.
//
// A document-store driver comes in one of two personalities:
//
// - a *connector*, whose asynchronous `connect` hands back a connection that
//   must later be closed, or
// - a *pool factory*, invoked synchronously with the connection options to
//   produce a ready query runner backed by an implicit connection pool that
//   is drained on teardown.
//
// Both personalities share the same query surface (`Runner`). A `Driver`
// advertises which personality it offers; callers probe once and keep the
// result.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::datum::Datum;
use crate::error::DriverError;
use crate::term::Term;

/// Connection parameters handed to a driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    pub host: String,
    pub port: u16,
    pub db: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Connect timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Suppress driver-side logging (pool personality).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,
}

/// Executes query terms against the store.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run `term` and return its fully materialised result.
    async fn run(&self, term: &Term) -> Result<Datum, DriverError>;

    /// Run `term` and return a cursor over the resulting sequence.
    async fn cursor(&self, term: &Term) -> Result<Box<dyn Cursor>, DriverError>;
}

/// A connection produced by a [`Connector`].
#[async_trait]
pub trait Connection: Runner {
    async fn close(&self) -> Result<(), DriverError>;
}

/// A query runner produced by a [`PoolFactory`].
pub trait Pool: Runner {
    /// Release every pooled connection. Completes synchronously.
    fn drain(&self);
}

/// The asynchronous connect personality.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, DriverError>;
}

/// The synchronous factory personality.
pub trait PoolFactory: Send + Sync {
    fn pool(&self, options: &ConnectOptions) -> Result<Arc<dyn Pool>, DriverError>;
}

/// Capability probe over the two personalities.
///
/// Implementations override whichever accessor they support. When both are
/// offered, callers prefer the connector.
pub trait Driver: Send + Sync {
    fn connector(&self) -> Option<&dyn Connector> {
        None
    }

    fn pool_factory(&self) -> Option<&dyn PoolFactory> {
        None
    }
}

/// A server-side cursor over a query's result stream.
#[async_trait]
pub trait Cursor: Send {
    /// Pull the next row.
    ///
    /// Fails with [`DriverError::no_more_rows`] once the stream is exhausted.
    async fn next(&mut self) -> Result<Datum, DriverError>;

    async fn close(&mut self) -> Result<(), DriverError>;
}
