// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connection manager.
//
// A `Link` is the adapter's handle on the store. It is established once per
// open by probing the driver for its personality, and hides the difference
// between a closable connection and a drainable pool from everything above
// it.

use std::fmt;
use std::sync::Arc;

use reql_driver::{ConnectOptions, Connection, Cursor, Datum, Driver, Pool, Term};
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Lifecycle of an adapter instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Closed,
    Opening,
    Open,
    Closing,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Closed => "closed",
            Status::Opening => "opening",
            Status::Open => "open",
            Status::Closing => "closing",
        })
    }
}

/// An established connection or pool.
pub enum Link {
    Connection(Box<dyn Connection>),
    Pool(Arc<dyn Pool>),
}

impl Link {
    /// Establish a link, preferring the connector personality when the
    /// driver offers both.
    pub async fn establish(driver: &dyn Driver, options: &ConnectOptions) -> Result<Self> {
        if let Some(connector) = driver.connector() {
            debug!(host = %options.host, port = options.port, "connecting");
            let connection = connector.connect(options).await?;
            Ok(Link::Connection(connection))
        } else if let Some(factory) = driver.pool_factory() {
            debug!(host = %options.host, port = options.port, "creating pool");
            let pool = factory.pool(options)?;
            Ok(Link::Pool(pool))
        } else {
            Err(Error::Config(
                "Driver offers neither a connector nor a pool factory".into(),
            ))
        }
    }

    /// True for the synchronous pool personality.
    pub fn is_pool(&self) -> bool {
        matches!(self, Link::Pool(_))
    }

    /// Run `term` and return its result.
    pub async fn run(&self, term: &Term) -> Result<Datum> {
        trace!(query = %term.to_query(), "run");
        let result = match self {
            Link::Connection(connection) => connection.run(term).await,
            Link::Pool(pool) => pool.run(term).await,
        };
        result.map_err(Error::from_driver)
    }

    /// Run `term` and return a cursor over its rows.
    pub async fn cursor(&self, term: &Term) -> Result<Box<dyn Cursor>> {
        trace!(query = %term.to_query(), "cursor");
        let result = match self {
            Link::Connection(connection) => connection.cursor(term).await,
            Link::Pool(pool) => pool.cursor(term).await,
        };
        result.map_err(Error::from_driver)
    }

    /// Close the connection or drain the pool.
    pub async fn release(&self) -> Result<()> {
        match self {
            Link::Connection(connection) => connection.close().await.map_err(Error::from_driver),
            Link::Pool(pool) => {
                pool.drain();
                Ok(())
            }
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Link::Connection(_) => f.write_str("Link::Connection"),
            Link::Pool(_) => f.write_str("Link::Pool"),
        }
    }
}
