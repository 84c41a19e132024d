// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document-store driver capability
//
// This crate describes what the RethinkDown adapter needs from a document
// store driver: a datum model, a query-term builder with its JSON wire
// encoding, the two driver personalities (async connector, synchronous pool
// factory) and a cursor abstraction. It also ships an in-process reference
// server that evaluates terms, used for tests and embedding.
//
// # Modules
//
// - [`datum`] -- `Datum`, the store's value model and total order.
// - [`term`] -- `Term`, the chainable query builder and wire encoder.
// - [`driver`] -- The `Driver`, `Connector`, `PoolFactory` and `Cursor` traits.
// - [`response`] -- `WriteSummary`, the decoded write result.
// - [`error`] -- `DriverError`, the shapes a driver error can take.
// - [`memory`] -- `MemoryServer` and `MemoryDriver`.
//
// # Example
//
// ```rust
// use reql_driver::memory::{MemoryDriver, MemoryServer};
// use reql_driver::driver::{ConnectOptions, Driver};
// use reql_driver::term::Term;
//
// # tokio_test::block_on(async {
// let driver = MemoryDriver::connecting(MemoryServer::new());
// let options = ConnectOptions {
//     host: "localhost".into(),
//     port: 28015,
//     db: "test".into(),
//     user: None,
//     password: None,
//     timeout: None,
//     silent: None,
// };
// let conn = driver.connector().unwrap().connect(&options).await.unwrap();
// conn.run(&Term::db_create("test")).await.unwrap();
// conn.close().await.unwrap();
// # });
// ```

pub mod datum;
pub mod driver;
pub mod error;
mod eval;
pub mod memory;
pub mod response;
pub mod term;

pub use datum::Datum;
pub use driver::{ConnectOptions, Connection, Connector, Cursor, Driver, Pool, PoolFactory, Runner};
pub use error::DriverError;
pub use memory::{MemoryDriver, MemoryServer};
pub use response::WriteSummary;
pub use term::{Conflict, DeleteOptions, Durability, InsertOptions, Order, Term, TermType};
