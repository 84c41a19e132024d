// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// RethinkDown
//
// An ordered key-value storage engine over a RethinkDB-style document
// store. Each adapter instance owns one table whose documents have the shape
// `{ key, value }` with `key` as primary key. Ranges are answered with
// filter, sort and limit queries; batches run as one server-side iteration.
//
// # Modules
//
// - [`down`] -- `RethinkDown`, plus the `connect`, `destroy` and `repair` helpers.
// - [`engine`] -- The `StorageEngine` and `EngineIterator` traits.
// - [`location`] -- Location string parsing into `ConnectionOptions`.
// - [`codec`] -- Key/value coercion between caller input and stored slices.
// - [`link`] -- The connection manager over either driver personality.
// - [`schema`] -- Database and table bootstrap.
// - [`query`] -- Translation of key/value operations into queries.
// - [`iterator`] -- Range queries and the pull iterator.
// - [`batch`] -- Batch operations and the chained batch builder.
// - [`options`] -- Per-call options.
// - [`error`] -- The `Error` taxonomy and driver error normalization.
//
// # Example
//
// ```rust
// use std::sync::Arc;
// use reql_driver::{MemoryDriver, MemoryServer};
// use rethinkdown::{OpenOptions, ReadOptions, RethinkDown, Slice, WriteOptions};
//
// # tokio_test::block_on(async {
// let driver = Arc::new(MemoryDriver::connecting(MemoryServer::new()));
// let mut db = RethinkDown::new("rethinkdb://localhost/app/kv", driver).unwrap();
// db.open(OpenOptions::default()).await.unwrap();
//
// db.put("hello", "world", WriteOptions::default()).await.unwrap();
// let value = db.get("hello", ReadOptions { as_buffer: false }).await.unwrap();
// assert_eq!(value, Slice::Text("world".into()));
//
// db.close().await.unwrap();
// # });
// ```

pub mod batch;
pub mod codec;
pub mod down;
pub mod engine;
pub mod error;
pub mod iterator;
pub mod link;
pub mod location;
pub mod options;
pub mod query;
pub mod schema;

/// Document field holding the key; also the table's primary key.
pub const KEY: &str = "key";

/// Document field holding the value.
pub const VALUE: &str = "value";

pub use batch::{BatchOperation, ChainedBatch};
pub use codec::{Input, Record, Slice};
pub use down::{connect, destroy, repair, RethinkDown};
pub use engine::{EngineIterator, StorageEngine};
pub use error::{Error, Result};
pub use iterator::{RangeIterator, RangeSpec};
pub use link::{Link, Status};
pub use location::ConnectionOptions;
pub use options::{OpenOptions, ReadOptions, WriteOptions};
