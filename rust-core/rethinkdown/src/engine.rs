// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Storage-engine contract.
//
// `StorageEngine` is the ordered key-value interface the adapter satisfies;
// `EngineIterator` is the matching pull iterator. Any engine gets a
// `ChainedBatch` builder for free.

use async_trait::async_trait;

use crate::batch::{BatchOperation, ChainedBatch};
use crate::codec::{Input, Record, Slice};
use crate::error::Result;
use crate::iterator::RangeSpec;
use crate::options::{OpenOptions, ReadOptions, WriteOptions};

/// An ordered key-value store with an explicit open/close lifecycle.
#[async_trait]
pub trait StorageEngine: Send + Sync {
    type Iterator: EngineIterator;

    async fn open(&mut self, options: OpenOptions) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    async fn get(&self, key: Input, options: ReadOptions) -> Result<Slice>;

    async fn put(&self, key: Input, value: Input, options: WriteOptions) -> Result<()>;

    async fn del(&self, key: Input, options: WriteOptions) -> Result<()>;

    /// Apply every operation or none.
    async fn batch(&self, operations: Vec<BatchOperation>, options: WriteOptions) -> Result<()>;

    /// Number of records with keys in `[start, end]`.
    async fn approximate_size(&self, start: Input, end: Input) -> Result<u64>;

    fn iterator(&self, range: RangeSpec) -> Result<Self::Iterator>;

    /// Start a batch that is applied on `write`.
    fn chained_batch(&self) -> ChainedBatch<'_, Self>
    where
        Self: Sized,
    {
        ChainedBatch::new(self)
    }
}

/// Pull iterator over a key range.
#[async_trait]
pub trait EngineIterator: Send {
    /// Next record, or `None` at the end of the range.
    async fn next(&mut self) -> Result<Option<Record>>;

    async fn end(&mut self) -> Result<()>;

    fn seek(&mut self, key: Input) -> Result<()>;
}
