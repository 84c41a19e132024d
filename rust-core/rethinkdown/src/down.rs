// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The adapter: one instance per location.
//
// Lifecycle methods take `&mut self`, so only one open or close can be in
// flight; data operations take `&self` and may overlap freely. Iterators
// share the link with the adapter and fail once it is closed.

use std::sync::Arc;

use async_trait::async_trait;
use reql_driver::Driver;
use tracing::{debug, info, warn};

use crate::batch::{validate_all, BatchOperation};
use crate::codec::{as_buffer, coerce_key, coerce_value, Input, Record, Slice};
use crate::engine::{EngineIterator, StorageEngine};
use crate::error::{Error, Result};
use crate::iterator::{RangeIterator, RangeSpec};
use crate::link::{Link, Status};
use crate::location::ConnectionOptions;
use crate::options::{OpenOptions, ReadOptions, WriteOptions};
use crate::query::{check_write, Translator};
use crate::schema;

/// A key-value store backed by one document table.
pub struct RethinkDown {
    location: String,
    options: ConnectionOptions,
    driver: Arc<dyn Driver>,
    translator: Translator,
    link: Option<Arc<Link>>,
    status: Status,
}

impl RethinkDown {
    /// Create a closed adapter for `location`.
    pub fn new(location: &str, driver: Arc<dyn Driver>) -> Result<Self> {
        let options = ConnectionOptions::parse(location)?;
        let translator = Translator::new(&options.db, &options.table);
        Ok(Self {
            location: location.to_string(),
            options,
            driver,
            translator,
            link: None,
            status: Status::Closed,
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    pub fn status(&self) -> Status {
        self.status
    }

    fn link(&self) -> Result<&Arc<Link>> {
        match (&self.link, self.status) {
            (Some(link), Status::Open) => Ok(link),
            _ => Err(Error::NotOpen),
        }
    }

    /// Connect and bootstrap the schema. Opening an open adapter is a no-op.
    pub async fn open(&mut self, options: OpenOptions) -> Result<()> {
        if self.status == Status::Open {
            return Ok(());
        }
        self.status = Status::Opening;
        let (db, table) = (&self.options.db, &self.options.table);
        info!(host = %self.options.host, port = self.options.port, db, table, "opening");

        let link = match Link::establish(self.driver.as_ref(), &self.options.connect_options()).await
        {
            Ok(link) => link,
            Err(err) => {
                self.status = Status::Closed;
                return Err(err);
            }
        };

        if let Err(err) = schema::bootstrap(&link, db, table, options).await {
            if let Err(release) = link.release().await {
                warn!(error = %release, "failed to release link after bootstrap failure");
            }
            self.status = Status::Closed;
            return Err(err);
        }

        info!(db, table, pool = link.is_pool(), "open");
        self.link = Some(Arc::new(link));
        self.status = Status::Open;
        Ok(())
    }

    /// Close the connection or drain the pool. Closing a closed adapter is a
    /// no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(link) = self.link.take() else {
            return Ok(());
        };
        self.status = Status::Closing;
        let result = link.release().await;
        self.status = Status::Closed;
        info!(location = %self.location, "closed");
        result
    }

    pub async fn get(&self, key: impl Into<Input>, options: ReadOptions) -> Result<Slice> {
        let key = coerce_key(key)?;
        let link = self.link()?;
        debug!(key = %key, as_buffer = options.as_buffer, "get");
        let value = link.run(&self.translator.get(&key)).await?;
        Ok(as_buffer(value, options.as_buffer))
    }

    pub async fn put(
        &self,
        key: impl Into<Input>,
        value: impl Into<Input>,
        options: WriteOptions,
    ) -> Result<()> {
        let key = coerce_key(key)?;
        let value = coerce_value(value);
        let link = self.link()?;
        debug!(key = %key, sync = options.sync, "put");
        check_write(&link.run(&self.translator.put(&key, &value, options)).await?)
    }

    pub async fn del(&self, key: impl Into<Input>, options: WriteOptions) -> Result<()> {
        let key = coerce_key(key)?;
        let link = self.link()?;
        debug!(key = %key, sync = options.sync, "del");
        check_write(&link.run(&self.translator.del(&key, options)).await?)
    }

    /// Validate every operation, then apply them all in one request. An
    /// empty batch succeeds without a round trip.
    pub async fn batch(&self, operations: Vec<BatchOperation>, options: WriteOptions) -> Result<()> {
        let ops = validate_all(operations)?;
        let link = self.link()?;
        if ops.is_empty() {
            return Ok(());
        }
        debug!(operations = ops.len(), sync = options.sync, "batch");
        check_write(&link.run(&self.translator.batch(&ops, options)).await?)
    }

    /// Count the records with keys in `[start, end]`. Both bounds must be
    /// strings or bytes.
    pub async fn approximate_size(
        &self,
        start: impl Into<Input>,
        end: impl Into<Input>,
    ) -> Result<u64> {
        let (start, end) = (start.into(), end.into());
        if !start.is_text_or_bytes() {
            return Err(Error::InvalidParam {
                name: "start",
                expected: "string or Buffer",
            });
        }
        if !end.is_text_or_bytes() {
            return Err(Error::InvalidParam {
                name: "end",
                expected: "string or Buffer",
            });
        }
        let (start, end) = (Slice::from(start), Slice::from(end));
        let link = self.link()?;
        debug!(start = %start, end = %end, "approximate size");
        let count = link.run(&self.translator.count_between(&start, &end)).await?;
        count
            .as_f64()
            .map(|n| n as u64)
            .ok_or_else(|| Error::Store(format!("Expected a count but found {count}")))
    }

    /// Build an iterator over `range`. The query runs on the first `next`.
    pub fn iterator(&self, range: RangeSpec) -> Result<RangeIterator> {
        let link = self.link()?;
        debug!(?range, "iterator");
        Ok(RangeIterator::new(
            Arc::clone(link),
            self.translator.table(),
            &range,
        ))
    }
}

#[async_trait]
impl StorageEngine for RethinkDown {
    type Iterator = RangeIterator;

    async fn open(&mut self, options: OpenOptions) -> Result<()> {
        RethinkDown::open(self, options).await
    }

    async fn close(&mut self) -> Result<()> {
        RethinkDown::close(self).await
    }

    async fn get(&self, key: Input, options: ReadOptions) -> Result<Slice> {
        RethinkDown::get(self, key, options).await
    }

    async fn put(&self, key: Input, value: Input, options: WriteOptions) -> Result<()> {
        RethinkDown::put(self, key, value, options).await
    }

    async fn del(&self, key: Input, options: WriteOptions) -> Result<()> {
        RethinkDown::del(self, key, options).await
    }

    async fn batch(&self, operations: Vec<BatchOperation>, options: WriteOptions) -> Result<()> {
        RethinkDown::batch(self, operations, options).await
    }

    async fn approximate_size(&self, start: Input, end: Input) -> Result<u64> {
        RethinkDown::approximate_size(self, start, end).await
    }

    fn iterator(&self, range: RangeSpec) -> Result<RangeIterator> {
        RethinkDown::iterator(self, range)
    }
}

#[async_trait]
impl EngineIterator for RangeIterator {
    async fn next(&mut self) -> Result<Option<Record>> {
        RangeIterator::next(self).await
    }

    async fn end(&mut self) -> Result<()> {
        RangeIterator::end(self).await
    }

    fn seek(&mut self, key: Input) -> Result<()> {
        RangeIterator::seek(self, key)
    }
}

/// Connect to `location` without bootstrapping, returning the link and the
/// parsed options.
pub async fn connect(location: &str, driver: &dyn Driver) -> Result<(Link, ConnectionOptions)> {
    let options = ConnectionOptions::parse(location)?;
    let link = Link::establish(driver, &options.connect_options()).await?;
    Ok((link, options))
}

/// Drop the table named by `location`.
pub async fn destroy(location: &str, driver: &dyn Driver) -> Result<()> {
    let (link, options) = connect(location, driver).await?;
    info!(db = %options.db, table = %options.table, "destroying table");
    let translator = Translator::new(&options.db, &options.table);
    let result = link.run(&translator.drop_table()).await.map(|_| ());
    if let Err(err) = link.release().await {
        warn!(error = %err, "failed to release link after destroy");
    }
    result
}

/// Repair is not supported by this store.
pub async fn repair(_location: &str) -> Result<()> {
    Err(Error::NotImplemented("repair"))
}
