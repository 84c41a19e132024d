// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process reference server and driver.
//
// `MemoryServer` holds a catalog of databases and tables behind a tokio
// `RwLock` and evaluates query terms against it. Queries that only read
// share the read lock. Queries that write hold the write lock and are rolled
// back if evaluation fails, so a query that raises an error part way through
// (a batch hitting a missing key, say) leaves no partial writes behind.
//
// `MemoryDriver` exposes the server through either driver personality.
// Intended for tests, development and embedding.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::datum::Datum;
use crate::driver::{
    ConnectOptions, Connection, Connector, Cursor, Driver, Pool, PoolFactory, Runner,
};
use crate::error::DriverError;
use crate::eval::{Catalog, Evaluator};
use crate::term::Term;

/// A document store living in process memory.
///
/// Cloning is cheap and every clone shares the same catalog.
///
/// # Example
///
/// ```rust
/// use reql_driver::memory::MemoryServer;
/// use reql_driver::term::Term;
///
/// # tokio_test::block_on(async {
/// let server = MemoryServer::new();
/// server.execute(&Term::db_create("test")).await.unwrap();
/// assert_eq!(server.databases().await, vec!["test".to_string()]);
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    catalog: Arc<RwLock<Catalog>>,
    credentials: Option<Arc<(String, String)>>,
    open_links: Arc<AtomicUsize>,
}

impl MemoryServer {
    /// Create an empty server with no databases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `user` and `password` from every connection.
    pub fn with_credentials(mut self, user: &str, password: &str) -> Self {
        self.credentials = Some(Arc::new((user.to_string(), password.to_string())));
        self
    }

    /// Evaluate `term` and return its materialised result.
    pub async fn execute(&self, term: &Term) -> Result<Datum, DriverError> {
        trace!(query = %term.to_query(), "evaluating");
        if term.writes() {
            let mut catalog = self.catalog.write().await;
            Evaluator::new(&mut catalog).run(term)
        } else {
            let catalog = self.catalog.read().await;
            Evaluator::read_only(&catalog).run(term)
        }
    }

    /// Evaluate `term` and return the rows a cursor would stream.
    pub async fn stream(&self, term: &Term) -> Result<Vec<Datum>, DriverError> {
        trace!(query = %term.to_query(), "evaluating for cursor");
        if term.writes() {
            let mut catalog = self.catalog.write().await;
            Evaluator::new(&mut catalog).rows(term)
        } else {
            let catalog = self.catalog.read().await;
            Evaluator::read_only(&catalog).rows(term)
        }
    }

    /// Names of every database, sorted.
    pub async fn databases(&self) -> Vec<String> {
        self.catalog.read().await.dbs.keys().cloned().collect()
    }

    /// Names of every table in `db`, sorted. Empty when `db` is missing.
    pub async fn tables(&self, db: &str) -> Vec<String> {
        self.catalog
            .read()
            .await
            .dbs
            .get(db)
            .map(|d| d.tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of documents in `db.table`, if the table exists.
    pub async fn row_count(&self, db: &str, table: &str) -> Option<usize> {
        self.catalog
            .read()
            .await
            .dbs
            .get(db)
            .and_then(|d| d.tables.get(table))
            .map(|t| t.rows.len())
    }

    /// Connections and pools currently open against this server.
    pub fn open_links(&self) -> usize {
        self.open_links.load(Ordering::SeqCst)
    }

    fn authenticate(&self, options: &ConnectOptions) -> Result<(), DriverError> {
        let Some(expected) = &self.credentials else {
            return Ok(());
        };
        let user = options.user.as_deref().unwrap_or("admin");
        let password = options.password.as_deref().unwrap_or("");
        if user == expected.0 && password == expected.1 {
            Ok(())
        } else {
            Err(DriverError::query(format!(
                "Wrong password or unknown user `{user}`."
            )))
        }
    }

    fn acquire(&self) -> Handle {
        self.open_links.fetch_add(1, Ordering::SeqCst);
        Handle {
            server: self.clone(),
            open: AtomicBool::new(true),
        }
    }
}

// Shared state of a connection or pool: the server plus an open flag that
// is released exactly once.
struct Handle {
    server: MemoryServer,
    open: AtomicBool,
}

impl Handle {
    fn check(&self, what: &str) -> Result<(), DriverError> {
        if self.open.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(DriverError::client(format!("{what} is closed.")))
        }
    }

    fn release(&self) -> bool {
        let was_open = self.open.swap(false, Ordering::SeqCst);
        if was_open {
            self.server.open_links.fetch_sub(1, Ordering::SeqCst);
        }
        was_open
    }
}

/// Which personality a [`MemoryDriver`] offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Personality {
    Connector,
    Pool,
}

/// A driver over a [`MemoryServer`].
#[derive(Debug, Clone)]
pub struct MemoryDriver {
    server: MemoryServer,
    personality: Personality,
}

impl MemoryDriver {
    /// A driver offering the asynchronous connect personality.
    pub fn connecting(server: MemoryServer) -> Self {
        Self {
            server,
            personality: Personality::Connector,
        }
    }

    /// A driver offering the pool-factory personality.
    pub fn pooled(server: MemoryServer) -> Self {
        Self {
            server,
            personality: Personality::Pool,
        }
    }

    pub fn personality(&self) -> Personality {
        self.personality
    }

    pub fn server(&self) -> &MemoryServer {
        &self.server
    }
}

impl Driver for MemoryDriver {
    fn connector(&self) -> Option<&dyn Connector> {
        match self.personality {
            Personality::Connector => Some(self),
            Personality::Pool => None,
        }
    }

    fn pool_factory(&self) -> Option<&dyn PoolFactory> {
        match self.personality {
            Personality::Pool => Some(self),
            Personality::Connector => None,
        }
    }
}

#[async_trait]
impl Connector for MemoryDriver {
    async fn connect(&self, options: &ConnectOptions) -> Result<Box<dyn Connection>, DriverError> {
        self.server.authenticate(options)?;
        debug!(host = %options.host, port = options.port, db = %options.db, "memory connection opened");
        Ok(Box::new(MemoryConnection {
            handle: self.server.acquire(),
        }))
    }
}

impl PoolFactory for MemoryDriver {
    fn pool(&self, options: &ConnectOptions) -> Result<Arc<dyn Pool>, DriverError> {
        self.server.authenticate(options)?;
        debug!(host = %options.host, port = options.port, db = %options.db, "memory pool created");
        Ok(Arc::new(MemoryPool {
            handle: self.server.acquire(),
        }))
    }
}

/// Connection handed out by the connect personality.
pub struct MemoryConnection {
    handle: Handle,
}

#[async_trait]
impl Runner for MemoryConnection {
    async fn run(&self, term: &Term) -> Result<Datum, DriverError> {
        self.handle.check("Connection")?;
        self.handle.server.execute(term).await
    }

    async fn cursor(&self, term: &Term) -> Result<Box<dyn Cursor>, DriverError> {
        self.handle.check("Connection")?;
        let rows = self.handle.server.stream(term).await?;
        Ok(Box::new(MemoryCursor::new(rows)))
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn close(&self) -> Result<(), DriverError> {
        if self.handle.release() {
            debug!("memory connection closed");
        }
        Ok(())
    }
}

/// Query runner handed out by the pool personality.
pub struct MemoryPool {
    handle: Handle,
}

#[async_trait]
impl Runner for MemoryPool {
    async fn run(&self, term: &Term) -> Result<Datum, DriverError> {
        self.handle.check("Pool")?;
        self.handle.server.execute(term).await
    }

    async fn cursor(&self, term: &Term) -> Result<Box<dyn Cursor>, DriverError> {
        self.handle.check("Pool")?;
        let rows = self.handle.server.stream(term).await?;
        Ok(Box::new(MemoryCursor::new(rows)))
    }
}

impl Pool for MemoryPool {
    fn drain(&self) {
        if self.handle.release() {
            debug!("memory pool drained");
        }
    }
}

/// Cursor over rows that were fully evaluated when it was opened.
pub struct MemoryCursor {
    rows: VecDeque<Datum>,
    closed: bool,
}

impl MemoryCursor {
    pub fn new(rows: Vec<Datum>) -> Self {
        Self {
            rows: rows.into(),
            closed: false,
        }
    }
}

#[async_trait]
impl Cursor for MemoryCursor {
    async fn next(&mut self) -> Result<Datum, DriverError> {
        if self.closed {
            return Err(DriverError::no_more_rows());
        }
        self.rows.pop_front().ok_or_else(DriverError::no_more_rows)
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.closed = true;
        self.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NO_MORE_ROWS;
    use crate::term::{Conflict, InsertOptions};

    fn options() -> ConnectOptions {
        ConnectOptions {
            host: "localhost".into(),
            port: 28015,
            db: "test".into(),
            user: None,
            password: None,
            timeout: None,
            silent: None,
        }
    }

    async fn seeded() -> MemoryServer {
        let server = MemoryServer::new();
        server.execute(&Term::db_create("test")).await.unwrap();
        server
            .execute(&Term::db("test").table_create("kv", "key"))
            .await
            .unwrap();
        server
    }

    #[tokio::test]
    async fn test_failed_query_publishes_nothing() {
        let server = seeded().await;
        let doc = Term::object([("key", Term::from("a")), ("value", Term::from("1"))]);
        let options = InsertOptions {
            conflict: Conflict::Update,
            ..Default::default()
        };
        let query = Term::expr(Datum::Array(vec![Datum::from("a"), Datum::from("b")])).for_each(
            Term::func(|key| {
                Term::branch(
                    key.eq("b"),
                    Term::error("Key b not found"),
                    Term::db("test").table("kv").insert(doc.clone(), options),
                )
            }),
        );
        let err = server.execute(&query).await.unwrap_err();
        assert_eq!(err.to_string(), "Key b not found");
        assert_eq!(server.row_count("test", "kv").await, Some(0));
    }

    #[tokio::test]
    async fn test_failed_query_restores_overwritten_and_deleted_rows() {
        let server = seeded().await;
        let kv = || Term::db("test").table("kv");
        let options = InsertOptions {
            conflict: Conflict::Update,
            ..Default::default()
        };
        for key in ["a", "b"] {
            let doc = Term::object([("key", Term::from(key)), ("value", Term::from("old"))]);
            server.execute(&kv().insert(doc, options)).await.unwrap();
        }

        let overwrite = Term::object([("key", Term::from("a")), ("value", Term::from("new"))]);
        let query = Term::expr(Datum::Array(vec![
            Datum::from("put"),
            Datum::from("del"),
            Datum::from("fail"),
        ]))
        .for_each(Term::func(|step| {
            Term::branch(
                step.clone().eq("put"),
                kv().insert(overwrite.clone(), options),
                Term::branch(
                    step.eq("del"),
                    kv().get("b").delete(Default::default()),
                    Term::error("boom"),
                ),
            )
        }));
        assert!(server.execute(&query).await.is_err());

        assert_eq!(server.row_count("test", "kv").await, Some(2));
        let value = server.execute(&kv().get("a").field("value")).await.unwrap();
        assert_eq!(value, Datum::from("old"));
    }

    #[tokio::test]
    async fn test_failed_query_restores_schema() {
        let server = seeded().await;
        let query = Term::db_create("scratch")
            .apply(Term::thunk(Term::db("test").table_drop("kv")))
            .apply(Term::thunk(Term::error("boom")));
        assert!(server.execute(&query).await.is_err());
        assert_eq!(server.databases().await, vec!["test".to_string()]);
        assert_eq!(server.tables("test").await, vec!["kv".to_string()]);
    }

    #[tokio::test]
    async fn test_reads_run_concurrently() {
        let server = seeded().await;
        let count = Term::db("test").table("kv").count();
        let (a, b) = tokio::join!(server.execute(&count), server.stream(&count));
        assert_eq!(a.unwrap(), Datum::from(0.0));
        assert_eq!(b.unwrap(), vec![Datum::from(0.0)]);
    }

    #[tokio::test]
    async fn test_connector_personality() {
        let server = seeded().await;
        let driver = MemoryDriver::connecting(server.clone());
        assert!(driver.pool_factory().is_none());

        let connector = driver.connector().unwrap();
        let conn = connector.connect(&options()).await.unwrap();
        assert_eq!(server.open_links(), 1);

        let tables = conn.run(&Term::db("test").table_list()).await.unwrap();
        assert_eq!(tables, Datum::Array(vec![Datum::from("kv")]));

        conn.close().await.unwrap();
        assert_eq!(server.open_links(), 0);
        let err = conn.run(&Term::db_list()).await.unwrap_err();
        assert_eq!(err.to_string(), "Connection is closed.");
    }

    #[tokio::test]
    async fn test_pool_personality_drains() {
        let server = seeded().await;
        let driver = MemoryDriver::pooled(server.clone());
        assert!(driver.connector().is_none());

        let pool = driver.pool_factory().unwrap().pool(&options()).unwrap();
        assert_eq!(server.open_links(), 1);
        pool.drain();
        pool.drain();
        assert_eq!(server.open_links(), 0);
        assert!(pool.run(&Term::db_list()).await.is_err());
    }

    #[tokio::test]
    async fn test_credentials_are_checked() {
        let server = seeded().await.with_credentials("admin", "secret");
        let driver = MemoryDriver::connecting(server);
        let connector = driver.connector().unwrap();
        assert!(connector.connect(&options()).await.is_err());

        let mut good = options();
        good.password = Some("secret".into());
        assert!(connector.connect(&good).await.is_ok());
    }

    #[tokio::test]
    async fn test_cursor_reports_no_more_rows() {
        let mut cursor = MemoryCursor::new(vec![Datum::from("only")]);
        assert_eq!(cursor.next().await.unwrap(), Datum::from("only"));
        let err = cursor.next().await.unwrap_err();
        assert_eq!(err.to_string(), NO_MORE_ROWS);
    }

    #[tokio::test]
    async fn test_closed_cursor_yields_nothing() {
        let mut cursor = MemoryCursor::new(vec![Datum::from("a"), Datum::from("b")]);
        cursor.close().await.unwrap();
        assert!(cursor.next().await.is_err());
    }
}
