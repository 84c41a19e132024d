// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Schema bootstrap.
//
// Checks for the database and table, creates them or fails according to the
// open options, and verifies the table is keyed on `key`. The whole decision
// tree is one query evaluated by the store, so two adapters opening the same
// location concurrently cannot both observe "missing" and both create.

use reql_driver::Term;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::link::Link;
use crate::options::OpenOptions;
use crate::KEY;

/// Build the bootstrap query for `db.table`.
pub fn bootstrap_query(db: &str, table: &str, options: OpenOptions) -> Term {
    let create_table = || Term::db(db).table_create(table, KEY);

    let existing = Term::branch(
        Term::expr(options.error_if_exists),
        Term::error(Error::TableExists(table.to_string()).to_string()),
        Term::branch(
            Term::db(db)
                .table(table)
                .config()
                .field("primary_key")
                .eq(KEY),
            Term::expr(true),
            Term::error(
                Error::SchemaMismatch {
                    db: db.to_string(),
                    table: table.to_string(),
                }
                .to_string(),
            ),
        ),
    );

    let missing_table = Term::branch(
        Term::expr(options.create_if_missing),
        create_table(),
        Term::error(Error::TableMissing(table.to_string()).to_string()),
    );

    let missing_db = Term::branch(
        Term::expr(options.create_if_missing),
        Term::db_create(db).apply(Term::thunk(create_table())),
        Term::error(Error::DatabaseMissing(db.to_string()).to_string()),
    );

    Term::branch(
        Term::db_list().contains(db),
        Term::branch(Term::db(db).table_list().contains(table), existing, missing_table),
        missing_db,
    )
}

/// Run the bootstrap query over `link`.
pub async fn bootstrap(link: &Link, db: &str, table: &str, options: OpenOptions) -> Result<()> {
    debug!(db, table, ?options, "bootstrapping schema");
    link.run(&bootstrap_query(db, table, options))
        .await
        .map(|_| ())
        .map_err(|err| {
            warn!(db, table, error = %err, "schema bootstrap failed");
            err
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reql_driver::{ConnectOptions, MemoryDriver, MemoryServer};

    async fn link(server: &MemoryServer) -> Link {
        let options = ConnectOptions {
            host: "localhost".into(),
            port: 28015,
            db: "test".into(),
            user: None,
            password: None,
            timeout: None,
            silent: None,
        };
        Link::establish(&MemoryDriver::connecting(server.clone()), &options)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_creates_database_and_table() {
        let server = MemoryServer::new();
        let link = link(&server).await;
        bootstrap(&link, "app", "kv", OpenOptions::default())
            .await
            .unwrap();
        assert_eq!(server.databases().await, vec!["app".to_string()]);
        assert_eq!(server.tables("app").await, vec!["kv".to_string()]);
    }

    #[tokio::test]
    async fn test_creates_table_in_existing_database() {
        let server = MemoryServer::new();
        server.execute(&Term::db_create("app")).await.unwrap();
        let link = link(&server).await;
        bootstrap(&link, "app", "kv", OpenOptions::default())
            .await
            .unwrap();
        assert_eq!(server.tables("app").await, vec!["kv".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_without_create() {
        let server = MemoryServer::new();
        let link = link(&server).await;
        let no_create = OpenOptions {
            create_if_missing: false,
            ..Default::default()
        };
        let err = bootstrap(&link, "app", "kv", no_create).await.unwrap_err();
        assert_eq!(err, Error::DatabaseMissing("app".into()));

        server.execute(&Term::db_create("app")).await.unwrap();
        let err = bootstrap(&link, "app", "kv", no_create).await.unwrap_err();
        assert_eq!(err, Error::TableMissing("kv".into()));
        assert!(server.tables("app").await.is_empty());
    }

    #[tokio::test]
    async fn test_error_if_exists() {
        let server = MemoryServer::new();
        let link = link(&server).await;
        bootstrap(&link, "app", "kv", OpenOptions::default())
            .await
            .unwrap();
        let strict = OpenOptions {
            error_if_exists: true,
            ..Default::default()
        };
        let err = bootstrap(&link, "app", "kv", strict).await.unwrap_err();
        assert_eq!(err, Error::TableExists("kv".into()));
    }

    #[tokio::test]
    async fn test_wrong_primary_key() {
        let server = MemoryServer::new();
        server.execute(&Term::db_create("app")).await.unwrap();
        server
            .execute(&Term::db("app").table_create("kv", "id"))
            .await
            .unwrap();
        let link = link(&server).await;
        let err = bootstrap(&link, "app", "kv", OpenOptions::default())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::SchemaMismatch {
                db: "app".into(),
                table: "kv".into()
            }
        );
    }
}
