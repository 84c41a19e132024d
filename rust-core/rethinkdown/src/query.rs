// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Query translator.
//
// Maps key/value operations onto document queries against one table. Keys
// live in the `key` field (the table's primary key) and values in `value`.
// Every write plucks `errors` and `first_error` from the store's summary so
// the caller sees the first failure, if any.

use std::collections::BTreeSet;

use reql_driver::{Conflict, Datum, DeleteOptions, InsertOptions, Term, WriteSummary};

use crate::codec::Slice;
use crate::error::{Error, Result};
use crate::options::WriteOptions;
use crate::{KEY, VALUE};

const PUT: &str = "put";
const DEL: &str = "del";

/// A validated batch entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: Slice, value: Slice },
    Del { key: Slice },
}

impl WriteOp {
    fn to_datum(&self) -> Datum {
        match self {
            WriteOp::Put { key, value } => Datum::object([
                ("type", Datum::from(PUT)),
                (KEY, key.to_datum()),
                (VALUE, value.to_datum()),
            ]),
            WriteOp::Del { key } => {
                Datum::object([("type", Datum::from(DEL)), (KEY, key.to_datum())])
            }
        }
    }
}

/// Builds the queries for one `db.table`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translator {
    db: String,
    table: String,
}

impl Translator {
    pub fn new(db: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            db: db.into(),
            table: table.into(),
        }
    }

    pub fn table(&self) -> Term {
        Term::db(&self.db).table(&self.table)
    }

    fn not_found(key: &Slice) -> Term {
        Term::error(Error::NotFound(key.to_string()).to_string())
    }

    fn insert_options(options: WriteOptions) -> InsertOptions {
        InsertOptions {
            conflict: Conflict::Update,
            durability: options.durability(),
            return_changes: true,
        }
    }

    fn delete_options(options: WriteOptions) -> DeleteOptions {
        DeleteOptions {
            durability: options.durability(),
            return_changes: true,
        }
    }

    /// Fetch the value at `key`, failing with `NotFound` when absent.
    ///
    /// Null, empty-string and empty-array values read back as empty. The
    /// stored representation is returned unchanged; callers convert it with
    /// `codec::as_buffer`, as the iterator does.
    pub fn get(&self, key: &Slice) -> Term {
        let normalize = Term::func(|value| {
            let empty = Term::expr(Datum::Array(vec![Datum::Null, Datum::from("")]))
                .contains(value.clone())
                .or(value
                    .clone()
                    .type_of()
                    .eq("ARRAY")
                    .and(value.clone().count().eq(0usize)));
            Term::branch(empty, Term::expr(""), value)
        });

        self.table()
            .get(key.to_datum())
            .default(Datum::Null)
            .apply(Term::func(|row| {
                Term::branch(
                    row.clone().eq(Datum::Null),
                    Self::not_found(key),
                    row.field(VALUE).default(Datum::Null).apply(normalize),
                )
            }))
    }

    /// Upsert `key` = `value`.
    pub fn put(&self, key: &Slice, value: &Slice, options: WriteOptions) -> Term {
        let document = Term::object([
            (KEY, Term::from(key.to_datum())),
            (VALUE, Term::from(value.to_datum())),
        ]);
        self.table()
            .insert(document, Self::insert_options(options))
            .pluck(&["errors", "first_error"])
    }

    /// Delete `key`, failing with `NotFound` when absent.
    pub fn del(&self, key: &Slice, options: WriteOptions) -> Term {
        Term::branch(
            self.table().get(key.to_datum()).eq(Datum::Null),
            Self::not_found(key),
            self.table()
                .get(key.to_datum())
                .delete(Self::delete_options(options)),
        )
        .pluck(&["errors", "first_error"])
    }

    /// Apply `ops` in one server-side iteration.
    ///
    /// Deletes of keys not put earlier in the same batch are checked for
    /// existence before any write is issued.
    pub fn batch(&self, ops: &[WriteOp], options: WriteOptions) -> Term {
        let insert_options = Self::insert_options(options);
        let delete_options = Self::delete_options(options);

        let apply = Term::expr(Datum::Array(ops.iter().map(WriteOp::to_datum).collect()))
            .for_each(Term::func(|op| {
                let missing = Term::error(
                    Term::expr("Key ")
                        .add(op.clone().field(KEY).coerce_to("STRING"))
                        .add(" not found"),
                );
                Term::branch(
                    op.clone().field("type").eq(PUT),
                    self.table().insert(
                        Term::object([
                            (KEY, op.clone().field(KEY)),
                            (VALUE, op.clone().field(VALUE)),
                        ]),
                        insert_options,
                    ),
                    Term::branch(
                        self.table().get(op.clone().field(KEY)).eq(Datum::Null),
                        missing,
                        self.table().get(op.field(KEY)).delete(delete_options),
                    ),
                )
            }));

        let mut written = BTreeSet::new();
        let mut unchecked = Vec::new();
        for op in ops {
            match op {
                WriteOp::Put { key, .. } => {
                    written.insert(key);
                }
                WriteOp::Del { key } => {
                    if !written.contains(key) && !unchecked.contains(&key) {
                        unchecked.push(key);
                    }
                }
            }
        }

        unchecked
            .into_iter()
            .rev()
            .fold(apply, |body, key| {
                Term::branch(
                    self.table().get(key.to_datum()).eq(Datum::Null),
                    Self::not_found(key),
                    body,
                )
            })
            .pluck(&["errors", "first_error"])
    }

    /// Count records whose key lies in `[start, end]`.
    pub fn count_between(&self, start: &Slice, end: &Slice) -> Term {
        self.table()
            .filter(Term::func(|row| {
                row.clone()
                    .field(KEY)
                    .ge(start.to_datum())
                    .and(row.field(KEY).le(end.to_datum()))
            }))
            .count()
    }

    pub fn drop_table(&self) -> Term {
        Term::db(&self.db).table_drop(&self.table)
    }
}

/// Surface the first error recorded in a write summary.
pub fn check_write(result: &Datum) -> Result<()> {
    let summary = WriteSummary::from_datum(result)?;
    match summary.failure() {
        Some(message) => Err(Error::classify(message)),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::as_buffer;
    use reql_driver::MemoryServer;

    fn text(s: &str) -> Slice {
        Slice::Text(s.into())
    }

    async fn seeded() -> (MemoryServer, Translator) {
        let server = MemoryServer::new();
        server.execute(&Term::db_create("test")).await.unwrap();
        server
            .execute(&Term::db("test").table_create("kv", KEY))
            .await
            .unwrap();
        (server, Translator::new("test", "kv"))
    }

    #[tokio::test]
    async fn test_put_then_get_both_representations() {
        let (server, q) = seeded().await;
        let result = server
            .execute(&q.put(&text("k"), &text("v"), WriteOptions::default()))
            .await
            .unwrap();
        check_write(&result).unwrap();

        let value = server.execute(&q.get(&text("k"))).await.unwrap();
        assert_eq!(as_buffer(value.clone(), true), Slice::Bytes(b"v".to_vec()));
        assert_eq!(as_buffer(value, false), text("v"));
    }

    #[tokio::test]
    async fn test_get_normalizes_empty_values() {
        let (server, q) = seeded().await;
        server
            .execute(&q.put(&text("k"), &text(""), WriteOptions::default()))
            .await
            .unwrap();
        let value = server.execute(&q.get(&text("k"))).await.unwrap();
        assert_eq!(value, Datum::from(""));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let (server, q) = seeded().await;
        let err = server.execute(&q.get(&text("nope"))).await.unwrap_err();
        assert_eq!(err.to_string(), "Key nope not found");
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (server, q) = seeded().await;
        for value in ["1", "2"] {
            let result = server
                .execute(&q.put(&text("k"), &text(value), WriteOptions { sync: true }))
                .await
                .unwrap();
            check_write(&result).unwrap();
        }
        let value = server.execute(&q.get(&text("k"))).await.unwrap();
        assert_eq!(value, Datum::from("2"));
    }

    #[tokio::test]
    async fn test_del_missing_and_present() {
        let (server, q) = seeded().await;
        let err = server
            .execute(&q.del(&text("k"), WriteOptions::default()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Key k not found");

        server
            .execute(&q.put(&text("k"), &text("v"), WriteOptions::default()))
            .await
            .unwrap();
        let result = server
            .execute(&q.del(&text("k"), WriteOptions::default()))
            .await
            .unwrap();
        check_write(&result).unwrap();
        assert_eq!(server.row_count("test", "kv").await, Some(0));
    }

    #[tokio::test]
    async fn test_batch_delete_of_earlier_put() {
        let (server, q) = seeded().await;
        let ops = vec![
            WriteOp::Put {
                key: text("a"),
                value: text("1"),
            },
            WriteOp::Del { key: text("a") },
            WriteOp::Put {
                key: text("b"),
                value: text("2"),
            },
        ];
        let result = server
            .execute(&q.batch(&ops, WriteOptions::default()))
            .await
            .unwrap();
        check_write(&result).unwrap();
        assert_eq!(server.row_count("test", "kv").await, Some(1));
    }

    #[tokio::test]
    async fn test_batch_missing_delete_writes_nothing() {
        let (server, q) = seeded().await;
        let ops = vec![
            WriteOp::Put {
                key: text("a"),
                value: text("1"),
            },
            WriteOp::Del { key: text("ghost") },
        ];
        let err = server
            .execute(&q.batch(&ops, WriteOptions::default()))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Key ghost not found");
        assert_eq!(server.row_count("test", "kv").await, Some(0));
    }

    #[tokio::test]
    async fn test_count_between() {
        let (server, q) = seeded().await;
        for key in ["a", "b", "c", "d"] {
            server
                .execute(&q.put(&text(key), &text(key), WriteOptions::default()))
                .await
                .unwrap();
        }
        let count = server
            .execute(&q.count_between(&text("b"), &text("c")))
            .await
            .unwrap();
        assert_eq!(count, Datum::from(2.0));
    }

    #[test]
    fn test_check_write_surfaces_first_error() {
        let summary = Datum::object([
            ("errors", Datum::from(1.0)),
            ("first_error", Datum::from("Key x not found")),
        ]);
        assert_eq!(check_write(&summary), Err(Error::NotFound("x".into())));
        assert_eq!(check_write(&Datum::object([("errors", Datum::from(0.0))])), Ok(()));
    }
}
