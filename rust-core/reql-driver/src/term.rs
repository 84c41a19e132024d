// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Query-builder term tree.
//
// Terms are built with chained methods (`Term::db("test").table("kv")
// .get("k")`) and evaluated server-side. Each term encodes to the store's
// JSON wire form `[term_type, [args...], {optargs}]`, which drivers send as
// the body of a START query and which the adapter logs at trace level.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::datum::Datum;

static NEXT_VAR: AtomicU64 = AtomicU64::new(1);

/// Wire codes of the terms this crate knows how to build and evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TermType {
    MakeArray = 2,
    Var = 10,
    Error = 12,
    Db = 14,
    Table = 15,
    Get = 16,
    Eq = 17,
    Ne = 18,
    Lt = 19,
    Le = 20,
    Gt = 21,
    Ge = 22,
    Not = 23,
    Add = 24,
    GetField = 31,
    Pluck = 33,
    Filter = 39,
    OrderBy = 41,
    Count = 43,
    CoerceTo = 51,
    TypeOf = 52,
    Delete = 54,
    Insert = 56,
    DbCreate = 57,
    DbList = 59,
    TableCreate = 60,
    TableDrop = 61,
    TableList = 62,
    Funcall = 64,
    Branch = 65,
    Or = 66,
    And = 67,
    ForEach = 68,
    Func = 69,
    Limit = 71,
    Asc = 73,
    Desc = 74,
    Default = 92,
    Contains = 93,
    Config = 174,
}

impl TermType {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Write durability: `hard` acknowledges after the write is on disk,
/// `soft` acknowledges once it is in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Durability {
    Hard,
    #[default]
    Soft,
}

impl Durability {
    pub fn as_str(self) -> &'static str {
        match self {
            Durability::Hard => "hard",
            Durability::Soft => "soft",
        }
    }
}

/// What an insert does when the primary key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conflict {
    #[default]
    Error,
    Update,
    Replace,
}

impl Conflict {
    pub fn as_str(self) -> &'static str {
        match self {
            Conflict::Error => "error",
            Conflict::Update => "update",
            Conflict::Replace => "replace",
        }
    }
}

/// Optional arguments of an `insert` term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertOptions {
    pub conflict: Conflict,
    pub durability: Durability,
    pub return_changes: bool,
}

/// Optional arguments of a `delete` term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub durability: Durability,
    pub return_changes: bool,
}

/// Sort direction on a named field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Order {
    Asc(String),
    Desc(String),
}

/// A node of the query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Datum(Datum),
    MakeArray(Vec<Term>),
    MakeObject(BTreeMap<String, Term>),
    Var(u64),
    Func {
        params: Vec<u64>,
        body: Box<Term>,
    },
    Op {
        kind: TermType,
        args: Vec<Term>,
        optargs: BTreeMap<String, Term>,
    },
}

impl Term {
    fn op(kind: TermType, args: Vec<Term>) -> Self {
        Term::Op {
            kind,
            args,
            optargs: BTreeMap::new(),
        }
    }

    fn op_with(kind: TermType, args: Vec<Term>, optargs: BTreeMap<String, Term>) -> Self {
        Term::Op {
            kind,
            args,
            optargs,
        }
    }

    // ------------------------------------------------------------------
    // Roots
    // ------------------------------------------------------------------

    /// Wrap a literal value.
    pub fn expr(value: impl Into<Datum>) -> Self {
        Term::Datum(value.into())
    }

    /// Build an array from terms that may need evaluation.
    pub fn array(items: Vec<Term>) -> Self {
        Term::MakeArray(items)
    }

    /// Build an object from `(field, term)` pairs.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Term)>,
    {
        Term::MakeObject(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn db(name: &str) -> Self {
        Term::op(TermType::Db, vec![name.into()])
    }

    pub fn db_list() -> Self {
        Term::op(TermType::DbList, vec![])
    }

    pub fn db_create(name: &str) -> Self {
        Term::op(TermType::DbCreate, vec![name.into()])
    }

    /// Abort the query with `message`.
    pub fn error(message: impl Into<Term>) -> Self {
        Term::op(TermType::Error, vec![message.into()])
    }

    /// Server-side conditional: `then` if `test` is truthy, else `otherwise`.
    pub fn branch(test: Term, then: Term, otherwise: Term) -> Self {
        Term::op(TermType::Branch, vec![test, then, otherwise])
    }

    /// Build a one-argument function.
    pub fn func(body: impl FnOnce(Term) -> Term) -> Self {
        let id = NEXT_VAR.fetch_add(1, Ordering::Relaxed);
        Term::Func {
            params: vec![id],
            body: Box::new(body(Term::Var(id))),
        }
    }

    /// Build a zero-argument function.
    pub fn thunk(body: Term) -> Self {
        Term::Func {
            params: vec![],
            body: Box::new(body),
        }
    }

    // ------------------------------------------------------------------
    // Schema
    // ------------------------------------------------------------------

    pub fn table(self, name: &str) -> Self {
        Term::op(TermType::Table, vec![self, name.into()])
    }

    pub fn table_list(self) -> Self {
        Term::op(TermType::TableList, vec![self])
    }

    pub fn table_create(self, name: &str, primary_key: &str) -> Self {
        let mut optargs = BTreeMap::new();
        optargs.insert("primary_key".to_string(), primary_key.into());
        Term::op_with(TermType::TableCreate, vec![self, name.into()], optargs)
    }

    pub fn table_drop(self, name: &str) -> Self {
        Term::op(TermType::TableDrop, vec![self, name.into()])
    }

    pub fn config(self) -> Self {
        Term::op(TermType::Config, vec![self])
    }

    // ------------------------------------------------------------------
    // Access and comparison
    // ------------------------------------------------------------------

    pub fn get(self, key: impl Into<Term>) -> Self {
        Term::op(TermType::Get, vec![self, key.into()])
    }

    /// `term(field)`: read a field of an object.
    pub fn field(self, name: &str) -> Self {
        Term::op(TermType::GetField, vec![self, name.into()])
    }

    pub fn default(self, fallback: impl Into<Term>) -> Self {
        Term::op(TermType::Default, vec![self, fallback.into()])
    }

    pub fn eq(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::Eq, vec![self, other.into()])
    }

    pub fn ne(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::Ne, vec![self, other.into()])
    }

    pub fn lt(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::Lt, vec![self, other.into()])
    }

    pub fn le(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::Le, vec![self, other.into()])
    }

    pub fn gt(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::Gt, vec![self, other.into()])
    }

    pub fn ge(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::Ge, vec![self, other.into()])
    }

    pub fn and(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::And, vec![self, other.into()])
    }

    pub fn or(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::Or, vec![self, other.into()])
    }

    pub fn not(self) -> Self {
        Term::op(TermType::Not, vec![self])
    }

    pub fn add(self, other: impl Into<Term>) -> Self {
        Term::op(TermType::Add, vec![self, other.into()])
    }

    pub fn contains(self, value: impl Into<Term>) -> Self {
        Term::op(TermType::Contains, vec![self, value.into()])
    }

    pub fn coerce_to(self, type_name: &str) -> Self {
        Term::op(TermType::CoerceTo, vec![self, type_name.into()])
    }

    pub fn type_of(self) -> Self {
        Term::op(TermType::TypeOf, vec![self])
    }

    /// `term.do(func)`: call `func` with this term as its argument.
    pub fn apply(self, func: Term) -> Self {
        Term::op(TermType::Funcall, vec![func, self])
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    pub fn insert(self, document: impl Into<Term>, options: InsertOptions) -> Self {
        let mut optargs = BTreeMap::new();
        optargs.insert("conflict".to_string(), options.conflict.as_str().into());
        optargs.insert("durability".to_string(), options.durability.as_str().into());
        optargs.insert("return_changes".to_string(), options.return_changes.into());
        Term::op_with(TermType::Insert, vec![self, document.into()], optargs)
    }

    pub fn delete(self, options: DeleteOptions) -> Self {
        let mut optargs = BTreeMap::new();
        optargs.insert("durability".to_string(), options.durability.as_str().into());
        optargs.insert("return_changes".to_string(), options.return_changes.into());
        Term::op_with(TermType::Delete, vec![self], optargs)
    }

    // ------------------------------------------------------------------
    // Sequences
    // ------------------------------------------------------------------

    pub fn filter(self, predicate: Term) -> Self {
        Term::op(TermType::Filter, vec![self, predicate])
    }

    pub fn order_by(self, order: Order) -> Self {
        let ordering = match order {
            Order::Asc(field) => Term::op(TermType::Asc, vec![field.into()]),
            Order::Desc(field) => Term::op(TermType::Desc, vec![field.into()]),
        };
        Term::op(TermType::OrderBy, vec![self, ordering])
    }

    pub fn limit(self, n: usize) -> Self {
        Term::op(TermType::Limit, vec![self, n.into()])
    }

    pub fn count(self) -> Self {
        Term::op(TermType::Count, vec![self])
    }

    pub fn for_each(self, func: Term) -> Self {
        Term::op(TermType::ForEach, vec![self, func])
    }

    pub fn pluck(self, fields: &[&str]) -> Self {
        let mut args = vec![self];
        args.extend(fields.iter().map(|f| Term::from(*f)));
        Term::op(TermType::Pluck, args)
    }

    // ------------------------------------------------------------------
    // Wire encoding
    // ------------------------------------------------------------------

    /// Encode this term in the store's JSON wire form.
    pub fn to_wire(&self) -> Value {
        match self {
            Term::Datum(datum) => datum_wire(datum),
            Term::MakeArray(items) => json!([
                TermType::MakeArray.code(),
                items.iter().map(Term::to_wire).collect::<Vec<_>>()
            ]),
            Term::MakeObject(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_wire()))
                    .collect::<Map<_, _>>(),
            ),
            Term::Var(id) => json!([TermType::Var.code(), [id]]),
            Term::Func { params, body } => json!([
                TermType::Func.code(),
                [[TermType::MakeArray.code(), params], body.to_wire()]
            ]),
            Term::Op {
                kind,
                args,
                optargs,
            } => {
                let args: Vec<Value> = args.iter().map(Term::to_wire).collect();
                if optargs.is_empty() {
                    json!([kind.code(), args])
                } else {
                    let optargs: Map<String, Value> = optargs
                        .iter()
                        .map(|(k, v)| (k.clone(), v.to_wire()))
                        .collect();
                    json!([kind.code(), args, optargs])
                }
            }
        }
    }

    /// Whether evaluating this term can change databases, tables or rows.
    pub fn writes(&self) -> bool {
        match self {
            Term::Datum(_) | Term::Var(_) => false,
            Term::MakeArray(items) => items.iter().any(Term::writes),
            Term::MakeObject(fields) => fields.values().any(Term::writes),
            Term::Func { body, .. } => body.writes(),
            Term::Op {
                kind,
                args,
                optargs,
            } => {
                matches!(
                    kind,
                    TermType::Insert
                        | TermType::Delete
                        | TermType::DbCreate
                        | TermType::TableCreate
                        | TermType::TableDrop
                ) || args.iter().any(Term::writes)
                    || optargs.values().any(Term::writes)
            }
        }
    }

    /// Wrap this term in a START query envelope.
    pub fn to_query(&self) -> Value {
        json!([1, self.to_wire(), {}])
    }
}

// Literal arrays nested inside a term must be spelled as MAKE_ARRAY so the
// server does not mistake them for terms.
fn datum_wire(datum: &Datum) -> Value {
    match datum {
        Datum::Array(items) => json!([
            TermType::MakeArray.code(),
            items.iter().map(datum_wire).collect::<Vec<_>>()
        ]),
        Datum::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), datum_wire(v)))
                .collect::<Map<_, _>>(),
        ),
        other => other.to_json(),
    }
}

impl From<Datum> for Term {
    fn from(value: Datum) -> Self {
        Term::Datum(value)
    }
}

impl From<&str> for Term {
    fn from(value: &str) -> Self {
        Term::Datum(value.into())
    }
}

impl From<String> for Term {
    fn from(value: String) -> Self {
        Term::Datum(value.into())
    }
}

impl From<bool> for Term {
    fn from(value: bool) -> Self {
        Term::Datum(value.into())
    }
}

impl From<usize> for Term {
    fn from(value: usize) -> Self {
        Term::Datum(value.into())
    }
}

impl From<Vec<Term>> for Term {
    fn from(value: Vec<Term>) -> Self {
        Term::MakeArray(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_wire_form() {
        let term = Term::db("test").table("kv").get("k");
        assert_eq!(
            term.to_wire(),
            json!([16, [[15, [[14, ["test"]], "kv"]], "k"]])
        );
    }

    #[test]
    fn test_insert_optargs() {
        let term = Term::db("test").table("kv").insert(
            Term::object([("key", Term::from("k")), ("value", Term::from("v"))]),
            InsertOptions {
                conflict: Conflict::Update,
                durability: Durability::Hard,
                return_changes: true,
            },
        );
        let wire = term.to_wire();
        assert_eq!(wire[0], json!(56));
        assert_eq!(wire[1][1], json!({ "key": "k", "value": "v" }));
        assert_eq!(
            wire[2],
            json!({ "conflict": "update", "durability": "hard", "return_changes": true })
        );
    }

    #[test]
    fn test_literal_arrays_use_make_array() {
        let term = Term::expr(Datum::Array(vec![Datum::Null, "".into()])).contains("x");
        assert_eq!(term.to_wire(), json!([93, [[2, [null, ""]], "x"]]));
    }

    #[test]
    fn test_func_wire_form() {
        let term = Term::func(|row| row.field("key"));
        let wire = term.to_wire();
        assert_eq!(wire[0], json!(69));
        let id = wire[1][0][1][0].clone();
        assert_eq!(wire[1][1], json!([31, [[10, [id]], "key"]]));
    }

    #[test]
    fn test_limit_keeps_sequence_first() {
        let term = Term::db("test").table("kv").limit(2);
        let wire = term.to_wire();
        assert_eq!(wire[0], json!(71));
        assert_eq!(wire[1][1], json!(2));
    }

    #[test]
    fn test_order_by_desc() {
        let term = Term::db("test")
            .table("kv")
            .order_by(Order::Desc("key".into()));
        assert_eq!(term.to_wire()[1][1], json!([74, ["key"]]));
    }

    #[test]
    fn test_query_envelope() {
        let term = Term::db_list();
        assert_eq!(term.to_query(), json!([1, [59, []], {}]));
    }

    #[test]
    fn test_binary_literal_wire_form() {
        let term = Term::expr(b"hi".to_vec());
        assert_eq!(
            term.to_wire(),
            json!({ "$reql_type$": "BINARY", "data": "aGk=" })
        );
    }

    #[test]
    fn test_writes_detects_nested_mutations() {
        let kv = || Term::db("test").table("kv");
        assert!(!kv().get("k").field("value").writes());
        assert!(!kv().filter(Term::func(|row| row.field("key").gt("a"))).writes());
        assert!(Term::db_create("test").writes());
        assert!(kv().get("k").delete(Default::default()).writes());
        let nested = Term::branch(
            Term::expr(true),
            Term::expr(1.0),
            Term::expr(Datum::Array(vec![])).for_each(Term::func(|key| {
                kv().insert(Term::object([("key", key)]), InsertOptions::default())
            })),
        );
        assert!(nested.writes());
    }
}
