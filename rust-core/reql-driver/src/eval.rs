// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Term evaluator for the in-process reference server.
//
// Evaluates the subset of the query language described by `TermType`
// against a `Catalog` of databases and tables. Writes go straight to the
// catalog and are journaled; a query that fails replays the journal
// backwards, so the catalog is left exactly as the query found it.

use std::collections::{BTreeMap, HashMap};

use crate::datum::Datum;
use crate::error::DriverError;
use crate::response::WriteSummary;
use crate::term::{Term, TermType};

const DEFAULT_PRIMARY_KEY: &str = "id";

/// Every database known to a server.
#[derive(Debug, Clone, Default)]
pub(crate) struct Catalog {
    pub dbs: BTreeMap<String, Database>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Database {
    pub tables: BTreeMap<String, Table>,
}

/// Documents ordered by their primary key.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub primary_key: String,
    pub rows: BTreeMap<Datum, Datum>,
}

/// Intermediate results. Selections remember the table they came from so
/// that writes can be applied to them.
#[derive(Debug)]
enum Value {
    Datum(Datum),
    Db(String),
    Table {
        db: String,
        name: String,
    },
    Row {
        db: String,
        table: String,
        key: Datum,
        row: Option<Datum>,
    },
    Selection {
        db: String,
        table: String,
        rows: Vec<Datum>,
    },
    Stream(Vec<Datum>),
}

#[derive(Debug)]
enum Fault {
    /// Missing field or null input; recoverable with `default`.
    NonExistence(String),
    Runtime(String),
}

impl From<Fault> for DriverError {
    fn from(fault: Fault) -> Self {
        match fault {
            Fault::NonExistence(msg) | Fault::Runtime(msg) => DriverError::query(msg),
        }
    }
}

type Eval<T> = Result<T, Fault>;

fn runtime<T>(msg: impl Into<String>) -> Eval<T> {
    Err(Fault::Runtime(msg.into()))
}

enum Access<'a> {
    Shared(&'a Catalog),
    Exclusive(&'a mut Catalog),
}

/// How to reverse one applied write.
#[derive(Debug)]
enum Undo {
    CreateDb(String),
    CreateTable {
        db: String,
        name: String,
    },
    DropTable {
        db: String,
        name: String,
        table: Table,
    },
    Row {
        db: String,
        table: String,
        key: Datum,
        previous: Option<Datum>,
    },
}

pub(crate) struct Evaluator<'a> {
    access: Access<'a>,
    scope: HashMap<u64, Datum>,
    journal: Vec<Undo>,
}

impl<'a> Evaluator<'a> {
    /// An evaluator that may write to `catalog`.
    pub fn new(catalog: &'a mut Catalog) -> Self {
        Self {
            access: Access::Exclusive(catalog),
            scope: HashMap::new(),
            journal: Vec::new(),
        }
    }

    /// An evaluator for queries that only read. Any write fails.
    pub fn read_only(catalog: &'a Catalog) -> Self {
        Self {
            access: Access::Shared(catalog),
            scope: HashMap::new(),
            journal: Vec::new(),
        }
    }

    /// Evaluate `term` to a single datum; sequences become arrays.
    pub fn run(&mut self, term: &Term) -> Result<Datum, DriverError> {
        let result = self.eval(term).and_then(|value| self.datum(value));
        self.settle(result)
    }

    /// Evaluate `term` to the rows a cursor should stream.
    pub fn rows(&mut self, term: &Term) -> Result<Vec<Datum>, DriverError> {
        let result = self.eval(term).and_then(|value| match value {
            Value::Datum(Datum::Array(items)) => Ok(items),
            Value::Datum(other) => Ok(vec![other]),
            other => self.sequence(other),
        });
        self.settle(result)
    }

    fn settle<T>(&mut self, result: Eval<T>) -> Result<T, DriverError> {
        match result {
            Ok(value) => {
                self.journal.clear();
                Ok(value)
            }
            Err(fault) => {
                self.rollback();
                Err(fault.into())
            }
        }
    }

    /// Undo every write made since the last settled query, newest first.
    fn rollback(&mut self) {
        let journal = std::mem::take(&mut self.journal);
        let Access::Exclusive(catalog) = &mut self.access else {
            return;
        };
        for undo in journal.into_iter().rev() {
            match undo {
                Undo::CreateDb(name) => {
                    catalog.dbs.remove(&name);
                }
                Undo::CreateTable { db, name } => {
                    if let Some(database) = catalog.dbs.get_mut(&db) {
                        database.tables.remove(&name);
                    }
                }
                Undo::DropTable { db, name, table } => {
                    if let Some(database) = catalog.dbs.get_mut(&db) {
                        database.tables.insert(name, table);
                    }
                }
                Undo::Row {
                    db,
                    table,
                    key,
                    previous,
                } => {
                    let Some(table) = catalog
                        .dbs
                        .get_mut(&db)
                        .and_then(|database| database.tables.get_mut(&table))
                    else {
                        continue;
                    };
                    match previous {
                        Some(row) => {
                            table.rows.insert(key, row);
                        }
                        None => {
                            table.rows.remove(&key);
                        }
                    }
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Coercions between intermediate values
    // ------------------------------------------------------------------

    fn datum(&self, value: Value) -> Eval<Datum> {
        match value {
            Value::Datum(d) => Ok(d),
            Value::Row { row, .. } => Ok(row.unwrap_or(Datum::Null)),
            Value::Db(_) => runtime("Expected type DATUM but found DATABASE."),
            other => Ok(Datum::Array(self.sequence(other)?)),
        }
    }

    fn sequence(&self, value: Value) -> Eval<Vec<Datum>> {
        match value {
            Value::Table { db, name } => Ok(self.table(&db, &name)?.rows.values().cloned().collect()),
            Value::Selection { rows, .. } | Value::Stream(rows) => Ok(rows),
            Value::Datum(Datum::Array(items)) => Ok(items),
            Value::Datum(other) => runtime(format!(
                "Cannot convert {} to SEQUENCE",
                other.type_name()
            )),
            Value::Row { .. } => runtime("Cannot convert SELECTION<OBJECT> to SEQUENCE"),
            Value::Db(_) => runtime("Cannot convert DATABASE to SEQUENCE"),
        }
    }

    fn eval_datum(&mut self, term: &Term) -> Eval<Datum> {
        let value = self.eval(term)?;
        self.datum(value)
    }

    fn eval_string(&mut self, term: &Term) -> Eval<String> {
        match self.eval_datum(term)? {
            Datum::String(s) => Ok(s),
            other => runtime(format!("Expected type STRING but found {}.", other.type_name())),
        }
    }

    fn eval_db(&mut self, term: &Term) -> Eval<String> {
        match self.eval(term)? {
            Value::Db(name) => Ok(name),
            _ => runtime("Expected type DATABASE."),
        }
    }

    fn eval_table(&mut self, term: &Term) -> Eval<(String, String)> {
        match self.eval(term)? {
            Value::Table { db, name } => Ok((db, name)),
            _ => runtime("Expected type TABLE."),
        }
    }

    // ------------------------------------------------------------------
    // Catalog access
    // ------------------------------------------------------------------

    fn catalog(&self) -> &Catalog {
        match &self.access {
            Access::Shared(catalog) => catalog,
            Access::Exclusive(catalog) => catalog,
        }
    }

    fn catalog_mut(&mut self) -> Eval<&mut Catalog> {
        match &mut self.access {
            Access::Exclusive(catalog) => Ok(&mut **catalog),
            Access::Shared(_) => runtime("Cannot write in a read-only query."),
        }
    }

    fn database(&self, db: &str) -> Eval<&Database> {
        match self.catalog().dbs.get(db) {
            Some(database) => Ok(database),
            None => runtime(format!("Database `{db}` does not exist.")),
        }
    }

    fn table(&self, db: &str, name: &str) -> Eval<&Table> {
        match self.database(db)?.tables.get(name) {
            Some(table) => Ok(table),
            None => runtime(format!("Table `{db}.{name}` does not exist.")),
        }
    }

    fn table_mut(&mut self, db: &str, name: &str) -> Eval<&mut Table> {
        let Some(database) = self.catalog_mut()?.dbs.get_mut(db) else {
            return runtime(format!("Database `{db}` does not exist."));
        };
        match database.tables.get_mut(name) {
            Some(table) => Ok(table),
            None => runtime(format!("Table `{db}.{name}` does not exist.")),
        }
    }

    // ------------------------------------------------------------------
    // Evaluation
    // ------------------------------------------------------------------

    fn eval(&mut self, term: &Term) -> Eval<Value> {
        match term {
            Term::Datum(d) => Ok(Value::Datum(d.clone())),
            Term::MakeArray(items) => {
                let items = items
                    .iter()
                    .map(|item| self.eval_datum(item))
                    .collect::<Eval<Vec<_>>>()?;
                Ok(Value::Datum(Datum::Array(items)))
            }
            Term::MakeObject(fields) => {
                let mut map = BTreeMap::new();
                for (name, value) in fields {
                    map.insert(name.clone(), self.eval_datum(value)?);
                }
                Ok(Value::Datum(Datum::Object(map)))
            }
            Term::Var(id) => match self.scope.get(id) {
                Some(d) => Ok(Value::Datum(d.clone())),
                None => runtime(format!("Variable `{id}` is not in scope.")),
            },
            Term::Func { .. } => runtime("Cannot evaluate a function outside of a call."),
            Term::Op {
                kind,
                args,
                optargs,
            } => self.eval_op(*kind, args, optargs),
        }
    }

    /// Call `func` with `args`. Non-function terms are evaluated as constants.
    fn apply(&mut self, func: &Term, args: Vec<Datum>) -> Eval<Value> {
        let Term::Func { params, body } = func else {
            return self.eval(func);
        };
        if !params.is_empty() && params.len() != args.len() {
            return runtime(format!(
                "Expected function with {} arguments but found function with {} argument.",
                args.len(),
                params.len()
            ));
        }
        let mut saved = Vec::with_capacity(params.len());
        for (id, arg) in params.iter().zip(args) {
            saved.push((*id, self.scope.insert(*id, arg)));
        }
        let result = self.eval(body);
        for (id, previous) in saved {
            match previous {
                Some(d) => self.scope.insert(id, d),
                None => self.scope.remove(&id),
            };
        }
        result
    }

    fn eval_op(
        &mut self,
        kind: TermType,
        args: &[Term],
        optargs: &BTreeMap<String, Term>,
    ) -> Eval<Value> {
        let expected = match kind {
            TermType::DbList => 0,
            TermType::Db
            | TermType::DbCreate
            | TermType::Error
            | TermType::TableList
            | TermType::Config
            | TermType::Not
            | TermType::TypeOf
            | TermType::Count
            | TermType::Delete
            | TermType::Asc
            | TermType::Desc => 1,
            TermType::Branch => 3,
            TermType::And | TermType::Or | TermType::Pluck | TermType::Funcall => 1,
            _ => 2,
        };
        if args.len() < expected {
            return runtime(format!(
                "Expected {expected} arguments but found {}.",
                args.len()
            ));
        }

        match kind {
            TermType::Db => Ok(Value::Db(self.eval_string(&args[0])?)),
            TermType::DbList => Ok(Value::Datum(Datum::Array(
                self.catalog().dbs.keys().map(|k| Datum::from(k.as_str())).collect(),
            ))),
            TermType::DbCreate => {
                let name = self.eval_string(&args[0])?;
                let catalog = self.catalog_mut()?;
                if catalog.dbs.contains_key(&name) {
                    return runtime(format!("Database `{name}` already exists."));
                }
                catalog.dbs.insert(name.clone(), Database::default());
                self.journal.push(Undo::CreateDb(name));
                Ok(Value::Datum(Datum::object([("dbs_created", Datum::from(1.0))])))
            }
            TermType::Table => {
                let db = self.eval_db(&args[0])?;
                let name = self.eval_string(&args[1])?;
                self.table(&db, &name)?;
                Ok(Value::Table { db, name })
            }
            TermType::TableList => {
                let db = self.eval_db(&args[0])?;
                let names = self
                    .database(&db)?
                    .tables
                    .keys()
                    .map(|k| Datum::from(k.as_str()))
                    .collect();
                Ok(Value::Datum(Datum::Array(names)))
            }
            TermType::TableCreate => {
                let db = self.eval_db(&args[0])?;
                let name = self.eval_string(&args[1])?;
                let primary_key = match optargs.get("primary_key") {
                    Some(term) => self.eval_string(term)?,
                    None => DEFAULT_PRIMARY_KEY.to_string(),
                };
                let Some(database) = self.catalog_mut()?.dbs.get_mut(&db) else {
                    return runtime(format!("Database `{db}` does not exist."));
                };
                if database.tables.contains_key(&name) {
                    return runtime(format!("Table `{db}.{name}` already exists."));
                }
                database.tables.insert(
                    name.clone(),
                    Table {
                        primary_key,
                        rows: BTreeMap::new(),
                    },
                );
                self.journal.push(Undo::CreateTable { db, name });
                Ok(Value::Datum(Datum::object([("tables_created", Datum::from(1.0))])))
            }
            TermType::TableDrop => {
                let db = self.eval_db(&args[0])?;
                let name = self.eval_string(&args[1])?;
                let Some(database) = self.catalog_mut()?.dbs.get_mut(&db) else {
                    return runtime(format!("Database `{db}` does not exist."));
                };
                let Some(table) = database.tables.remove(&name) else {
                    return runtime(format!("Table `{db}.{name}` does not exist."));
                };
                self.journal.push(Undo::DropTable { db, name, table });
                Ok(Value::Datum(Datum::object([("tables_dropped", Datum::from(1.0))])))
            }
            TermType::Config => {
                let (db, name) = self.eval_table(&args[0])?;
                let primary_key = self.table(&db, &name)?.primary_key.clone();
                Ok(Value::Datum(Datum::object([
                    ("db", Datum::from(db)),
                    ("name", Datum::from(name)),
                    ("primary_key", Datum::from(primary_key)),
                ])))
            }
            TermType::Get => {
                let (db, table) = self.eval_table(&args[0])?;
                let key = self.eval_datum(&args[1])?;
                if key.is_null() {
                    return runtime("Primary keys must be non-null.");
                }
                let row = self.table(&db, &table)?.rows.get(&key).cloned();
                Ok(Value::Row {
                    db,
                    table,
                    key,
                    row,
                })
            }
            TermType::GetField => {
                let object = self.eval_datum(&args[0])?;
                let field = self.eval_string(&args[1])?;
                match object {
                    Datum::Object(mut map) => match map.remove(&field) {
                        Some(value) => Ok(Value::Datum(value)),
                        None => Err(Fault::NonExistence(format!(
                            "No attribute `{field}` in object."
                        ))),
                    },
                    Datum::Null => Err(Fault::NonExistence(
                        "Cannot perform get_field on a non-object non-sequence `null`.".into(),
                    )),
                    other => runtime(format!(
                        "Cannot perform get_field on a non-object non-sequence `{other}`."
                    )),
                }
            }
            TermType::Default => match self.eval(&args[0]) {
                Ok(value) => {
                    let datum = self.datum(value)?;
                    if datum.is_null() {
                        self.eval(&args[1])
                    } else {
                        Ok(Value::Datum(datum))
                    }
                }
                Err(Fault::NonExistence(_)) => self.eval(&args[1]),
                Err(fault) => Err(fault),
            },
            TermType::Eq
            | TermType::Ne
            | TermType::Lt
            | TermType::Le
            | TermType::Gt
            | TermType::Ge => {
                let left = self.eval_datum(&args[0])?;
                let right = self.eval_datum(&args[1])?;
                let result = match kind {
                    TermType::Eq => left == right,
                    TermType::Ne => left != right,
                    TermType::Lt => left < right,
                    TermType::Le => left <= right,
                    TermType::Gt => left > right,
                    _ => left >= right,
                };
                Ok(Value::Datum(Datum::Bool(result)))
            }
            TermType::Not => {
                let value = self.eval_datum(&args[0])?;
                Ok(Value::Datum(Datum::Bool(!value.is_truthy())))
            }
            TermType::And | TermType::Or => {
                let mut last = Datum::Bool(kind == TermType::And);
                for arg in args {
                    last = self.eval_datum(arg)?;
                    let stop = if kind == TermType::And {
                        !last.is_truthy()
                    } else {
                        last.is_truthy()
                    };
                    if stop {
                        break;
                    }
                }
                Ok(Value::Datum(last))
            }
            TermType::Add => {
                let left = self.eval_datum(&args[0])?;
                let right = self.eval_datum(&args[1])?;
                let sum = match (left, right) {
                    (Datum::Number(a), Datum::Number(b)) => Datum::Number(a + b),
                    (Datum::String(a), Datum::String(b)) => Datum::String(a + &b),
                    (Datum::Array(mut a), Datum::Array(b)) => {
                        a.extend(b);
                        Datum::Array(a)
                    }
                    (a, b) => {
                        return runtime(format!(
                            "Cannot add {} and {}.",
                            a.type_name(),
                            b.type_name()
                        ))
                    }
                };
                Ok(Value::Datum(sum))
            }
            TermType::Branch => {
                let test = self.eval_datum(&args[0])?;
                if test.is_truthy() {
                    self.eval(&args[1])
                } else {
                    self.eval(&args[2])
                }
            }
            TermType::Error => {
                let message = self.eval_string(&args[0])?;
                Err(Fault::Runtime(message))
            }
            TermType::Contains => {
                let value = self.eval(&args[0])?;
                let haystack = self.sequence(value)?;
                for needle in &args[1..] {
                    let needle = self.eval_datum(needle)?;
                    if !haystack.contains(&needle) {
                        return Ok(Value::Datum(Datum::Bool(false)));
                    }
                }
                Ok(Value::Datum(Datum::Bool(true)))
            }
            TermType::CoerceTo => {
                let value = self.eval_datum(&args[0])?;
                let target = self.eval_string(&args[1])?.to_ascii_uppercase();
                Ok(Value::Datum(coerce(value, &target)?))
            }
            TermType::TypeOf => {
                let value = self.eval_datum(&args[0])?;
                Ok(Value::Datum(Datum::from(value.type_name())))
            }
            TermType::Funcall => {
                let mut call_args = Vec::with_capacity(args.len() - 1);
                for arg in &args[1..] {
                    call_args.push(self.eval_datum(arg)?);
                }
                self.apply(&args[0], call_args)
            }
            TermType::Insert => {
                let (db, table) = self.eval_table(&args[0])?;
                let documents = match self.eval_datum(&args[1])? {
                    Datum::Array(items) => items,
                    single => vec![single],
                };
                let conflict = match optargs.get("conflict") {
                    Some(term) => self.eval_string(term)?,
                    None => "error".to_string(),
                };
                let return_changes = match optargs.get("return_changes") {
                    Some(term) => self.eval_datum(term)?.is_truthy(),
                    None => false,
                };
                self.insert(&db, &table, documents, &conflict, return_changes)
                    .map(Value::Datum)
            }
            TermType::Delete => {
                let target = self.eval(&args[0])?;
                self.delete(target).map(Value::Datum)
            }
            TermType::Filter => {
                let source = self.eval(&args[0])?;
                let origin = origin(&source);
                let rows = self.sequence(source)?;
                let mut kept = Vec::new();
                for row in rows {
                    let verdict = self.apply(&args[1], vec![row.clone()])?;
                    if self.datum(verdict)?.is_truthy() {
                        kept.push(row);
                    }
                }
                Ok(with_origin(origin, kept))
            }
            TermType::OrderBy => {
                let source = self.eval(&args[0])?;
                let origin = origin(&source);
                let mut rows = self.sequence(source)?;
                let (field, descending) = match &args[1] {
                    Term::Op {
                        kind: TermType::Asc,
                        args,
                        ..
                    } => (self.eval_string(&args[0])?, false),
                    Term::Op {
                        kind: TermType::Desc,
                        args,
                        ..
                    } => (self.eval_string(&args[0])?, true),
                    other => (self.eval_string(other)?, false),
                };
                rows.sort_by(|a, b| {
                    let a = a.field(&field).unwrap_or(&Datum::Null);
                    let b = b.field(&field).unwrap_or(&Datum::Null);
                    if descending {
                        b.cmp(a)
                    } else {
                        a.cmp(b)
                    }
                });
                Ok(with_origin(origin, rows))
            }
            TermType::Limit => {
                let source = self.eval(&args[0])?;
                let origin = origin(&source);
                let mut rows = self.sequence(source)?;
                let n = match self.eval_datum(&args[1])?.as_f64() {
                    Some(n) if n >= 0.0 => n as usize,
                    _ => return runtime("LIMIT takes a non-negative argument."),
                };
                rows.truncate(n);
                Ok(with_origin(origin, rows))
            }
            TermType::Count => {
                let source = self.eval(&args[0])?;
                let count = self.sequence(source)?.len();
                Ok(Value::Datum(Datum::from(count)))
            }
            TermType::ForEach => {
                let source = self.eval(&args[0])?;
                let rows = self.sequence(source)?;
                let mut total = WriteSummary::default();
                for row in rows {
                    let result = self.apply(&args[1], vec![row])?;
                    let results = match self.datum(result)? {
                        Datum::Array(items) => items,
                        single => vec![single],
                    };
                    for result in results {
                        let summary = WriteSummary::from_datum(&result)
                            .map_err(|e| Fault::Runtime(e.to_string()))?;
                        total.merge(summary);
                    }
                }
                Ok(Value::Datum(total.to_datum()))
            }
            TermType::Pluck => {
                let value = self.eval_datum(&args[0])?;
                let mut fields = Vec::with_capacity(args.len() - 1);
                for arg in &args[1..] {
                    fields.push(self.eval_string(arg)?);
                }
                Ok(Value::Datum(pluck(value, &fields)?))
            }
            TermType::Asc | TermType::Desc => {
                runtime("ASC and DESC may only be used as an argument to ORDER_BY.")
            }
            TermType::MakeArray | TermType::Var | TermType::Func => {
                runtime(format!("Malformed term of type {}.", kind.code()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn insert(
        &mut self,
        db: &str,
        name: &str,
        documents: Vec<Datum>,
        conflict: &str,
        return_changes: bool,
    ) -> Eval<Datum> {
        let table = self.table_mut(db, name)?;
        let primary_key = table.primary_key.clone();
        let mut summary = WriteSummary::default();
        let mut changes = Vec::new();
        let mut undo = Vec::new();

        for document in documents {
            let Datum::Object(fields) = &document else {
                summary.errors += 1;
                summary.first_error.get_or_insert_with(|| {
                    format!("Expected type OBJECT but found {}.", document.type_name())
                });
                continue;
            };
            let key = match fields.get(&primary_key) {
                Some(key) if !key.is_null() => key.clone(),
                _ => {
                    summary.errors += 1;
                    summary
                        .first_error
                        .get_or_insert_with(|| format!("Primary key `{primary_key}` missing."));
                    continue;
                }
            };

            let old = table.rows.get(&key).cloned();
            let new = match (&old, conflict) {
                (None, _) => {
                    summary.inserted += 1;
                    document.clone()
                }
                (Some(existing), "update") => {
                    let mut merged = existing.as_object().cloned().unwrap_or_default();
                    merged.extend(fields.clone());
                    let merged = Datum::Object(merged);
                    if &merged == existing {
                        summary.unchanged += 1;
                    } else {
                        summary.replaced += 1;
                    }
                    merged
                }
                (Some(existing), "replace") => {
                    if &document == existing {
                        summary.unchanged += 1;
                    } else {
                        summary.replaced += 1;
                    }
                    document.clone()
                }
                (Some(existing), _) => {
                    summary.errors += 1;
                    summary.first_error.get_or_insert_with(|| {
                        format!(
                            "Duplicate primary key `{primary_key}`:\n{}\n{}",
                            existing.to_json(),
                            document.to_json()
                        )
                    });
                    continue;
                }
            };
            if return_changes {
                changes.push(Datum::object([
                    ("old_val", old.unwrap_or(Datum::Null)),
                    ("new_val", new.clone()),
                ]));
            }
            let previous = table.rows.insert(key.clone(), new);
            undo.push(Undo::Row {
                db: db.to_string(),
                table: name.to_string(),
                key,
                previous,
            });
        }

        self.journal.extend(undo);
        Ok(with_changes(summary, changes, return_changes))
    }

    fn delete(&mut self, target: Value) -> Eval<Datum> {
        let (db, table, keys) = match target {
            Value::Row { db, table, key, row } => {
                let keys = if row.is_some() { vec![key] } else { vec![] };
                (db, table, keys)
            }
            Value::Table { db, name } => {
                let keys = self.table(&db, &name)?.rows.keys().cloned().collect();
                (db, name, keys)
            }
            Value::Selection { db, table, rows } => {
                let primary_key = self.table(&db, &table)?.primary_key.clone();
                let keys = rows
                    .iter()
                    .filter_map(|row| row.field(&primary_key).cloned())
                    .collect();
                (db, table, keys)
            }
            _ => return runtime("Expected type SELECTION but found DATUM."),
        };

        let rows = &mut self.table_mut(&db, &table)?.rows;
        let mut summary = WriteSummary::default();
        let mut undo = Vec::new();
        for key in &keys {
            match rows.remove(key) {
                Some(previous) => {
                    summary.deleted += 1;
                    undo.push(Undo::Row {
                        db: db.clone(),
                        table: table.clone(),
                        key: key.clone(),
                        previous: Some(previous),
                    });
                }
                None => summary.skipped += 1,
            }
        }
        if keys.is_empty() {
            summary.skipped += 1;
        }
        self.journal.extend(undo);
        Ok(summary.to_datum())
    }
}

fn origin(value: &Value) -> Option<(String, String)> {
    match value {
        Value::Table { db, name } => Some((db.clone(), name.clone())),
        Value::Selection { db, table, .. } => Some((db.clone(), table.clone())),
        _ => None,
    }
}

fn with_origin(origin: Option<(String, String)>, rows: Vec<Datum>) -> Value {
    match origin {
        Some((db, table)) => Value::Selection { db, table, rows },
        None => Value::Stream(rows),
    }
}

fn with_changes(summary: WriteSummary, changes: Vec<Datum>, return_changes: bool) -> Datum {
    let mut datum = summary.to_datum();
    if return_changes {
        if let Datum::Object(map) = &mut datum {
            map.insert("changes".to_string(), Datum::Array(changes));
        }
    }
    datum
}

fn coerce(value: Datum, target: &str) -> Eval<Datum> {
    match (value, target) {
        (Datum::Binary(bytes), "BINARY") => Ok(Datum::Binary(bytes)),
        (Datum::String(s), "BINARY") => Ok(Datum::Binary(s.into_bytes())),
        (Datum::String(s), "STRING") => Ok(Datum::String(s)),
        (Datum::Binary(bytes), "STRING") => match String::from_utf8(bytes) {
            Ok(s) => Ok(Datum::String(s)),
            Err(_) => runtime("Could not coerce binary to string: invalid UTF-8."),
        },
        (Datum::Array(items), "ARRAY") => Ok(Datum::Array(items)),
        (Datum::Object(map), "ARRAY") => Ok(Datum::Array(
            map.into_iter()
                .map(|(k, v)| Datum::Array(vec![Datum::String(k), v]))
                .collect(),
        )),
        (Datum::Object(map), "OBJECT") => Ok(Datum::Object(map)),
        (other, "STRING") => Ok(Datum::String(other.to_string())),
        (other, target) => runtime(format!(
            "Cannot coerce {} to {target}.",
            other.type_name()
        )),
    }
}

fn pluck(value: Datum, fields: &[String]) -> Eval<Datum> {
    match value {
        Datum::Object(mut map) => Ok(Datum::Object(
            fields
                .iter()
                .filter_map(|f| map.remove(f).map(|v| (f.clone(), v)))
                .collect(),
        )),
        Datum::Array(items) => Ok(Datum::Array(
            items
                .into_iter()
                .map(|item| pluck(item, fields))
                .collect::<Eval<_>>()?,
        )),
        other => runtime(format!(
            "Cannot perform pluck on a non-object non-sequence `{other}`."
        )),
    }
}
