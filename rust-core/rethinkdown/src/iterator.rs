// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Range iterator.
//
// The store has no ordered range scan, so a range is synthesized from one
// filter per bound, an explicit sort on `key`, and an optional limit. In
// reverse mode every bound maps to the mirrored comparison, because the
// sort is mirrored too.
//
// The query is built when the iterator is created and executed on the
// first `next`, so execution errors surface from `next`.

use std::sync::Arc;

use futures::stream::{self, Stream};
use reql_driver::{Cursor, Datum, Order, Term};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::codec::{as_buffer, Input, Record, Slice};
use crate::error::{is_end_of_stream, Error, Result};
use crate::link::Link;
use crate::{KEY, VALUE};

/// Bounds, direction and representation of a range scan.
///
/// Empty bounds are ignored. A negative or absent `limit` means no limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RangeSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<Slice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<Slice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<Slice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<Slice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<Slice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<Slice>,
    pub reverse: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    pub key_as_buffer: bool,
    pub value_as_buffer: bool,
}

impl Default for RangeSpec {
    fn default() -> Self {
        Self {
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            start: None,
            end: None,
            reverse: false,
            limit: None,
            key_as_buffer: true,
            value_as_buffer: true,
        }
    }
}

impl RangeSpec {
    /// The range that visits the same keys in the opposite direction.
    pub fn reversed(&self) -> Self {
        Self {
            gt: self.lt.clone(),
            gte: self.lte.clone(),
            lt: self.gt.clone(),
            lte: self.gte.clone(),
            start: self.end.clone(),
            end: self.start.clone(),
            reverse: !self.reverse,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cmp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Cmp {
    fn mirror(self) -> Self {
        match self {
            Cmp::Lt => Cmp::Gt,
            Cmp::Le => Cmp::Ge,
            Cmp::Gt => Cmp::Lt,
            Cmp::Ge => Cmp::Le,
        }
    }

    fn build(self, field: Term, bound: Datum) -> Term {
        match self {
            Cmp::Lt => field.lt(bound),
            Cmp::Le => field.le(bound),
            Cmp::Gt => field.gt(bound),
            Cmp::Ge => field.ge(bound),
        }
    }
}

/// Build the range query over `table`.
pub fn range_query(table: Term, spec: &RangeSpec) -> Term {
    let bounds = [
        (&spec.start, Cmp::Ge),
        (&spec.end, Cmp::Le),
        (&spec.gt, Cmp::Gt),
        (&spec.gte, Cmp::Ge),
        (&spec.lt, Cmp::Lt),
        (&spec.lte, Cmp::Le),
    ];

    let mut query = table;
    for (bound, cmp) in bounds {
        let Some(bound) = bound.as_ref().filter(|b| !b.is_empty()) else {
            continue;
        };
        let cmp = if spec.reverse { cmp.mirror() } else { cmp };
        query = query.filter(Term::func(|row| cmp.build(row.field(KEY), bound.to_datum())));
    }

    query = query.order_by(if spec.reverse {
        Order::Desc(KEY.into())
    } else {
        Order::Asc(KEY.into())
    });

    match spec.limit {
        Some(n) if n >= 0 => query.limit(n as usize),
        _ => query,
    }
}

/// Pull-based iterator over a range query.
pub struct RangeIterator {
    link: Arc<Link>,
    query: Term,
    cursor: Option<Box<dyn Cursor>>,
    key_as_buffer: bool,
    value_as_buffer: bool,
    exhausted: bool,
    ended: bool,
}

impl RangeIterator {
    pub(crate) fn new(link: Arc<Link>, table: Term, spec: &RangeSpec) -> Self {
        Self {
            link,
            query: range_query(table, spec),
            cursor: None,
            key_as_buffer: spec.key_as_buffer,
            value_as_buffer: spec.value_as_buffer,
            exhausted: false,
            ended: false,
        }
    }

    /// Next record, or `None` once the range is exhausted.
    pub async fn next(&mut self) -> Result<Option<Record>> {
        if self.ended {
            return Err(Error::IteratorEnded);
        }
        if self.exhausted {
            return Ok(None);
        }
        if self.cursor.is_none() {
            debug!("opening range cursor");
            self.cursor = Some(self.link.cursor(&self.query).await?);
        }
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(None);
        };

        match cursor.next().await {
            Ok(row) => {
                let field = |name: &str| row.field(name).cloned().unwrap_or(Datum::Null);
                Ok(Some(Record {
                    key: as_buffer(field(KEY), self.key_as_buffer),
                    value: as_buffer(field(VALUE), self.value_as_buffer),
                }))
            }
            Err(err) if is_end_of_stream(&err) => {
                self.exhausted = true;
                Ok(None)
            }
            Err(err) => Err(Error::from_driver(err)),
        }
    }

    /// Close the cursor. The iterator cannot be used afterwards.
    pub async fn end(&mut self) -> Result<()> {
        if self.ended {
            return Err(Error::IteratorEnded);
        }
        self.ended = true;
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close().await.map_err(|err| {
                let err = Error::from_driver(err);
                warn!(error = %err, "failed to close range cursor");
                err
            })?;
        }
        Ok(())
    }

    /// Repositioning an open cursor is not supported.
    pub fn seek(&mut self, _key: impl Into<Input>) -> Result<()> {
        Err(Error::NotImplemented("seek"))
    }

    /// Adapt into a stream of records. The cursor is closed when the stream
    /// finishes; the first error ends the stream.
    pub fn into_stream(self) -> impl Stream<Item = Result<Record>> + Send {
        stream::unfold(Some(self), |state| async move {
            let mut iterator = state?;
            match iterator.next().await {
                Ok(Some(record)) => Some((Ok(record), Some(iterator))),
                Ok(None) => {
                    if let Err(err) = iterator.end().await {
                        return Some((Err(err), None));
                    }
                    None
                }
                Err(err) => {
                    let _ = iterator.end().await;
                    Some((Err(err), None))
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reql_driver::TermType;

    fn text(s: &str) -> Option<Slice> {
        Some(Slice::Text(s.into()))
    }

    // Comparison kinds of the range filters, innermost first.
    fn filters(term: &Term) -> Vec<TermType> {
        let mut found = Vec::new();
        let mut current = term;
        loop {
            match current {
                Term::Op {
                    kind: TermType::Filter,
                    args,
                    ..
                } => {
                    if let Term::Func { body, .. } = &args[1] {
                        if let Term::Op { kind, .. } = body.as_ref() {
                            found.push(*kind);
                        }
                    }
                    current = &args[0];
                }
                Term::Op { args, .. } if !args.is_empty() => current = &args[0],
                _ => break,
            }
        }
        found.reverse();
        found
    }

    #[test]
    fn test_forward_mapping() {
        let spec = RangeSpec {
            start: text("a"),
            end: text("z"),
            gt: text("b"),
            gte: text("c"),
            lt: text("y"),
            lte: text("x"),
            ..Default::default()
        };
        let query = range_query(Term::db("test").table("kv"), &spec);
        assert_eq!(
            filters(&query),
            vec![
                TermType::Ge,
                TermType::Le,
                TermType::Gt,
                TermType::Ge,
                TermType::Lt,
                TermType::Le
            ]
        );
    }

    #[test]
    fn test_reverse_mapping() {
        let spec = RangeSpec {
            start: text("a"),
            end: text("z"),
            gt: text("b"),
            gte: text("c"),
            lt: text("y"),
            lte: text("x"),
            reverse: true,
            ..Default::default()
        };
        let query = range_query(Term::db("test").table("kv"), &spec);
        assert_eq!(
            filters(&query),
            vec![
                TermType::Le,
                TermType::Ge,
                TermType::Lt,
                TermType::Le,
                TermType::Gt,
                TermType::Ge
            ]
        );
    }

    #[test]
    fn test_empty_bounds_are_skipped() {
        let spec = RangeSpec {
            gt: Some(Slice::Text(String::new())),
            lt: Some(Slice::Bytes(vec![])),
            ..Default::default()
        };
        let query = range_query(Term::db("test").table("kv"), &spec);
        assert!(filters(&query).is_empty());
    }

    #[test]
    fn test_order_and_limit() {
        let spec = RangeSpec {
            reverse: true,
            limit: Some(3),
            ..Default::default()
        };
        let wire = range_query(Term::db("test").table("kv"), &spec).to_wire();
        assert_eq!(wire[0], 71);
        assert_eq!(wire[1][1], 3);
        assert_eq!(wire[1][0][1][1], serde_json::json!([74, ["key"]]));
    }

    #[test]
    fn test_negative_limit_means_unlimited() {
        let spec = RangeSpec {
            limit: Some(-1),
            ..Default::default()
        };
        let wire = range_query(Term::db("test").table("kv"), &spec).to_wire();
        assert_eq!(wire[0], 41);
    }

    #[test]
    fn test_reversed_swaps_bounds() {
        let spec = RangeSpec {
            gt: text("b"),
            lte: text("d"),
            ..Default::default()
        };
        let mirrored = spec.reversed();
        assert_eq!(mirrored.lt, text("b"));
        assert_eq!(mirrored.gte, text("d"));
        assert!(mirrored.reverse);
        assert_eq!(mirrored.reversed(), spec);
    }

    #[test]
    fn test_spec_from_json() {
        let spec: RangeSpec =
            serde_json::from_str(r#"{ "gt": "b", "limit": 2, "keyAsBuffer": false }"#).unwrap();
        assert_eq!(spec.gt, text("b"));
        assert_eq!(spec.limit, Some(2));
        assert!(!spec.key_as_buffer);
        assert!(spec.value_as_buffer);
    }
}
