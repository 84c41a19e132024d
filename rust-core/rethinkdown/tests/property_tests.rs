// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for locations, round trips and range scans

use std::collections::BTreeSet;
use std::sync::Arc;

use proptest::prelude::*;
use reql_driver::{MemoryDriver, MemoryServer};
use rethinkdown::{
    ConnectionOptions, OpenOptions, RangeSpec, ReadOptions, RethinkDown, Slice, WriteOptions,
};

/// Generate arbitrary connection options that render to a valid location
fn arb_options() -> impl Strategy<Value = ConnectionOptions> {
    (
        "[a-z][a-z0-9]{0,11}",
        1u16..,
        "[a-z][a-z0-9_]{0,11}",
        "[a-z][a-z0-9_]{0,11}",
        proptest::option::of((
            "[a-z][a-z0-9@:]{0,7}",
            proptest::option::of("[A-Za-z0-9@:/%]{1,12}"),
        )),
        proptest::option::of(0u64..100_000),
        proptest::option::of(any::<bool>()),
    )
        .prop_map(|(host, port, db, table, auth, timeout, silent)| {
            let (user, password) = match auth {
                Some((user, password)) => (Some(user), password),
                None => (None, None),
            };
            ConnectionOptions {
                host,
                port,
                db,
                table,
                user,
                password,
                timeout,
                silent,
            }
        })
}

/// Generate arbitrary non-empty keys
fn arb_key() -> impl Strategy<Value = String> {
    "[A-Za-z0-9]{1,16}"
}

/// Generate arbitrary printable values, possibly empty
fn arb_value() -> impl Strategy<Value = String> {
    "[ -~]{0,32}"
}

/// Generate an optional range bound
fn arb_bound() -> impl Strategy<Value = Option<Slice>> {
    proptest::option::of("[a-e]{1,2}".prop_map(Slice::Text))
}

async fn open(table: &str) -> RethinkDown {
    let driver = Arc::new(MemoryDriver::connecting(MemoryServer::new()));
    let mut db = RethinkDown::new(table, driver).unwrap();
    db.open(OpenOptions::default()).await.unwrap();
    db
}

async fn scan(db: &RethinkDown, range: RangeSpec) -> Vec<Slice> {
    let mut iterator = db.iterator(range).unwrap();
    let mut keys = Vec::new();
    while let Some(record) = iterator.next().await.unwrap() {
        keys.push(record.key);
    }
    iterator.end().await.unwrap();
    keys
}

proptest! {
    #[test]
    fn test_location_display_parses_back(options in arb_options()) {
        let parsed = ConnectionOptions::parse(&options.to_string()).unwrap();
        prop_assert_eq!(parsed, options);
    }

    #[test]
    fn test_put_then_get(key in arb_key(), value in arb_value()) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = open("roundtrip").await;
            db.put(key.as_str(), value.as_str(), WriteOptions::default()).await.unwrap();

            let text = db.get(key.as_str(), ReadOptions { as_buffer: false }).await.unwrap();
            prop_assert_eq!(text, Slice::Text(value.clone()));

            let bytes = db.get(key.as_str(), ReadOptions::default()).await.unwrap();
            prop_assert_eq!(bytes, Slice::Bytes(value.into_bytes()));
            Ok(())
        })?;
    }

    #[test]
    fn test_reversed_range_visits_same_keys(
        keys in proptest::collection::btree_set("[a-e]{1,3}", 0..20),
        gt in arb_bound(),
        gte in arb_bound(),
        lt in arb_bound(),
        lte in arb_bound(),
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let db = open("symmetry").await;
            for key in &keys {
                db.put(key.as_str(), "v", WriteOptions::default()).await.unwrap();
            }

            let forward = RangeSpec { gt, gte, lt, lte, key_as_buffer: false, ..Default::default() };
            let mut ascending = scan(&db, forward.clone()).await;
            let descending = scan(&db, forward.reversed()).await;

            let sorted: BTreeSet<_> = ascending.iter().cloned().collect();
            prop_assert_eq!(sorted.len(), ascending.len());
            prop_assert!(ascending.windows(2).all(|w| w[0] < w[1]));

            ascending.reverse();
            prop_assert_eq!(ascending, descending);
            Ok(())
        })?;
    }
}
