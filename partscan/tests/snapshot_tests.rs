//! Snapshot consistency tests against the in-process store
//!
//! All partitions of a plan read the same point in time, and together they
//! cover exactly the rows of the unpartitioned query.

#[path = "testutils/mod.rs"]
mod testutils;

use chrono::Utc;
use partscan::{PartitionOptions, ScanError, ScanSource, TimestampBound, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use testutils::test_fixture::{int_column, TestFixture};

fn drain(source: &partscan::ScanSource) -> Vec<i64> {
    let mut values = Vec::new();
    while let Some(stream) = source.fetch().expect("fetch") {
        values.extend(int_column(stream));
    }
    values.sort_unstable();
    values
}

#[test]
fn test_later_commits_are_invisible_to_open_snapshot() {
    let fixture = TestFixture::with_int_table(&(0..10).collect::<Vec<_>>(), &[5]).expect("fixture");
    let source = fixture.source("SELECT v FROM T").unwrap();

    fixture.insert_ints("T", &(10..20).collect::<Vec<_>>()).unwrap();
    fixture
        .backend
        .delete(&fixture.database(), "T", vec![Value::Int64(0)])
        .unwrap();

    assert_eq!(drain(&source), (0..10).collect::<Vec<_>>());

    let fresh = fixture.source("SELECT v FROM T").unwrap();
    assert_eq!(drain(&fresh), (1..20).collect::<Vec<_>>());
}

fn source_at(fixture: &TestFixture, bound: TimestampBound) -> ScanSource {
    let txn = fixture.client.begin_snapshot_with(bound).expect("snapshot");
    ScanSource::open(Arc::new(txn), "SELECT v FROM T", &PartitionOptions::default())
        .expect("source")
}

#[test]
fn test_read_timestamp_snapshot_ignores_later_commits() {
    let fixture = TestFixture::with_int_table(&(0..5).collect::<Vec<_>>(), &[]).expect("fixture");
    let commit_ts = fixture
        .backend
        .upsert(&fixture.database(), "T", vec![partscan::Row::new(vec![Value::Int64(5)])])
        .unwrap();

    let source = source_at(&fixture, TimestampBound::ReadTimestamp(commit_ts));
    fixture.insert_ints("T", &(6..10).collect::<Vec<_>>()).unwrap();
    assert_eq!(drain(&source), (0..6).collect::<Vec<_>>());
}

#[test]
fn test_zero_staleness_snapshot_ignores_later_commits() {
    let keys: Vec<i64> = (0..8).collect();
    let fixture = TestFixture::with_int_table(&keys, &[4]).expect("fixture");

    let source = source_at(&fixture, TimestampBound::ExactStaleness(Duration::ZERO));
    for k in 8..20 {
        fixture.insert_ints("T", &[k]).unwrap();
    }
    assert_eq!(drain(&source), keys);
}

#[test]
fn test_future_read_timestamp_is_rejected() {
    let fixture = TestFixture::with_int_table(&[1, 2, 3], &[]).expect("fixture");
    let future = Utc::now() + chrono::Duration::seconds(60);

    assert!(matches!(
        fixture
            .client
            .begin_snapshot_with(TimestampBound::ReadTimestamp(future)),
        Err(ScanError::Configuration(_))
    ));
    assert_eq!(fixture.backend.open_transactions(), 0);
}

#[test]
fn test_oversized_staleness_is_configuration_error() {
    let fixture = TestFixture::new().expect("fixture");
    for staleness in [
        Duration::from_secs(400_000 * 365 * 86_400),
        Duration::MAX,
    ] {
        assert!(matches!(
            fixture
                .client
                .begin_snapshot_with(TimestampBound::ExactStaleness(staleness)),
            Err(ScanError::Configuration(_))
        ));
    }
}

#[test]
fn test_union_of_partitions_equals_full_result() {
    for _ in 0..20 {
        let keys: BTreeSet<i64> = (0..fastrand::usize(1..300))
            .map(|_| fastrand::i64(-10_000..10_000))
            .collect();
        let keys: Vec<i64> = keys.into_iter().collect();
        let mut split_points: Vec<i64> = (0..fastrand::usize(0..4))
            .map(|_| fastrand::i64(-12_000..12_000))
            .collect();
        split_points.sort_unstable();

        let fixture = TestFixture::with_int_table(&keys, &split_points).expect("fixture");
        let txn = fixture.snapshot().unwrap();
        let options = PartitionOptions {
            partition_size_bytes: Some(fastrand::u64(1..256)),
            max_partitions: Some(fastrand::u64(1..32)),
        };

        for sql in ["SELECT v FROM T", "SELECT v FROM T WHERE v >= 0"] {
            let plan = txn.partition_query(sql, &options).unwrap();
            let mut union = Vec::new();
            for token in plan.iter() {
                union.extend(int_column(txn.execute(token).unwrap()));
            }
            let before_dedup = union.len();
            union.sort_unstable();
            union.dedup();
            assert_eq!(before_dedup, union.len(), "partitions overlap");

            let mut full = int_column(txn.execute_query(sql).unwrap());
            full.sort_unstable();
            assert_eq!(union, full, "sql: {}", sql);
        }
    }
}

#[test]
fn test_sparse_keys_produce_empty_partitions_that_are_skipped() {
    let fixture = TestFixture::with_int_table(&[0, 1, 2, 97, 98, 99], &[]).expect("fixture");
    let txn = fixture.snapshot().unwrap();
    let options = PartitionOptions {
        partition_size_bytes: Some(1),
        max_partitions: Some(4),
    };
    let cursor =
        partscan::PartitionedQueryCursor::open(txn, "SELECT v FROM T", &options).unwrap();
    assert_eq!(cursor.plan_len(), 4);

    let mut delivered = Vec::new();
    while let Some(stream) = cursor.fetch().unwrap() {
        delivered.push(int_column(stream));
    }
    assert_eq!(delivered, vec![vec![0, 1, 2], vec![97, 98, 99]]);
    assert_eq!(cursor.stats().skipped_empty, 2);
}

#[test]
fn test_tokens_are_bound_to_their_transaction() {
    let fixture = TestFixture::with_int_table(&[1, 2, 3], &[]).expect("fixture");
    let first = fixture.snapshot().unwrap();
    let second = fixture.snapshot().unwrap();

    let plan = first
        .partition_query("SELECT v FROM T", &PartitionOptions::default())
        .unwrap();
    let token = plan.get(0).expect("one partition");

    assert!(first.execute(token).is_ok());
    assert!(matches!(second.execute(token), Err(ScanError::Execution(_))));
    assert!(matches!(
        first.execute(&partscan::PartitionToken::from_bytes(vec![1, 2, 3])),
        Err(ScanError::Execution(_))
    ));
}

#[test]
fn test_every_partition_reads_the_same_timestamp() {
    let fixture = TestFixture::with_int_table(&[1, 50, 100], &[25, 75]).expect("fixture");
    let txn = fixture.snapshot().unwrap();
    let read_ts = txn.read_timestamp();

    let plan = txn
        .partition_query("SELECT v FROM T", &PartitionOptions::default())
        .unwrap();
    assert_eq!(plan.len(), 3);

    fixture.insert_ints("T", &[10, 60, 90]).unwrap();
    let rows: Vec<i64> = plan
        .iter()
        .flat_map(|token| int_column(txn.execute(token).unwrap()))
        .collect();
    assert_eq!(rows, vec![1, 50, 100]);
    assert_eq!(txn.read_timestamp(), read_ts);
}
