// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scan source: the partitioned cursor or the single-shot fallback
//!
//! A query the backing store refuses to partition, or one whose plan has no
//! partitions, is executed once against the open transaction. Callers see
//! the same `fetch()`/`close()` surface either way.

use crate::cursor::{CursorStats, PartitionedQueryCursor};
use crate::error::{ScanError, ScanResult};
use crate::events::{ScanEvent, ScanEventSink};
use crate::partition::PartitionOptions;
use crate::transaction::{RowBatchStream, SnapshotTransaction};
use crate::types::ColumnMeta;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Why a scan did not use the partitioned cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// The backing store rejected the partitioning request
    NotPartitionable(String),
    /// The plan had no partitions
    EmptyPlan,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::NotPartitionable(message) => write!(f, "{}", message),
            FallbackReason::EmptyPlan => write!(f, "partition plan is empty"),
        }
    }
}

/// Execution path chosen when the source was opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanPath {
    Partitioned { partitions: usize },
    SingleShot { reason: FallbackReason },
}

impl ScanPath {
    pub fn is_partitioned(&self) -> bool {
        matches!(self, ScanPath::Partitioned { .. })
    }
}

impl fmt::Display for ScanPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanPath::Partitioned { partitions } => {
                write!(f, "partitioned ({} partitions)", partitions)
            }
            ScanPath::SingleShot { reason } => write!(f, "single-shot ({})", reason),
        }
    }
}

/// Whole-query read that behaves like a one-element plan
///
/// At most one `fetch` delivers rows. An empty result is reported as
/// exhausted, never as an empty batch.
pub struct SingleShotRead {
    transaction: Arc<SnapshotTransaction>,
    sql: String,
    claimed: AtomicBool,
    closed: AtomicBool,
    skipped_empty: AtomicUsize,
    delivered: AtomicUsize,
}

impl SingleShotRead {
    pub fn new(transaction: Arc<SnapshotTransaction>, sql: impl Into<String>) -> Self {
        Self {
            transaction,
            sql: sql.into(),
            claimed: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            skipped_empty: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn fetch(&self) -> ScanResult<Option<RowBatchStream>> {
        if self.is_closed() {
            return Err(ScanError::Closed);
        }
        if self.claimed.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }

        let mut probe = self.transaction.execute_query(&self.sql)?;
        match probe.next() {
            None => {
                self.skipped_empty.fetch_add(1, Ordering::AcqRel);
                return Ok(None);
            }
            Some(Err(e)) => return Err(e),
            Some(Ok(_)) => {}
        }
        drop(probe);

        let stream = self.transaction.execute_query(&self.sql)?;
        self.delivered.fetch_add(1, Ordering::AcqRel);
        Ok(Some(stream))
    }

    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.transaction.close();
        true
    }

    pub fn stats(&self) -> CursorStats {
        let claimed = usize::from(self.claimed.load(Ordering::Acquire));
        let delivered = self.delivered.load(Ordering::Acquire);
        CursorStats {
            claimed,
            skipped_empty: self.skipped_empty.load(Ordering::Acquire),
            delivered,
            re_executions: delivered,
        }
    }
}

impl Drop for SingleShotRead {
    fn drop(&mut self) {
        self.close();
    }
}

enum Reader {
    Partitioned(PartitionedQueryCursor),
    SingleShot(SingleShotRead),
}

/// Source of row batches for one query under one snapshot
pub struct ScanSource {
    reader: Reader,
    path: ScanPath,
    columns: Vec<ColumnMeta>,
}

impl ScanSource {
    /// Describe and partition `sql`, falling back to a single-shot read
    ///
    /// Only a `Partition` error or an empty plan selects the fallback. Any
    /// other failure is returned.
    pub fn open(
        transaction: Arc<SnapshotTransaction>,
        sql: &str,
        options: &PartitionOptions,
    ) -> ScanResult<Self> {
        let columns = transaction.describe(sql)?;

        let reason = match transaction.partition_query(sql, options) {
            Ok(plan) if !plan.is_empty() => {
                let path = ScanPath::Partitioned {
                    partitions: plan.len(),
                };
                return Ok(Self {
                    reader: Reader::Partitioned(PartitionedQueryCursor::new(transaction, plan)),
                    path,
                    columns,
                });
            }
            Ok(_) => FallbackReason::EmptyPlan,
            Err(ScanError::Partition(message)) => FallbackReason::NotPartitionable(message),
            Err(e) => return Err(e),
        };

        transaction.sink().record(&ScanEvent::FallbackEngaged {
            reason: reason.to_string(),
        });
        Ok(Self {
            reader: Reader::SingleShot(SingleShotRead::new(transaction, sql)),
            path: ScanPath::SingleShot { reason },
            columns,
        })
    }

    pub fn path(&self) -> &ScanPath {
        &self.path
    }

    /// Result columns of the query
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Next non-empty batch, or `None` once every partition was handed out
    pub fn fetch(&self) -> ScanResult<Option<RowBatchStream>> {
        match &self.reader {
            Reader::Partitioned(cursor) => cursor.fetch(),
            Reader::SingleShot(read) => read.fetch(),
        }
    }

    /// Close the source and its transaction; returns false when already closed
    pub fn close(&self) -> bool {
        match &self.reader {
            Reader::Partitioned(cursor) => cursor.close(),
            Reader::SingleShot(read) => read.close(),
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.reader {
            Reader::Partitioned(cursor) => cursor.is_closed(),
            Reader::SingleShot(read) => read.is_closed(),
        }
    }

    pub fn stats(&self) -> CursorStats {
        match &self.reader {
            Reader::Partitioned(cursor) => cursor.stats(),
            Reader::SingleShot(read) => read.stats(),
        }
    }
}

impl fmt::Debug for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanSource")
            .field("path", &self.path)
            .field("columns", &self.columns)
            .field("stats", &self.stats())
            .finish()
    }
}
