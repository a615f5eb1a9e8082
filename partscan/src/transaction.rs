// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Snapshot transactions and the row streams they produce
//!
//! A [`SnapshotTransaction`] is one consistent view of the database. Every
//! partition of a plan executes against it. Closing it is idempotent and
//! never blocks; work still in flight observes the closed flag and fails
//! with [`ScanError::Closed`] instead of handing out partial data.

use crate::client::SessionGuard;
use crate::error::{ScanError, ScanResult};
use crate::events::{ScanEvent, ScanEventSink};
use crate::partition::{PartitionOptions, PartitionPlan, PartitionToken};
use crate::store::{ReadOnlyTransaction, ResultSet, RowIter, SnapshotHandle, Statement};
use crate::types::{ColumnMeta, Row};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One consistent read-only view, shared by every partition of a scan
pub struct SnapshotTransaction {
    handle: SnapshotHandle,
    inner: Box<dyn ReadOnlyTransaction>,
    closed: Arc<AtomicBool>,
    session: Mutex<Option<Arc<SessionGuard>>>,
    sink: Arc<dyn ScanEventSink>,
}

impl SnapshotTransaction {
    pub(crate) fn new(
        handle: SnapshotHandle,
        inner: Box<dyn ReadOnlyTransaction>,
        session: Arc<SessionGuard>,
        sink: Arc<dyn ScanEventSink>,
    ) -> Self {
        Self {
            handle,
            inner,
            closed: Arc::new(AtomicBool::new(false)),
            session: Mutex::new(Some(session)),
            sink,
        }
    }

    pub fn handle(&self) -> &SnapshotHandle {
        &self.handle
    }

    pub fn read_timestamp(&self) -> DateTime<Utc> {
        self.inner.read_timestamp()
    }

    pub fn sink(&self) -> Arc<dyn ScanEventSink> {
        Arc::clone(&self.sink)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> ScanResult<()> {
        if self.is_closed() {
            Err(ScanError::Closed)
        } else {
            Ok(())
        }
    }

    /// A result obtained while a close raced the call is discarded
    fn after_call<T>(&self, result: ScanResult<T>) -> ScanResult<T> {
        if self.is_closed() {
            return Err(ScanError::Closed);
        }
        result
    }

    fn stream(&self, result: ResultSet, partition_index: Option<usize>) -> RowBatchStream {
        RowBatchStream::new(
            result.columns,
            result.rows,
            Arc::clone(&self.closed),
            partition_index,
        )
    }

    /// Result columns of a query
    pub fn describe(&self, sql: &str) -> ScanResult<Vec<ColumnMeta>> {
        self.ensure_open()?;
        let result = self.inner.describe(&Statement::new(sql));
        self.after_call(result)
    }

    /// Ask the backing store for a partitioning of `sql`
    ///
    /// `Partition` errors mean the query cannot be split; the caller falls
    /// back to [`execute_query`](Self::execute_query).
    pub fn partition_query(
        &self,
        sql: &str,
        options: &PartitionOptions,
    ) -> ScanResult<PartitionPlan> {
        self.ensure_open()?;
        let result = self.inner.partition_query(&Statement::new(sql), options);
        self.after_call(result).map(PartitionPlan::new)
    }

    /// Execute exactly the slice identified by `token`
    pub fn execute(&self, token: &PartitionToken) -> ScanResult<RowBatchStream> {
        self.execute_indexed(token, None)
    }

    pub(crate) fn execute_indexed(
        &self,
        token: &PartitionToken,
        partition_index: Option<usize>,
    ) -> ScanResult<RowBatchStream> {
        self.ensure_open()?;
        let result = self
            .inner
            .execute_partition(token)
            .map_err(ScanError::into_execution);
        self.after_call(result)
            .map(|result| self.stream(result, partition_index))
    }

    /// Execute the whole query under this snapshot
    pub fn execute_query(&self, sql: &str) -> ScanResult<RowBatchStream> {
        self.ensure_open()?;
        let result = self
            .inner
            .execute_query(&Statement::new(sql))
            .map_err(ScanError::into_execution);
        self.after_call(result).map(|result| self.stream(result, None))
    }

    /// Close the transaction; returns false when it was already closed
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.close();
        self.session.lock().take();
        self.sink.record(&ScanEvent::TransactionClosed {
            database: self.handle.database.to_string(),
        });
        true
    }
}

impl Drop for SnapshotTransaction {
    fn drop(&mut self) {
        self.close();
    }
}

/// Lazy, finite, non-restartable sequence of rows from one execution
///
/// Advancing it after the owning transaction closed yields one
/// [`ScanError::Closed`] and then ends.
pub struct RowBatchStream {
    columns: Vec<ColumnMeta>,
    rows: RowIter,
    closed: Arc<AtomicBool>,
    partition_index: Option<usize>,
    rows_read: usize,
    finished: bool,
}

impl RowBatchStream {
    pub(crate) fn new(
        columns: Vec<ColumnMeta>,
        rows: RowIter,
        closed: Arc<AtomicBool>,
        partition_index: Option<usize>,
    ) -> Self {
        Self {
            columns,
            rows,
            closed,
            partition_index,
            rows_read: 0,
            finished: false,
        }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Plan index the rows came from; `None` for single-shot reads
    pub fn partition_index(&self) -> Option<usize> {
        self.partition_index
    }

    pub fn rows_read(&self) -> usize {
        self.rows_read
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Stop reading and drop the underlying rows
    pub fn close(&mut self) {
        self.finished = true;
        self.rows = Box::new(std::iter::empty());
    }
}

impl Iterator for RowBatchStream {
    type Item = ScanResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.closed.load(Ordering::Acquire) {
            self.close();
            return Some(Err(ScanError::Closed));
        }

        match self.rows.next() {
            Some(Ok(row)) => {
                self.rows_read += 1;
                Some(Ok(row))
            }
            Some(Err(e)) => {
                self.close();
                Some(Err(e.into_execution()))
            }
            None => {
                self.finished = true;
                None
            }
        }
    }
}

impl std::fmt::Debug for RowBatchStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowBatchStream")
            .field("columns", &self.columns)
            .field("partition_index", &self.partition_index)
            .field("rows_read", &self.rows_read)
            .field("finished", &self.finished)
            .finish()
    }
}
