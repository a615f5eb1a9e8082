// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Partitioned query cursor
//!
//! Hands out the partitions of a fixed plan to any number of concurrent
//! callers. The only synchronization point is a fetch-and-add on the shared
//! index, so every plan index is claimed by exactly one `fetch` call.
//! Partitions that turn out to be empty are skipped transparently; the
//! skip is a loop bounded by the plan length.

use crate::error::{ScanError, ScanResult};
use crate::events::{ScanEvent, ScanEventSink};
use crate::partition::{PartitionOptions, PartitionPlan};
use crate::transaction::{RowBatchStream, SnapshotTransaction};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Counters describing what a cursor has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    /// Plan indices claimed by some fetch
    pub claimed: usize,
    /// Claimed partitions that produced no rows
    pub skipped_empty: usize,
    /// Non-empty streams handed to callers
    pub delivered: usize,
    /// Executions repeated after a successful peek
    pub re_executions: usize,
}

/// Thread-safe single-pass distributor over a partition plan
pub struct PartitionedQueryCursor {
    transaction: Arc<SnapshotTransaction>,
    plan: PartitionPlan,
    next_index: AtomicUsize,
    closed: AtomicBool,
    sink: Arc<dyn ScanEventSink>,
    claimed: AtomicUsize,
    skipped_empty: AtomicUsize,
    delivered: AtomicUsize,
    re_executions: AtomicUsize,
}

impl PartitionedQueryCursor {
    /// Partition `sql` under the transaction and build a cursor over the plan
    ///
    /// A `Partition` error is returned untouched so the caller can fall back
    /// to single-shot execution.
    pub fn open(
        transaction: Arc<SnapshotTransaction>,
        sql: &str,
        options: &PartitionOptions,
    ) -> ScanResult<Self> {
        let plan = transaction.partition_query(sql, options)?;
        Ok(Self::new(transaction, plan))
    }

    pub fn new(transaction: Arc<SnapshotTransaction>, plan: PartitionPlan) -> Self {
        let sink = transaction.sink();
        sink.record(&ScanEvent::PlanLoaded {
            partitions: plan.len(),
        });
        Self {
            transaction,
            plan,
            next_index: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            sink,
            claimed: AtomicUsize::new(0),
            skipped_empty: AtomicUsize::new(0),
            delivered: AtomicUsize::new(0),
            re_executions: AtomicUsize::new(0),
        }
    }

    pub fn plan_len(&self) -> usize {
        self.plan.len()
    }

    pub fn transaction(&self) -> &Arc<SnapshotTransaction> {
        &self.transaction
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CursorStats {
        CursorStats {
            claimed: self.claimed.load(Ordering::Acquire),
            skipped_empty: self.skipped_empty.load(Ordering::Acquire),
            delivered: self.delivered.load(Ordering::Acquire),
            re_executions: self.re_executions.load(Ordering::Acquire),
        }
    }

    fn claim(&self) -> Option<usize> {
        let len = self.plan.len();
        // Keep the counter from growing once the plan is used up
        if self.next_index.load(Ordering::Acquire) >= len {
            return None;
        }
        let index = self.next_index.fetch_add(1, Ordering::AcqRel);
        if index < len {
            self.claimed.fetch_add(1, Ordering::AcqRel);
            Some(index)
        } else {
            None
        }
    }

    fn ensure_open(&self) -> ScanResult<()> {
        if self.is_closed() {
            Err(ScanError::Closed)
        } else {
            Ok(())
        }
    }

    fn execute(&self, index: usize) -> ScanResult<RowBatchStream> {
        let token = self.plan.get(index).ok_or_else(|| {
            ScanError::Execution(format!("Partition {} is outside the plan", index))
        })?;
        let stream = self
            .transaction
            .execute_indexed(token, Some(index))
            .map_err(|e| partition_failure(index, e))?;
        self.ensure_open()?;
        Ok(stream)
    }

    /// Next non-empty partition, or `None` once the plan is exhausted
    pub fn fetch(&self) -> ScanResult<Option<RowBatchStream>> {
        loop {
            self.ensure_open()?;
            let Some(index) = self.claim() else {
                return Ok(None);
            };
            self.sink.record(&ScanEvent::PartitionClaimed { index });

            let mut probe = self.execute(index)?;
            match probe.next() {
                None => {
                    self.skipped_empty.fetch_add(1, Ordering::AcqRel);
                    self.sink.record(&ScanEvent::PartitionEmpty { index });
                    continue;
                }
                Some(Err(e)) => return Err(partition_failure(index, e)),
                Some(Ok(_)) => {}
            }
            drop(probe);

            // The probe consumed a row, so hand out a fresh execution
            self.re_executions.fetch_add(1, Ordering::AcqRel);
            let stream = self.execute(index)?;
            self.delivered.fetch_add(1, Ordering::AcqRel);
            self.sink.record(&ScanEvent::PartitionDelivered { index });
            return Ok(Some(stream));
        }
    }

    /// Close the cursor and its transaction; safe while fetches are in flight
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.transaction.close();
        true
    }
}

impl Drop for PartitionedQueryCursor {
    fn drop(&mut self) {
        self.close();
    }
}

fn partition_failure(index: usize, error: ScanError) -> ScanError {
    match error {
        ScanError::Closed => ScanError::Closed,
        ScanError::Execution(message) => {
            ScanError::Execution(format!("Partition {} failed: {}", index, message))
        }
        other => ScanError::Execution(format!("Partition {} failed: {}", index, other)),
    }
}
