// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Instance-scoped scan event sinks
//!
//! Every client, transaction and cursor carries the sink it was created with,
//! so two scans in one process can observe their own events independently.
//!
//! - `LogSink`: forwards events to the `log` facade (default)
//! - `NoopSink`: drops everything
//! - `RecordingSink`: keeps events in memory for inspection

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Log target used by [`LogSink`]
pub const LOG_TARGET: &str = "partscan";

/// Observable milestones of a scan
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    SessionOpened { session_id: String, endpoint: String },
    SessionReleased { session_id: String },
    SnapshotOpened { database: String, read_timestamp: DateTime<Utc> },
    PlanLoaded { partitions: usize },
    PartitionClaimed { index: usize },
    PartitionEmpty { index: usize },
    PartitionDelivered { index: usize },
    FallbackEngaged { reason: String },
    TransactionClosed { database: String },
}

/// Receiver of scan events
pub trait ScanEventSink: Send + Sync {
    fn record(&self, event: &ScanEvent);
}

/// Sink that forwards events to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ScanEventSink for LogSink {
    fn record(&self, event: &ScanEvent) {
        match event {
            ScanEvent::SessionOpened {
                session_id,
                endpoint,
            } => log::debug!(
                target: LOG_TARGET,
                "Session {} opened against {}",
                session_id,
                endpoint
            ),
            ScanEvent::SessionReleased { session_id } => {
                log::debug!(target: LOG_TARGET, "Session {} released", session_id)
            }
            ScanEvent::SnapshotOpened {
                database,
                read_timestamp,
            } => log::info!(
                target: LOG_TARGET,
                "Snapshot opened on {} at {}",
                database,
                read_timestamp
            ),
            ScanEvent::PlanLoaded { partitions } => {
                log::info!(target: LOG_TARGET, "Load {} partitions.", partitions)
            }
            ScanEvent::PartitionClaimed { index } => {
                log::info!(target: LOG_TARGET, "Load the partition that index of {}", index)
            }
            ScanEvent::PartitionEmpty { index } => {
                log::debug!(target: LOG_TARGET, "Partition {} is empty, skipping", index)
            }
            ScanEvent::PartitionDelivered { index } => {
                log::debug!(target: LOG_TARGET, "Partition {} delivered", index)
            }
            ScanEvent::FallbackEngaged { reason } => log::warn!(
                target: LOG_TARGET,
                "Query is not partitionable ({}), executing it as a single partition",
                reason
            ),
            ScanEvent::TransactionClosed { database } => {
                log::debug!(target: LOG_TARGET, "Read-only transaction on {} closed", database)
            }
        }
    }
}

/// Sink that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ScanEventSink for NoopSink {
    fn record(&self, _event: &ScanEvent) {}
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ScanEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<ScanEvent> {
        self.events.lock().clone()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&ScanEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl ScanEventSink for RecordingSink {
    fn record(&self, event: &ScanEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_recording_sinks_are_isolated() {
        let first = Arc::new(RecordingSink::new());
        let second = Arc::new(RecordingSink::new());

        first.record(&ScanEvent::PlanLoaded { partitions: 3 });
        second.record(&ScanEvent::PartitionEmpty { index: 0 });
        second.record(&ScanEvent::PartitionEmpty { index: 1 });

        assert_eq!(first.events(), vec![ScanEvent::PlanLoaded { partitions: 3 }]);
        assert_eq!(
            second.count(|e| matches!(e, ScanEvent::PartitionEmpty { .. })),
            2
        );
    }
}
