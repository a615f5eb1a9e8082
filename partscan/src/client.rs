// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Snapshot client
//!
//! Validates the connection configuration, establishes one backend session
//! and opens read-only snapshot transactions on it. The session is released
//! exactly once: on explicit [`SnapshotClient::close`], or once the client
//! and every transaction it opened have been dropped.

use crate::config::ConnectionConfig;
use crate::error::{ScanError, ScanResult};
use crate::events::{LogSink, ScanEvent, ScanEventSink};
use crate::store::{BackendSession, DatabaseId, SnapshotBackend, SnapshotHandle, TimestampBound};
use crate::transaction::SnapshotTransaction;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Backend session released when dropped
pub(crate) struct SessionGuard {
    backend: Arc<dyn SnapshotBackend>,
    session: BackendSession,
    released: AtomicBool,
    sink: Arc<dyn ScanEventSink>,
}

impl SessionGuard {
    pub(crate) fn session(&self) -> &BackendSession {
        &self.session
    }

    pub(crate) fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            self.backend.release_session(&self.session);
            self.sink.record(&ScanEvent::SessionReleased {
                session_id: self.session.id.clone(),
            });
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.release();
    }
}

/// Opens read-only snapshots against one database
pub struct SnapshotClient {
    backend: Arc<dyn SnapshotBackend>,
    database: DatabaseId,
    session: Mutex<Option<Arc<SessionGuard>>>,
    sink: Arc<dyn ScanEventSink>,
}

impl SnapshotClient {
    /// Connect with events forwarded to the `log` facade
    pub fn connect(
        backend: Arc<dyn SnapshotBackend>,
        config: &ConnectionConfig,
    ) -> ScanResult<Self> {
        Self::connect_with_sink(backend, config, Arc::new(LogSink))
    }

    /// Connect with an explicit event sink
    pub fn connect_with_sink(
        backend: Arc<dyn SnapshotBackend>,
        config: &ConnectionConfig,
        sink: Arc<dyn ScanEventSink>,
    ) -> ScanResult<Self> {
        config.validate()?;
        let endpoint = config.endpoint();
        let credentials = config.resolve_credentials()?;
        log::debug!(
            "Connecting to {} ({} backend) with {} credentials",
            endpoint,
            backend.backend_type(),
            credentials.kind()
        );

        let session = backend.create_session(&endpoint, &credentials)?;
        sink.record(&ScanEvent::SessionOpened {
            session_id: session.id.clone(),
            endpoint: endpoint.to_string(),
        });

        let guard = Arc::new(SessionGuard {
            backend: Arc::clone(&backend),
            session,
            released: AtomicBool::new(false),
            sink: Arc::clone(&sink),
        });

        Ok(Self {
            backend,
            database: config.database(),
            session: Mutex::new(Some(guard)),
            sink,
        })
    }

    pub fn database(&self) -> &DatabaseId {
        &self.database
    }

    pub fn sink(&self) -> Arc<dyn ScanEventSink> {
        Arc::clone(&self.sink)
    }

    /// Open a strong (latest-timestamp) read-only snapshot
    pub fn begin_snapshot(&self) -> ScanResult<SnapshotTransaction> {
        self.begin_snapshot_with(TimestampBound::Strong)
    }

    pub fn begin_snapshot_with(&self, bound: TimestampBound) -> ScanResult<SnapshotTransaction> {
        let guard = self.session.lock().clone().ok_or(ScanError::Closed)?;
        let inner = self
            .backend
            .begin_read_only(guard.session(), &self.database, bound)?;

        self.sink.record(&ScanEvent::SnapshotOpened {
            database: self.database.to_string(),
            read_timestamp: inner.read_timestamp(),
        });

        let handle = SnapshotHandle {
            database: self.database.clone(),
            timestamp_bound: bound,
        };
        Ok(SnapshotTransaction::new(
            handle,
            inner,
            guard,
            Arc::clone(&self.sink),
        ))
    }

    /// Release the session; returns false when already closed
    pub fn close(&self) -> bool {
        match self.session.lock().take() {
            Some(guard) => {
                guard.release();
                true
            }
            None => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.session.lock().is_none()
    }
}

// Transactions still open keep the session alive until they are dropped
impl Drop for SnapshotClient {
    fn drop(&mut self) {
        self.session.lock().take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::store::MemoryBackend;

    fn setup() -> (MemoryBackend, ConnectionConfig) {
        let backend = MemoryBackend::new();
        let config = ConnectionConfig::new("test-project", "test-instance", "test-database")
            .with_emulator(true);
        backend.create_database(&config.database());
        (backend, config)
    }

    #[test]
    fn test_session_released_on_close_and_drop() {
        let (backend, config) = setup();
        let client = SnapshotClient::connect(Arc::new(backend.clone()), &config).unwrap();
        assert_eq!(backend.active_sessions(), 1);
        assert!(client.close());
        assert!(!client.close());
        assert_eq!(backend.active_sessions(), 0);
        assert!(matches!(client.begin_snapshot(), Err(ScanError::Closed)));

        let client = SnapshotClient::connect(Arc::new(backend.clone()), &config).unwrap();
        assert_eq!(backend.active_sessions(), 1);
        drop(client);
        assert_eq!(backend.active_sessions(), 0);
    }

    #[test]
    fn test_malformed_identifiers_fail_before_connecting() {
        let (backend, _) = setup();
        let config = ConnectionConfig::new("Bad Project", "test-instance", "test-database");
        let result = SnapshotClient::connect(Arc::new(backend.clone()), &config);
        assert!(matches!(result, Err(ScanError::Configuration(_))));
        assert_eq!(backend.active_sessions(), 0);
    }

    #[test]
    fn test_refused_connection() {
        let (backend, config) = setup();
        backend.refuse_connections(true);
        let result = SnapshotClient::connect(Arc::new(backend), &config);
        assert!(matches!(result, Err(ScanError::Connection(_))));
    }

    #[test]
    fn test_events_go_to_the_injected_sink() {
        let (backend, config) = setup();
        let sink = Arc::new(RecordingSink::new());
        let client =
            SnapshotClient::connect_with_sink(Arc::new(backend), &config, sink.clone()).unwrap();
        let txn = client.begin_snapshot().unwrap();
        txn.close();
        client.close();

        assert_eq!(sink.count(|e| matches!(e, ScanEvent::SessionOpened { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, ScanEvent::SnapshotOpened { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, ScanEvent::TransactionClosed { .. })), 1);
        assert_eq!(sink.count(|e| matches!(e, ScanEvent::SessionReleased { .. })), 1);
    }
}
