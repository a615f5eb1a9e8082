// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backing-store traits
//!
//! The access layer talks to any snapshot-capable store through these two
//! traits. Implementations must tolerate concurrent calls on one transaction.

use super::types::{
    BackendSession, BackendType, DatabaseId, ResultSet, Statement, TimestampBound,
};
use crate::config::{Credentials, Endpoint};
use crate::error::ScanResult;
use crate::partition::{PartitionOptions, PartitionToken};
use crate::types::ColumnMeta;
use chrono::{DateTime, Utc};

/// A store that can open read-only snapshots
pub trait SnapshotBackend: Send + Sync {
    /// Establish a session; transport and auth failures are `Connection` errors
    fn create_session(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> ScanResult<BackendSession>;

    /// Open a read-only transaction pinned to one timestamp
    fn begin_read_only(
        &self,
        session: &BackendSession,
        database: &DatabaseId,
        bound: TimestampBound,
    ) -> ScanResult<Box<dyn ReadOnlyTransaction>>;

    /// Give a session back; releasing twice is a no-op
    fn release_session(&self, session: &BackendSession);

    fn backend_type(&self) -> BackendType;
}

/// One consistent read-only view
pub trait ReadOnlyTransaction: Send + Sync {
    /// Timestamp every read of this transaction observes
    fn read_timestamp(&self) -> DateTime<Utc>;

    /// Result columns of a statement without executing it
    fn describe(&self, statement: &Statement) -> ScanResult<Vec<ColumnMeta>>;

    /// Propose a partitioning; `Partition` errors mean the query cannot be split
    fn partition_query(
        &self,
        statement: &Statement,
        options: &PartitionOptions,
    ) -> ScanResult<Vec<PartitionToken>>;

    /// Execute exactly the slice a token describes
    fn execute_partition(&self, token: &PartitionToken) -> ScanResult<ResultSet>;

    /// Execute the whole statement in one go
    fn execute_query(&self, statement: &Statement) -> ScanResult<ResultSet>;

    /// Release transaction resources; later calls fail
    fn close(&self);
}
