// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! partscan - partitioned snapshot reads
//!
//! partscan reads a large query result from a horizontally partitioned
//! database by opening one consistent read-only snapshot, asking the store
//! to split the query into partitions, and handing those partitions to any
//! number of concurrent workers.
//!
//! # Features
//!
//! - **Single snapshot**: every partition reads the same point in time
//! - **At-most-once claiming**: each partition goes to exactly one caller
//! - **Empty partition skipping**: callers never receive an empty batch
//! - **Fallback**: unpartitionable queries run once against the snapshot
//! - **Output decoding**: native rows become typed output rows
//!
//! # Usage
//!
//! ```ignore
//! use partscan::{MemoryBackend, ScanConfig, ScanRunner, ScanSource, SnapshotClient, RowBridge, CollectingSink};
//! use std::sync::Arc;
//!
//! let config = ScanConfig::load("scan.json")?;
//! let client = SnapshotClient::connect(Arc::new(MemoryBackend::new()), &config.connection)?;
//! let txn = Arc::new(client.begin_snapshot()?);
//! let source = ScanSource::open(txn, &config.sql()?, &config.partition)?;
//! let bridge = RowBridge::for_columns(source.columns(), &config.value_type_overrides())?;
//! let sink = CollectingSink::new();
//! ScanRunner::new(config.workers).run(&source, &bridge, &sink)?;
//! ```

pub mod bridge;
pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod events;
pub mod partition;
pub mod scan;
pub mod store;
pub mod transaction;
pub mod types;

pub use bridge::{OutputColumn, OutputRow, OutputType, OutputValue, RowBridge};
pub use client::SnapshotClient;
pub use config::{ConnectionConfig, CredentialConfig, Credentials, Endpoint, QuerySpec, ScanConfig};
pub use cursor::{CursorStats, PartitionedQueryCursor};
pub use error::{ScanError, ScanResult};
pub use events::{LogSink, NoopSink, RecordingSink, ScanEvent, ScanEventSink};
pub use partition::{PartitionOptions, PartitionPlan, PartitionToken};
pub use scan::{
    CollectingSink, FallbackReason, RowSink, RunSummary, ScanPath, ScanRunner, ScanSource,
};
pub use store::{
    DatabaseId, FixtureSet, MemoryBackend, SnapshotBackend, TableSchema, TimestampBound,
};
pub use transaction::{RowBatchStream, SnapshotTransaction};
pub use types::{ColumnMeta, Row, SqlType, Value};

/// partscan version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// partscan crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
