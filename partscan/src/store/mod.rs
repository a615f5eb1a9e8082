// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backing-store access layer
//!
//! Explicit adapter traits for snapshot-capable stores, plus the in-process
//! multi-version store used by tests and the CLI.

pub mod memory;
pub mod traits;
pub mod types;

pub use memory::{FixtureSet, MemoryBackend, TableSchema};
pub use traits::{ReadOnlyTransaction, SnapshotBackend};
pub use types::{
    BackendSession, BackendType, DatabaseId, ResultSet, RowIter, SnapshotHandle, Statement,
    TimestampBound,
};
