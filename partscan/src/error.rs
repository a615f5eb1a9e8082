// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scan error taxonomy
//!
//! Every failure in this crate propagates synchronously to the caller as a
//! [`ScanError`]. Nothing is retried internally.

use thiserror::Error;

/// Errors raised while configuring, opening, partitioning or reading a scan
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// Malformed identifiers or unusable credentials. Fatal, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transport or authentication failure while opening the snapshot
    #[error("Connection error: {0}")]
    Connection(String),

    /// The query cannot be partitioned; callers fall back to single-shot execution
    #[error("Partition error: {0}")]
    Partition(String),

    /// A partition (or the single-shot query) failed mid-read
    #[error("Execution error: {0}")]
    Execution(String),

    /// Operation attempted after the owning transaction or cursor was closed
    #[error("Operation attempted after close")]
    Closed,

    /// Decoded row width does not match the declared output schema
    #[error("Schema mismatch: expected {expected} columns, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    /// A value could not be converted to its declared output type
    #[error("Decode error: {0}")]
    Decode(String),

    /// A column type has no output mapping and no override was configured
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Backing store administration failure (fixtures, commits)
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ScanError {
    /// Whether the error came from a closed transaction or cursor
    pub fn is_closed(&self) -> bool {
        matches!(self, ScanError::Closed)
    }

    /// Whether the whole run must stop
    ///
    /// Only [`ScanError::Partition`] is recoverable: it selects the
    /// single-shot fallback path.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ScanError::Partition(_))
    }

    /// Re-tag a backend failure as an execution failure, keeping `Closed` intact
    pub(crate) fn into_execution(self) -> ScanError {
        match self {
            ScanError::Closed | ScanError::Execution(_) => self,
            other => ScanError::Execution(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(e: serde_json::Error) -> Self {
        ScanError::Configuration(format!("Invalid JSON: {}", e))
    }
}

/// Result type used throughout partscan
pub type ScanResult<T> = Result<T, ScanError>;
