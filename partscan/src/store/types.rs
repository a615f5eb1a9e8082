// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Shared types of the backing-store access layer

use crate::config::{Credentials, Endpoint};
use crate::error::ScanResult;
use crate::types::{ColumnMeta, Row};
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// Fully qualified database name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatabaseId {
    pub project: String,
    pub instance: String,
    pub database: String,
}

impl DatabaseId {
    pub fn new(project: &str, instance: &str, database: &str) -> Self {
        Self {
            project: project.to_string(),
            instance: instance.to_string(),
            database: database.to_string(),
        }
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "projects/{}/instances/{}/databases/{}",
            self.project, self.instance, self.database
        )
    }
}

/// How the read timestamp of a snapshot is chosen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimestampBound {
    /// Latest committed data
    #[default]
    Strong,
    /// Exactly the given timestamp
    ReadTimestamp(DateTime<Utc>),
    /// Now minus the given staleness
    ExactStaleness(Duration),
}

/// Immutable identity of one snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotHandle {
    pub database: DatabaseId,
    pub timestamp_bound: TimestampBound,
}

impl SnapshotHandle {
    pub fn project_id(&self) -> &str {
        &self.database.project
    }

    pub fn instance_id(&self) -> &str {
        &self.database.instance
    }

    pub fn database_id(&self) -> &str {
        &self.database.database
    }
}

/// SQL statement text sent to the backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
}

impl Statement {
    pub fn new(sql: impl Into<String>) -> Self {
        Self { sql: sql.into() }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

impl From<&str> for Statement {
    fn from(sql: &str) -> Self {
        Self::new(sql)
    }
}

impl From<String> for Statement {
    fn from(sql: String) -> Self {
        Self::new(sql)
    }
}

/// Lazy row sequence produced by one execution
pub type RowIter = Box<dyn Iterator<Item = ScanResult<Row>> + Send>;

/// Columns plus the lazy rows of one execution
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: RowIter,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: RowIter) -> Self {
        Self { columns, rows }
    }

    /// Result set over rows already materialized
    pub fn from_rows(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> Self {
        Self::new(columns, Box::new(rows.into_iter().map(Ok)))
    }
}

impl fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultSet")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

/// Session established against a backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSession {
    pub id: String,
    pub endpoint: Endpoint,
    pub credentials: Credentials,
}

/// Kind of backing store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendType {
    /// In-process emulator
    Memory,
    /// Any other implementation, named by its provider
    Custom(String),
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Memory => write!(f, "memory"),
            BackendType::Custom(name) => write!(f, "{}", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_id_display() {
        let id = DatabaseId::new("p", "i", "d");
        assert_eq!(id.to_string(), "projects/p/instances/i/databases/d");
    }

    #[test]
    fn test_backend_type_display() {
        assert_eq!(BackendType::Memory.to_string(), "memory");
        assert_eq!(BackendType::Custom("scripted".into()).to_string(), "scripted");
    }
}
