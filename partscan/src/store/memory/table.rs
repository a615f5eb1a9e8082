// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Multi-version tables of the in-process store

use crate::error::{ScanError, ScanResult};
use crate::types::{ColumnMeta, Row, SqlType, Value};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Ordered columns, primary key and split points of a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnMeta>,
    pub primary_key: String,
    /// Explicit partition boundaries; empty means split heuristically
    pub split_points: Vec<Value>,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnMeta>,
        primary_key: impl Into<String>,
    ) -> ScanResult<Self> {
        let schema = Self {
            name: name.into(),
            columns,
            primary_key: primary_key.into(),
            split_points: Vec::new(),
        };

        let key_column = schema.key_column().ok_or_else(|| {
            ScanError::Storage(format!(
                "Primary key '{}' is not a column of {}",
                schema.primary_key, schema.name
            ))
        })?;
        if !key_column.sql_type.is_key_type() {
            return Err(ScanError::Storage(format!(
                "Column {} of type {} cannot be a primary key",
                key_column.name, key_column.sql_type
            )));
        }
        Ok(schema)
    }

    pub fn with_split_points(mut self, split_points: Vec<Value>) -> Self {
        self.split_points = split_points;
        self.split_points.sort_by(|a, b| a.sql_cmp(b));
        self.split_points.dedup();
        self
    }

    /// Position of a column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn key_index(&self) -> Option<usize> {
        self.column_index(&self.primary_key)
    }

    pub fn key_column(&self) -> Option<&ColumnMeta> {
        self.key_index().map(|i| &self.columns[i])
    }

    pub fn key_type(&self) -> Option<&SqlType> {
        self.key_column().map(|c| &c.sql_type)
    }

    /// Check width and value types of a row; returns its key
    pub fn check_row(&self, row: &Row) -> ScanResult<Value> {
        if row.len() != self.columns.len() {
            return Err(ScanError::Storage(format!(
                "Row for {} has {} values, table has {} columns",
                self.name,
                row.len(),
                self.columns.len()
            )));
        }
        for (value, column) in row.values.iter().zip(&self.columns) {
            if !value_matches(value, &column.sql_type) {
                return Err(ScanError::Storage(format!(
                    "Value {} does not fit column {} of type {}",
                    value, column.name, column.sql_type
                )));
            }
        }

        let key_index = self.key_index().ok_or_else(|| {
            ScanError::Storage(format!("Table {} has no primary key column", self.name))
        })?;
        let key = row.values[key_index].clone();
        if key.is_null() {
            return Err(ScanError::Storage(format!(
                "Primary key of {} must not be NULL",
                self.name
            )));
        }
        Ok(key)
    }
}

/// Whether a native value can be stored in a column of the given type
pub(crate) fn value_matches(value: &Value, sql_type: &SqlType) -> bool {
    match (value, sql_type) {
        (Value::Null, _) => true,
        (Value::Bool(_), SqlType::Bool)
        | (Value::Int64(_), SqlType::Int64)
        | (Value::Float64(_), SqlType::Float64)
        | (Value::Numeric(_), SqlType::Numeric)
        | (Value::String(_), SqlType::String)
        | (Value::Bytes(_), SqlType::Bytes)
        | (Value::Date(_), SqlType::Date)
        | (Value::Timestamp(_), SqlType::Timestamp)
        | (Value::Json(_), SqlType::Json) => true,
        (Value::Array(items), SqlType::Array(element)) => {
            items.iter().all(|item| value_matches(item, element))
        }
        _ => false,
    }
}

/// Primary key ordered by SQL comparison
#[derive(Debug, Clone)]
pub(crate) struct Key(pub Value);

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.sql_cmp(&other.0)
    }
}

/// Rows of one committed version, ordered by key
pub(crate) type TableData = Arc<BTreeMap<Key, Row>>;

/// Write applied by a commit
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert or replace the row with the same key
    Upsert(Row),
    Delete(Value),
}

#[derive(Debug)]
struct TableVersion {
    commit_ts: DateTime<Utc>,
    data: TableData,
}

/// Table contents at every commit timestamp
#[derive(Debug)]
pub(crate) struct VersionedTable {
    schema: TableSchema,
    versions: Vec<TableVersion>,
}

impl VersionedTable {
    pub fn new(schema: TableSchema, created_at: DateTime<Utc>) -> Self {
        Self {
            schema,
            versions: vec![TableVersion {
                commit_ts: created_at,
                data: Arc::new(BTreeMap::new()),
            }],
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn set_split_points(&mut self, split_points: Vec<Value>) {
        self.schema = self.schema.clone().with_split_points(split_points);
    }

    /// Latest version committed at or before `read_ts`
    ///
    /// `None` when the table did not exist yet at that timestamp.
    pub fn snapshot_at(&self, read_ts: DateTime<Utc>) -> Option<TableData> {
        self.versions
            .iter()
            .rev()
            .find(|v| v.commit_ts <= read_ts)
            .map(|v| Arc::clone(&v.data))
    }

    /// Apply mutations as one new version at `commit_ts`
    pub fn commit(&mut self, commit_ts: DateTime<Utc>, mutations: Vec<Mutation>) -> ScanResult<()> {
        let latest = self.versions.last().ok_or_else(|| {
            ScanError::Storage(format!("Table {} has no versions", self.schema.name))
        })?;
        if commit_ts <= latest.commit_ts {
            return Err(ScanError::Storage(format!(
                "Commit timestamp {} is not after {}",
                commit_ts, latest.commit_ts
            )));
        }

        let mut data = (*latest.data).clone();
        for mutation in mutations {
            match mutation {
                Mutation::Upsert(row) => {
                    let key = self.schema.check_row(&row)?;
                    data.insert(Key(key), row);
                }
                Mutation::Delete(key) => {
                    data.remove(&Key(key));
                }
            }
        }

        self.versions.push(TableVersion {
            commit_ts,
            data: Arc::new(data),
        });
        Ok(())
    }
}
