// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! JSON fixtures for seeding the in-process store
//!
//! ```json
//! {
//!   "databases": [{
//!     "project_id": "p", "instance_id": "i", "database_id": "d",
//!     "tables": [{
//!       "name": "Singers",
//!       "primary_key": "id",
//!       "columns": [{"name": "id", "type": "INT64"}, {"name": "name", "type": "STRING(MAX)"}],
//!       "split_points": [100],
//!       "rows": [[1, "Marc"], {"id": 2, "name": "Catalina"}]
//!     }]
//!   }]
//! }
//! ```

use super::table::TableSchema;
use crate::error::{ScanError, ScanResult};
use crate::store::DatabaseId;
use crate::types::{ColumnMeta, Row, Value};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureSet {
    #[serde(default)]
    pub databases: Vec<DatabaseFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseFixture {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
    #[serde(default)]
    pub tables: Vec<TableFixture>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableFixture {
    pub name: String,
    pub primary_key: String,
    pub columns: Vec<ColumnMeta>,
    #[serde(default)]
    pub split_points: Vec<serde_json::Value>,
    #[serde(default)]
    pub rows: Vec<serde_json::Value>,
}

impl FixtureSet {
    pub fn from_json(json: &str) -> ScanResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| ScanError::Storage(format!("Invalid fixture: {}", e)))
    }

    pub fn load(path: impl AsRef<Path>) -> ScanResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ScanError::Storage(format!("Cannot read fixture {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }
}

impl DatabaseFixture {
    pub fn database(&self) -> DatabaseId {
        DatabaseId::new(&self.project_id, &self.instance_id, &self.database_id)
    }
}

impl TableFixture {
    /// Schema with converted split points
    pub fn schema(&self) -> ScanResult<TableSchema> {
        let schema = TableSchema::new(&self.name, self.columns.clone(), &self.primary_key)?;
        let key_type = schema.key_type().cloned().ok_or_else(|| {
            ScanError::Storage(format!("Table {} has no primary key column", self.name))
        })?;

        let split_points = self
            .split_points
            .iter()
            .map(|point| {
                Value::from_json(point, &key_type).map_err(|e| {
                    ScanError::Storage(format!("Invalid split point for {}: {}", self.name, e))
                })
            })
            .collect::<ScanResult<Vec<_>>>()?;

        Ok(schema.with_split_points(split_points))
    }

    /// Rows given either positionally or by column name
    pub fn native_rows(&self) -> ScanResult<Vec<Row>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, raw)| self.native_row(raw).map_err(|e| {
                ScanError::Storage(format!("Row {} of {}: {}", i, self.name, e))
            }))
            .collect()
    }

    fn native_row(&self, raw: &serde_json::Value) -> Result<Row, String> {
        let values = match raw {
            serde_json::Value::Array(items) => {
                if items.len() != self.columns.len() {
                    return Err(format!(
                        "expected {} values, got {}",
                        self.columns.len(),
                        items.len()
                    ));
                }
                items
                    .iter()
                    .zip(&self.columns)
                    .map(|(item, column)| Value::from_json(item, &column.sql_type))
                    .collect::<Result<Vec<_>, _>>()?
            }
            serde_json::Value::Object(fields) => {
                if let Some(unknown) = fields
                    .keys()
                    .find(|k| !self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(k)))
                {
                    return Err(format!("unknown column '{}'", unknown));
                }
                self.columns
                    .iter()
                    .map(|column| {
                        let item = fields
                            .iter()
                            .find(|(k, _)| k.eq_ignore_ascii_case(&column.name))
                            .map(|(_, v)| v)
                            .unwrap_or(&serde_json::Value::Null);
                        Value::from_json(item, &column.sql_type)
                    })
                    .collect::<Result<Vec<_>, _>>()?
            }
            other => return Err(format!("expected an array or object, got {}", other)),
        };
        Ok(Row::new(values))
    }
}
