// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scan configuration: connection, query, partitioning and output options

use super::connection::ConnectionConfig;
use crate::bridge::OutputType;
use crate::error::{ScanError, ScanResult};
use crate::partition::PartitionOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Statement hint that lets the emulator partition queries it would otherwise reject
pub const EMULATOR_PARTITION_HINT: &str =
    "@{spanner_emulator.disable_query_partitionability_check=true}";

/// What to read: a raw query, or a table with optional projection and filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub select: Option<String>,
    #[serde(default, rename = "where")]
    pub where_clause: Option<String>,
    #[serde(default)]
    pub order_by: Option<String>,
}

impl QuerySpec {
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            query: Some(sql.into()),
            ..Default::default()
        }
    }

    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Default::default()
        }
    }

    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }

    pub fn with_where(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }

    pub fn with_order_by(mut self, order_by: impl Into<String>) -> Self {
        self.order_by = Some(order_by.into());
        self
    }

    /// Render the statement text
    pub fn to_sql(&self, use_emulator: bool) -> ScanResult<String> {
        let body = match (&self.query, &self.table) {
            (Some(_), Some(_)) => {
                return Err(ScanError::Configuration(
                    "'query' and 'table' are mutually exclusive".to_string(),
                ))
            }
            (None, None) => {
                return Err(ScanError::Configuration(
                    "Either 'query' or 'table' is required".to_string(),
                ))
            }
            (Some(query), None) => {
                if self.select.is_some() || self.where_clause.is_some() || self.order_by.is_some()
                {
                    return Err(ScanError::Configuration(
                        "'select', 'where' and 'order_by' require 'table'".to_string(),
                    ));
                }
                query.trim().to_string()
            }
            (None, Some(table)) => {
                let select = self.select.as_deref().unwrap_or("*");
                let mut sql = format!("SELECT {} FROM `{}`", select, table);
                if let Some(predicate) = &self.where_clause {
                    sql.push_str(" WHERE ");
                    sql.push_str(predicate);
                }
                if let Some(order_by) = &self.order_by {
                    sql.push_str(" ORDER BY ");
                    sql.push_str(order_by);
                }
                sql
            }
        };

        if use_emulator {
            Ok(format!("{}\n{}", EMULATOR_PARTITION_HINT, body))
        } else {
            Ok(body)
        }
    }
}

/// Per-column output override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnOption {
    pub value_type: OutputType,
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Full configuration of one scan run
///
/// The query fields sit at the top level of the document next to
/// `connection`, `partition`, `workers` and `column_options`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScanConfigDocument", into = "ScanConfigDocument")]
pub struct ScanConfig {
    pub connection: ConnectionConfig,
    pub query: QuerySpec,
    pub partition: PartitionOptions,
    pub workers: usize,
    pub column_options: BTreeMap<String, ColumnOption>,
}

// Flat on-disk layout. serde's `flatten` buffers numbers in a form that
// arbitrary-precision serde_json cannot read back, so the mapping is explicit.
#[derive(Serialize, Deserialize)]
struct ScanConfigDocument {
    connection: ConnectionConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    select: Option<String>,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    where_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    order_by: Option<String>,
    #[serde(default)]
    partition: PartitionOptions,
    #[serde(default = "default_workers")]
    workers: usize,
    #[serde(default)]
    column_options: BTreeMap<String, ColumnOption>,
}

impl From<ScanConfigDocument> for ScanConfig {
    fn from(doc: ScanConfigDocument) -> Self {
        Self {
            connection: doc.connection,
            query: QuerySpec {
                query: doc.query,
                table: doc.table,
                select: doc.select,
                where_clause: doc.where_clause,
                order_by: doc.order_by,
            },
            partition: doc.partition,
            workers: doc.workers,
            column_options: doc.column_options,
        }
    }
}

impl From<ScanConfig> for ScanConfigDocument {
    fn from(config: ScanConfig) -> Self {
        Self {
            connection: config.connection,
            query: config.query.query,
            table: config.query.table,
            select: config.query.select,
            where_clause: config.query.where_clause,
            order_by: config.query.order_by,
            partition: config.partition,
            workers: config.workers,
            column_options: config.column_options,
        }
    }
}

impl ScanConfig {
    pub fn new(connection: ConnectionConfig, query: QuerySpec) -> Self {
        Self {
            connection,
            query,
            partition: PartitionOptions::default(),
            workers: default_workers(),
            column_options: BTreeMap::new(),
        }
    }

    /// Parse a JSON configuration document
    pub fn from_json(json: &str) -> ScanResult<Self> {
        let config: ScanConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> ScanResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ScanError::Configuration(format!("Cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> ScanResult<()> {
        self.connection.validate()?;
        if self.workers == 0 {
            return Err(ScanError::Configuration(
                "'workers' must be at least 1".to_string(),
            ));
        }
        self.query.to_sql(self.connection.use_emulator).map(|_| ())
    }

    /// Statement text, including the emulator hint when applicable
    pub fn sql(&self) -> ScanResult<String> {
        self.query.to_sql(self.connection.use_emulator)
    }

    pub fn value_type_overrides(&self) -> BTreeMap<String, OutputType> {
        self.column_options
            .iter()
            .map(|(name, option)| (name.clone(), option.value_type))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_query_rendering() {
        let spec = QuerySpec::table("Singers")
            .with_select("id, name")
            .with_where("id > 3")
            .with_order_by("id");
        assert_eq!(
            spec.to_sql(false).unwrap(),
            "SELECT id, name FROM `Singers` WHERE id > 3 ORDER BY id"
        );
        assert_eq!(
            QuerySpec::table("T").to_sql(false).unwrap(),
            "SELECT * FROM `T`"
        );
    }

    #[test]
    fn test_emulator_hint_prefix() {
        let sql = QuerySpec::raw("select v from T").to_sql(true).unwrap();
        assert_eq!(
            sql,
            "@{spanner_emulator.disable_query_partitionability_check=true}\nselect v from T"
        );
    }

    #[test]
    fn test_query_and_table_are_exclusive() {
        let mut spec = QuerySpec::raw("select 1");
        spec.table = Some("T".into());
        assert!(matches!(spec.to_sql(false), Err(ScanError::Configuration(_))));
        assert!(matches!(
            QuerySpec::default().to_sql(false),
            Err(ScanError::Configuration(_))
        ));
        assert!(matches!(
            QuerySpec::raw("select 1").with_where("x = 1").to_sql(false),
            Err(ScanError::Configuration(_))
        ));
    }

    #[test]
    fn test_scan_config_from_json() {
        let config = ScanConfig::from_json(
            r#"{
                "connection": {
                    "project_id": "test-project",
                    "instance_id": "test-instance",
                    "database_id": "test-database",
                    "port": 9010,
                    "use_emulator": true
                },
                "table": "Singers",
                "where": "id > 1",
                "workers": 3,
                "partition": {"max_partitions": 16},
                "column_options": {"payload": {"value_type": "string"}}
            }"#,
        )
        .unwrap();

        assert_eq!(config.workers, 3);
        assert_eq!(config.connection.port, Some(9010));
        assert_eq!(config.partition.max_partitions, Some(16));
        assert_eq!(
            config.value_type_overrides().get("payload"),
            Some(&OutputType::String)
        );
        assert!(config.sql().unwrap().ends_with("SELECT * FROM `Singers` WHERE id > 1"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = ScanConfig::from_json(
            r#"{
                "connection": {
                    "project_id": "test-project",
                    "instance_id": "test-instance",
                    "database_id": "test-database"
                },
                "query": "select 1",
                "workers": 0
            }"#,
        );
        assert!(matches!(result, Err(ScanError::Configuration(_))));
    }
}
