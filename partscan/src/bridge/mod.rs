// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row bridge: native rows to output rows
//!
//! Each result column gets an output type, either from the default mapping
//! or from a per-column `value_type` override. Decoded rows always have
//! exactly the output schema's width.

pub mod array;
pub mod output;

pub use array::array_to_json;
pub use output::{OutputColumn, OutputRow, OutputType, OutputValue};

use crate::error::{ScanError, ScanResult};
use crate::transaction::RowBatchStream;
use crate::types::{ColumnMeta, Row, Value};
use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// Decodes native rows into output rows for a fixed schema
#[derive(Debug, Clone, PartialEq)]
pub struct RowBridge {
    columns: Vec<OutputColumn>,
}

/// Output type override for a column, names matched case-insensitively
pub fn override_for(overrides: &BTreeMap<String, OutputType>, column: &str) -> Option<OutputType> {
    overrides.get(column).copied().or_else(|| {
        overrides
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, output_type)| *output_type)
    })
}

impl RowBridge {
    /// Build the output schema for result columns
    ///
    /// `overrides` maps column names to the output type to use instead of
    /// the default mapping.
    pub fn for_columns(
        columns: &[ColumnMeta],
        overrides: &BTreeMap<String, OutputType>,
    ) -> ScanResult<Self> {
        let columns = columns
            .iter()
            .map(|column| {
                let output_type = override_for(overrides, &column.name)
                    .or_else(|| OutputType::default_for(&column.sql_type))
                    .ok_or_else(|| {
                        ScanError::Unsupported(format!(
                            "Column {} of type {} has no default output type; set 'value_type' in its column option",
                            column.name, column.sql_type
                        ))
                    })?;
                Ok(OutputColumn {
                    name: column.name.clone(),
                    output_type,
                    source_type: column.sql_type.clone(),
                })
            })
            .collect::<ScanResult<Vec<_>>>()?;
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[OutputColumn] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Decode one native row
    pub fn decode_row(&self, row: &Row) -> ScanResult<OutputRow> {
        if row.len() != self.columns.len() {
            return Err(ScanError::SchemaMismatch {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }

        let values = row
            .values
            .iter()
            .zip(&self.columns)
            .map(|(value, column)| {
                convert(value, column.output_type).map_err(|message| {
                    ScanError::Decode(format!("column {}: {}", column.name, message))
                })
            })
            .collect::<ScanResult<Vec<_>>>()?;
        Ok(OutputRow { values })
    }

    /// Drain a batch and decode every row
    pub fn decode(&self, batch: RowBatchStream) -> ScanResult<Vec<OutputRow>> {
        let mut rows = Vec::new();
        for row in batch {
            rows.push(self.decode_row(&row?)?);
        }
        Ok(rows)
    }
}

fn convert(value: &Value, output_type: OutputType) -> Result<OutputValue, String> {
    if value.is_null() {
        return Ok(OutputValue::Null);
    }

    match output_type {
        OutputType::Boolean => to_boolean(value).map(OutputValue::Boolean),
        OutputType::Long => to_long(value).map(OutputValue::Long),
        OutputType::Double => to_double(value).map(OutputValue::Double),
        OutputType::String => Ok(OutputValue::String(to_text(value))),
        OutputType::Timestamp => to_timestamp(value).map(OutputValue::Timestamp),
        OutputType::Json => to_json(value).map(OutputValue::Json),
    }
}

fn unconvertible(value: &Value, target: &str) -> String {
    format!("cannot convert {} to {}", value, target)
}

fn to_boolean(value: &Value) -> Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Int64(i) => Ok(*i != 0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(unconvertible(value, "boolean")),
        },
        _ => Err(unconvertible(value, "boolean")),
    }
}

fn to_long(value: &Value) -> Result<i64, String> {
    match value {
        Value::Int64(i) => Ok(*i),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Float64(x) if x.is_finite() && *x >= i64::MIN as f64 && *x < i64::MAX as f64 => {
            Ok(x.trunc() as i64)
        }
        Value::Numeric(text) => {
            let integral = text.split('.').next().unwrap_or(text);
            integral
                .parse::<i64>()
                .map_err(|_| unconvertible(value, "long"))
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| unconvertible(value, "long")),
        _ => Err(unconvertible(value, "long")),
    }
}

fn to_double(value: &Value) -> Result<f64, String> {
    match value {
        Value::Float64(x) => Ok(*x),
        Value::Int64(i) => Ok(*i as f64),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Numeric(text) | Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| unconvertible(value, "double")),
        _ => Err(unconvertible(value, "double")),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Array(items) => array_to_json(items).to_string(),
        other => other.to_string(),
    }
}

fn to_timestamp(value: &Value) -> Result<DateTime<Utc>, String> {
    match value {
        Value::Timestamp(ts) => Ok(*ts),
        Value::Date(date) => Ok(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))),
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| unconvertible(value, "timestamp")),
        _ => Err(unconvertible(value, "timestamp")),
    }
}

fn to_json(value: &Value) -> Result<serde_json::Value, String> {
    match value {
        Value::Json(j) => Ok(j.clone()),
        Value::Array(items) => Ok(array_to_json(items)),
        Value::String(s) => serde_json::from_str(s).map_err(|_| unconvertible(value, "json")),
        other => Ok(array::element_to_json(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SqlType;
    use chrono::NaiveDate;

    fn bridge(
        columns: Vec<(&str, SqlType)>,
        overrides: &[(&str, OutputType)],
    ) -> ScanResult<RowBridge> {
        let columns: Vec<ColumnMeta> = columns
            .into_iter()
            .map(|(name, ty)| ColumnMeta::new(name, ty))
            .collect();
        let overrides = overrides
            .iter()
            .map(|(name, ty)| (name.to_string(), *ty))
            .collect();
        RowBridge::for_columns(&columns, &overrides)
    }

    #[test]
    fn test_bytes_need_an_override() {
        assert!(matches!(
            bridge(vec![("payload", SqlType::Bytes)], &[]),
            Err(ScanError::Unsupported(_))
        ));

        let bridge = bridge(
            vec![("payload", SqlType::Bytes)],
            &[("payload", OutputType::String)],
        )
        .unwrap();
        let row = bridge
            .decode_row(&Row::new(vec![Value::Bytes(vec![0xff, 0xe0])]))
            .unwrap();
        assert_eq!(row.values, vec![OutputValue::String("/+A=".into())]);
    }

    #[test]
    fn test_column_options_match_names_case_insensitively() {
        let bridge = bridge(
            vec![("Payload", SqlType::Bytes), ("id", SqlType::Int64)],
            &[("PAYLOAD", OutputType::String), ("ID", OutputType::String)],
        )
        .unwrap();
        let types: Vec<OutputType> = bridge.columns().iter().map(|c| c.output_type).collect();
        assert_eq!(types, vec![OutputType::String, OutputType::String]);
    }

    #[test]
    fn test_exact_column_option_wins() {
        let overrides: BTreeMap<String, OutputType> = [
            ("id".to_string(), OutputType::Double),
            ("ID".to_string(), OutputType::String),
        ]
        .into_iter()
        .collect();
        assert_eq!(override_for(&overrides, "id"), Some(OutputType::Double));
        assert_eq!(override_for(&overrides, "Id"), Some(OutputType::String));
        assert_eq!(override_for(&overrides, "name"), None);
    }

    #[test]
    fn test_default_conversions() {
        let bridge = bridge(
            vec![
                ("b", SqlType::Bool),
                ("n", SqlType::Numeric),
                ("d", SqlType::Date),
                ("a", SqlType::Array(Box::new(SqlType::Int64))),
                ("s", SqlType::String),
            ],
            &[],
        )
        .unwrap();

        let row = bridge
            .decode_row(&Row::new(vec![
                Value::Bool(true),
                Value::Numeric("1.25".into()),
                Value::Date(NaiveDate::from_ymd_opt(2021, 11, 16).unwrap()),
                Value::Array(vec![Value::Int64(1), Value::Null]),
                Value::Null,
            ]))
            .unwrap();

        assert_eq!(row.values[0], OutputValue::Boolean(true));
        assert_eq!(row.values[1], OutputValue::Double(1.25));
        assert_eq!(
            row.values[2],
            OutputValue::Timestamp(Utc.with_ymd_and_hms(2021, 11, 16, 0, 0, 0).unwrap())
        );
        assert_eq!(row.values[3], OutputValue::Json(serde_json::json!([1, null])));
        assert_eq!(row.values[4], OutputValue::Null);
    }

    #[test]
    fn test_numeric_as_string_keeps_digits() {
        let bridge = bridge(vec![("n", SqlType::Numeric)], &[("n", OutputType::String)]).unwrap();
        let digits = "12345678901234567890.123456789";
        let row = bridge
            .decode_row(&Row::new(vec![Value::Numeric(digits.into())]))
            .unwrap();
        assert_eq!(row.values, vec![OutputValue::String(digits.into())]);
    }

    #[test]
    fn test_width_mismatch_is_schema_error() {
        let bridge = bridge(vec![("a", SqlType::Int64), ("b", SqlType::Int64)], &[]).unwrap();
        assert_eq!(
            bridge.decode_row(&Row::new(vec![Value::Int64(1)])).unwrap_err(),
            ScanError::SchemaMismatch {
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_conversion_failure_names_the_column() {
        let bridge = bridge(vec![("s", SqlType::String)], &[("s", OutputType::Long)]).unwrap();
        match bridge.decode_row(&Row::new(vec![Value::String("abc".into())])) {
            Err(ScanError::Decode(message)) => assert!(message.starts_with("column s:")),
            other => panic!("unexpected result {:?}", other),
        }
    }
}
