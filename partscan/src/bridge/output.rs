// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Output row representation consumed by the ingestion pipeline

use crate::types::SqlType;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Value types of the output schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    Boolean,
    Long,
    Double,
    String,
    Timestamp,
    Json,
}

impl OutputType {
    /// Mapping used when no column option overrides it
    ///
    /// BYTES has no default and needs an explicit `value_type`.
    pub fn default_for(sql_type: &SqlType) -> Option<OutputType> {
        match sql_type {
            SqlType::Bool => Some(OutputType::Boolean),
            SqlType::Int64 => Some(OutputType::Long),
            SqlType::Float64 | SqlType::Numeric => Some(OutputType::Double),
            SqlType::String => Some(OutputType::String),
            SqlType::Date | SqlType::Timestamp => Some(OutputType::Timestamp),
            SqlType::Json | SqlType::Array(_) => Some(OutputType::Json),
            SqlType::Bytes => None,
        }
    }
}

impl std::str::FromStr for OutputType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "boolean" => Ok(OutputType::Boolean),
            "long" => Ok(OutputType::Long),
            "double" => Ok(OutputType::Double),
            "string" => Ok(OutputType::String),
            "timestamp" => Ok(OutputType::Timestamp),
            "json" => Ok(OutputType::Json),
            _ => Err(format!(
                "Unknown value type: {}. Valid options: boolean, long, double, string, timestamp, json",
                s
            )),
        }
    }
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputType::Boolean => "boolean",
            OutputType::Long => "long",
            OutputType::Double => "double",
            OutputType::String => "string",
            OutputType::Timestamp => "timestamp",
            OutputType::Json => "json",
        };
        write!(f, "{}", name)
    }
}

/// One decoded output value
#[derive(Debug, Clone, PartialEq)]
pub enum OutputValue {
    Null,
    Boolean(bool),
    Long(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
}

impl OutputValue {
    pub fn is_null(&self) -> bool {
        matches!(self, OutputValue::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            OutputValue::Null => Json::Null,
            OutputValue::Boolean(b) => Json::Bool(*b),
            OutputValue::Long(i) => Json::from(*i),
            OutputValue::Double(x) => serde_json::Number::from_f64(*x)
                .map(Json::Number)
                .unwrap_or_else(|| Json::String(x.to_string())),
            OutputValue::String(s) => Json::String(s.clone()),
            OutputValue::Timestamp(ts) => {
                Json::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            OutputValue::Json(j) => j.clone(),
        }
    }
}

impl fmt::Display for OutputValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputValue::Null => write!(f, ""),
            OutputValue::Boolean(b) => write!(f, "{}", b),
            OutputValue::Long(i) => write!(f, "{}", i),
            OutputValue::Double(x) => write!(f, "{}", x),
            OutputValue::String(s) => write!(f, "{}", s),
            OutputValue::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            OutputValue::Json(j) => write!(f, "{}", j),
        }
    }
}

/// Output schema entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    pub name: String,
    pub output_type: OutputType,
    pub source_type: SqlType,
}

/// One decoded row, values in output schema order
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub values: Vec<OutputValue>,
}

impl OutputRow {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&OutputValue> {
        self.values.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mapping() {
        assert_eq!(OutputType::default_for(&SqlType::Numeric), Some(OutputType::Double));
        assert_eq!(OutputType::default_for(&SqlType::Date), Some(OutputType::Timestamp));
        assert_eq!(
            OutputType::default_for(&SqlType::Array(Box::new(SqlType::Int64))),
            Some(OutputType::Json)
        );
        assert_eq!(OutputType::default_for(&SqlType::Bytes), None);
    }

    #[test]
    fn test_output_type_parse_and_display() {
        assert_eq!("JSON".parse::<OutputType>().unwrap(), OutputType::Json);
        assert!("blob".parse::<OutputType>().is_err());
        assert_eq!(OutputType::Timestamp.to_string(), "timestamp");
    }

    #[test]
    fn test_non_finite_double_to_json() {
        assert_eq!(
            OutputValue::Double(f64::INFINITY).to_json(),
            serde_json::Value::String("inf".into())
        );
    }
}
