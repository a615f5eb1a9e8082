// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Column types of the backing store

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Declared type of a stored or projected column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SqlType {
    Bool,
    Int64,
    Float64,
    /// Fixed-point decimal, carried as text to keep every digit
    Numeric,
    String,
    Bytes,
    Date,
    Timestamp,
    Json,
    Array(Box<SqlType>),
}

impl SqlType {
    /// Whether values of this type can serve as a primary key
    pub fn is_key_type(&self) -> bool {
        !matches!(self, SqlType::Json | SqlType::Array(_) | SqlType::Float64)
    }

    /// Element type for arrays
    pub fn element_type(&self) -> Option<&SqlType> {
        match self {
            SqlType::Array(inner) => Some(inner),
            _ => None,
        }
    }
}

impl FromStr for SqlType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase();

        if let Some(inner) = normalized
            .strip_prefix("ARRAY<")
            .and_then(|rest| rest.strip_suffix('>'))
        {
            let element: SqlType = inner.parse()?;
            if matches!(element, SqlType::Array(_)) {
                return Err("Nested ARRAY columns are not supported".to_string());
            }
            return Ok(SqlType::Array(Box::new(element)));
        }

        // STRING(MAX), BYTES(1024) and friends carry a length we do not enforce
        let base = match normalized.find('(') {
            Some(pos) if normalized.ends_with(')') => &normalized[..pos],
            _ => normalized.as_str(),
        };

        match base.trim() {
            "BOOL" | "BOOLEAN" => Ok(SqlType::Bool),
            "INT64" => Ok(SqlType::Int64),
            "FLOAT64" => Ok(SqlType::Float64),
            "NUMERIC" => Ok(SqlType::Numeric),
            "STRING" => Ok(SqlType::String),
            "BYTES" => Ok(SqlType::Bytes),
            "DATE" => Ok(SqlType::Date),
            "TIMESTAMP" => Ok(SqlType::Timestamp),
            "JSON" => Ok(SqlType::Json),
            _ => Err(format!("Unknown column type: {}", s)),
        }
    }
}

impl TryFrom<String> for SqlType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SqlType> for String {
    fn from(value: SqlType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Bool => write!(f, "BOOL"),
            SqlType::Int64 => write!(f, "INT64"),
            SqlType::Float64 => write!(f, "FLOAT64"),
            SqlType::Numeric => write!(f, "NUMERIC"),
            SqlType::String => write!(f, "STRING"),
            SqlType::Bytes => write!(f, "BYTES"),
            SqlType::Date => write!(f, "DATE"),
            SqlType::Timestamp => write!(f, "TIMESTAMP"),
            SqlType::Json => write!(f, "JSON"),
            SqlType::Array(inner) => write!(f, "ARRAY<{}>", inner),
        }
    }
}
