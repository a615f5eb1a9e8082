// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Native row values
//!
//! Values as the backing store produces them, before any output decoding.
//! Supported types:
//! - Scalars: BOOL, INT64, FLOAT64, NUMERIC, STRING, BYTES
//! - Temporal: DATE, TIMESTAMP
//! - Documents and collections: JSON, ARRAY

use super::sql_type::SqlType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A single native column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Numeric(String),
    String(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Array(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Rough encoded size, used by partitioning heuristics
    pub fn estimated_size(&self) -> usize {
        match self {
            Value::Null | Value::Bool(_) => 1,
            Value::Int64(_) | Value::Float64(_) => 8,
            Value::Date(_) => 4,
            Value::Timestamp(_) => 12,
            Value::Numeric(s) | Value::String(s) => s.len(),
            Value::Bytes(b) => b.len(),
            Value::Json(j) => j.to_string().len(),
            Value::Array(items) => items.iter().map(Value::estimated_size).sum::<usize>() + 4,
        }
    }

    /// Total order used for keys, ORDER BY and predicates
    ///
    /// NULL sorts first. INT64 and FLOAT64 compare numerically; NUMERIC
    /// compares by decimal value. Mismatched types fall back to a fixed
    /// rank so the order stays total.
    pub fn sql_cmp(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::Float64(a), Value::Float64(b)) => a.total_cmp(b),
            (Value::Int64(a), Value::Float64(b)) => (*a as f64).total_cmp(b),
            (Value::Float64(a), Value::Int64(b)) => a.total_cmp(&(*b as f64)),
            (Value::Numeric(a), Value::Numeric(b)) => compare_decimal(a, b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Bytes(a), Value::Bytes(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            (Value::Json(a), Value::Json(b)) => a.to_string().cmp(&b.to_string()),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.sql_cmp(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => self.type_rank().cmp(&other.type_rank()),
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Int64(_) | Value::Float64(_) => 2,
            Value::Numeric(_) => 3,
            Value::String(_) => 4,
            Value::Bytes(_) => 5,
            Value::Date(_) => 6,
            Value::Timestamp(_) => 7,
            Value::Json(_) => 8,
            Value::Array(_) => 9,
        }
    }

    /// Convert a JSON fixture value into a native value of the given type
    pub fn from_json(json: &serde_json::Value, sql_type: &SqlType) -> Result<Value, String> {
        use serde_json::Value as Json;

        if json.is_null() {
            return Ok(Value::Null);
        }

        match (sql_type, json) {
            (SqlType::Bool, Json::Bool(b)) => Ok(Value::Bool(*b)),
            (SqlType::Int64, Json::Number(n)) => n
                .as_i64()
                .map(Value::Int64)
                .ok_or_else(|| format!("{} is not a valid INT64", n)),
            (SqlType::Int64, Json::String(s)) => s
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|_| format!("'{}' is not a valid INT64", s)),
            (SqlType::Float64, Json::Number(n)) => n
                .as_f64()
                .map(Value::Float64)
                .ok_or_else(|| format!("{} is not a valid FLOAT64", n)),
            (SqlType::Float64, Json::String(s)) => match s.as_str() {
                "NaN" => Ok(Value::Float64(f64::NAN)),
                "Infinity" => Ok(Value::Float64(f64::INFINITY)),
                "-Infinity" => Ok(Value::Float64(f64::NEG_INFINITY)),
                other => other
                    .parse::<f64>()
                    .map(Value::Float64)
                    .map_err(|_| format!("'{}' is not a valid FLOAT64", other)),
            },
            (SqlType::Numeric, Json::Number(n)) => Value::numeric(&n.to_string()),
            (SqlType::Numeric, Json::String(s)) => Value::numeric(s),
            (SqlType::String, Json::String(s)) => Ok(Value::String(s.clone())),
            (SqlType::Bytes, Json::String(s)) => STANDARD
                .decode(s)
                .map(Value::Bytes)
                .map_err(|e| format!("BYTES values must be base64: {}", e)),
            (SqlType::Date, Json::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(Value::Date)
                .map_err(|e| format!("'{}' is not a valid DATE: {}", s, e)),
            (SqlType::Timestamp, Json::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Value::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|e| format!("'{}' is not a valid TIMESTAMP: {}", s, e)),
            (SqlType::Json, other) => Ok(Value::Json(other.clone())),
            (SqlType::Array(element), Json::Array(items)) => items
                .iter()
                .map(|item| Value::from_json(item, element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            (ty, other) => Err(format!("Cannot store {} in a {} column", other, ty)),
        }
    }

    /// Build a NUMERIC value, validating the decimal text
    pub fn numeric(text: &str) -> Result<Value, String> {
        if is_decimal(text) {
            Ok(Value::Numeric(text.to_string()))
        } else {
            Err(format!("'{}' is not a valid NUMERIC", text))
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int64(i) => write!(f, "{}", i),
            Value::Float64(x) => write!(f, "{}", x),
            Value::Numeric(s) | Value::String(s) => write!(f, "{}", s),
            Value::Bytes(b) => write!(f, "{}", STANDARD.encode(b)),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(ts) => {
                write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            Value::Json(j) => write!(f, "{}", j),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

fn is_decimal(text: &str) -> bool {
    let unsigned = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    let mut parts = unsigned.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next();

    let digits_ok = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    match frac_part {
        Some(frac) => {
            digits_ok(int_part) && digits_ok(frac) && !(int_part.is_empty() && frac.is_empty())
        }
        None => !int_part.is_empty() && digits_ok(int_part),
    }
}

/// Split a validated decimal into (negative, integer digits, fraction digits)
fn split_decimal(text: &str) -> (bool, &str, &str) {
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };
    (
        negative,
        int_part.trim_start_matches('0'),
        frac_part.trim_end_matches('0'),
    )
}

fn compare_decimal(a: &str, b: &str) -> Ordering {
    let (a_neg, a_int, a_frac) = split_decimal(a);
    let (b_neg, b_int, b_frac) = split_decimal(b);

    // -0 and 0 are the same value
    let a_neg = a_neg && !(a_int.is_empty() && a_frac.is_empty());
    let b_neg = b_neg && !(b_int.is_empty() && b_frac.is_empty());

    match (a_neg, b_neg) {
        (false, true) => Ordering::Greater,
        (true, false) => Ordering::Less,
        _ => {
            let magnitude = a_int
                .len()
                .cmp(&b_int.len())
                .then_with(|| a_int.cmp(b_int))
                .then_with(|| a_frac.cmp(b_frac));
            if a_neg {
                magnitude.reverse()
            } else {
                magnitude
            }
        }
    }
}
