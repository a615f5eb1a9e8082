// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! ARRAY values as JSON documents

use crate::types::Value;
use serde_json::{Number, Value as Json};
use std::str::FromStr;

/// Convert array elements to a JSON array
///
/// Integral, floating-point, boolean, textual and decimal elements keep
/// their JSON kind; decimals keep every digit. Anything else is rendered
/// as text.
pub fn array_to_json(items: &[Value]) -> Json {
    Json::Array(items.iter().map(element_to_json).collect())
}

pub(crate) fn element_to_json(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Array(inner) => array_to_json(inner),
        Value::Int64(i) => Json::from(*i),
        Value::Float64(x) => Number::from_f64(*x)
            .map(Json::Number)
            .unwrap_or_else(|| Json::String(x.to_string())),
        Value::Bool(b) => Json::Bool(*b),
        Value::String(s) => Json::String(s.clone()),
        Value::Numeric(text) => Number::from_str(text)
            .map(Json::Number)
            .unwrap_or_else(|_| Json::String(text.clone())),
        other => Json::String(other.to_string()),
    }
}
