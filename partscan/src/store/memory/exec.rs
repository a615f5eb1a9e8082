// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query binding, evaluation and key-space splitting for the in-process store

use super::sql::{CompareOp, Literal, OrderKey, Predicate, Projection, SelectQuery, SqlError};
use super::table::{Key, TableData, TableSchema};
use crate::types::{ColumnMeta, Row, SqlType, Value};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ops::Bound;

/// Slice of a table a partition token covers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum Scope {
    /// The complete query, ORDER BY and LIMIT included
    WholeQuery,
    /// Keys in `[start, end)`; `None` is unbounded
    KeyRange {
        start: Option<Value>,
        end: Option<Value>,
    },
    /// Rows at positions `[start, end)` of the snapshot
    RowRange { start: usize, end: usize },
}

/// Query resolved against a table schema
#[derive(Debug, Clone)]
pub(crate) struct BoundQuery {
    pub columns: Vec<ColumnMeta>,
    projection: Vec<usize>,
    filters: Vec<BoundPredicate>,
    order_by: Vec<(usize, bool)>,
    limit: Option<u64>,
}

#[derive(Debug, Clone)]
enum BoundPredicate {
    Compare { index: usize, op: CompareOp, value: Value },
    IsNull { index: usize, negated: bool },
}

pub(crate) fn bind(query: &SelectQuery, schema: &TableSchema) -> Result<BoundQuery, SqlError> {
    let resolve = |column: &str| {
        schema
            .column_index(column)
            .ok_or_else(|| SqlError::UnknownColumn {
                table: schema.name.clone(),
                column: column.to_string(),
            })
    };

    let projection = match &query.projection {
        Projection::All => (0..schema.columns.len()).collect(),
        Projection::Columns(names) => names
            .iter()
            .map(|name| resolve(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?,
    };
    let columns = projection
        .iter()
        .map(|&i| schema.columns[i].clone())
        .collect();

    let mut filters = Vec::with_capacity(query.filters.len());
    for predicate in &query.filters {
        filters.push(match predicate {
            Predicate::Compare {
                column,
                op,
                literal,
            } => {
                let index = resolve(column.as_str())?;
                let column_meta = &schema.columns[index];
                let value = coerce_literal(literal, &column_meta.sql_type).map_err(|message| {
                    SqlError::InvalidLiteral {
                        column: column_meta.name.clone(),
                        message,
                    }
                })?;
                BoundPredicate::Compare {
                    index,
                    op: *op,
                    value,
                }
            }
            Predicate::IsNull { column, negated } => BoundPredicate::IsNull {
                index: resolve(column.as_str())?,
                negated: *negated,
            },
        });
    }

    let order_by = query
        .order_by
        .iter()
        .map(|OrderKey { column, descending }| resolve(column.as_str()).map(|i| (i, *descending)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(BoundQuery {
        columns,
        projection,
        filters,
        order_by,
        limit: query.limit,
    })
}

fn coerce_literal(literal: &Literal, sql_type: &SqlType) -> Result<Value, String> {
    match (literal, sql_type) {
        (Literal::Null, _) => Ok(Value::Null),
        (Literal::Bool(b), SqlType::Bool) => Ok(Value::Bool(*b)),
        (Literal::Int(i), SqlType::Int64) => Ok(Value::Int64(*i)),
        (Literal::Int(i), SqlType::Float64) => Ok(Value::Float64(*i as f64)),
        (Literal::Float(x), SqlType::Float64) => Ok(Value::Float64(*x)),
        (Literal::Int(i), SqlType::Numeric) => Value::numeric(&i.to_string()),
        (Literal::Float(x), SqlType::Numeric) => Value::numeric(&x.to_string()),
        (Literal::String(s), SqlType::Numeric) => Value::numeric(s),
        (Literal::String(s), SqlType::String) => Ok(Value::String(s.clone())),
        (Literal::String(s), SqlType::Date) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Value::Date)
            .map_err(|e| format!("'{}' is not a DATE: {}", s, e)),
        (Literal::String(s), SqlType::Timestamp) => DateTime::parse_from_rfc3339(s)
            .map(|ts| Value::Timestamp(ts.with_timezone(&Utc)))
            .map_err(|e| format!("'{}' is not a TIMESTAMP: {}", s, e)),
        (literal, ty) => Err(format!("{:?} cannot be compared with {}", literal, ty)),
    }
}

impl BoundQuery {
    fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|filter| match filter {
            BoundPredicate::IsNull { index, negated } => {
                let is_null = row.get(*index).map(Value::is_null).unwrap_or(true);
                is_null != *negated
            }
            BoundPredicate::Compare { index, op, value } => {
                let Some(actual) = row.get(*index) else {
                    return false;
                };
                // Comparisons with NULL are never true
                if actual.is_null() || value.is_null() {
                    return false;
                }
                let ord = actual.sql_cmp(value);
                match op {
                    CompareOp::Eq => ord == Ordering::Equal,
                    CompareOp::NotEq => ord != Ordering::Equal,
                    CompareOp::Lt => ord == Ordering::Less,
                    CompareOp::LtEq => ord != Ordering::Greater,
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::GtEq => ord != Ordering::Less,
                }
            }
        })
    }

    fn project(&self, row: &Row) -> Row {
        Row::new(
            self.projection
                .iter()
                .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// Filter, order, limit and project the given rows
    pub fn run<'a>(&self, rows: impl Iterator<Item = &'a Row>) -> Vec<Row> {
        let mut selected: Vec<&Row> = rows.filter(|row| self.matches(row)).collect();

        if !self.order_by.is_empty() {
            selected.sort_by(|a, b| {
                for &(index, descending) in &self.order_by {
                    let ord = match (a.get(index), b.get(index)) {
                        (Some(x), Some(y)) => x.sql_cmp(y),
                        _ => Ordering::Equal,
                    };
                    let ord = if descending { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let limit = self
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        selected
            .into_iter()
            .take(limit)
            .map(|row| self.project(row))
            .collect()
    }
}

/// Rows of a snapshot that fall into a scope, in key order
pub(crate) fn rows_in_scope<'a>(
    data: &'a TableData,
    scope: &Scope,
) -> Box<dyn Iterator<Item = &'a Row> + 'a> {
    match scope {
        Scope::WholeQuery => Box::new(data.values()),
        Scope::KeyRange { start, end } => {
            let lower = match start {
                Some(v) => Bound::Included(Key(v.clone())),
                None => Bound::Unbounded,
            };
            let upper = match end {
                Some(v) => Bound::Excluded(Key(v.clone())),
                None => Bound::Unbounded,
            };
            if range_is_empty(&lower, &upper) {
                return Box::new(std::iter::empty());
            }
            Box::new(data.range((lower, upper)).map(|(_, row)| row))
        }
        Scope::RowRange { start, end } => Box::new(
            data.values()
                .skip(*start)
                .take(end.saturating_sub(*start)),
        ),
    }
}

// BTreeMap::range panics on inverted bounds
fn range_is_empty(lower: &Bound<Key>, upper: &Bound<Key>) -> bool {
    match (lower, upper) {
        (Bound::Included(a), Bound::Excluded(b)) => a >= b,
        _ => false,
    }
}

/// Split a snapshot into at most `desired` scopes
///
/// Explicit split points win. INT64 keys are cut into equal-width key ranges
/// between the smallest and largest key, so sparse key spaces yield empty
/// slices. Other key types are cut by row position.
pub(crate) fn split_scopes(data: &TableData, schema: &TableSchema, desired: u64) -> Vec<Scope> {
    if data.is_empty() {
        return Vec::new();
    }

    if !schema.split_points.is_empty() {
        return ranges_from_boundaries(schema.split_points.clone());
    }

    let desired = usize::try_from(desired).unwrap_or(usize::MAX).max(1);
    if desired == 1 {
        return vec![Scope::KeyRange {
            start: None,
            end: None,
        }];
    }

    match schema.key_type() {
        Some(SqlType::Int64) => {
            let min = data.keys().next().and_then(|k| k.0.as_i64());
            let max = data.keys().next_back().and_then(|k| k.0.as_i64());
            match (min, max) {
                (Some(min), Some(max)) => {
                    ranges_from_boundaries(int_boundaries(min, max, desired))
                }
                _ => vec![Scope::KeyRange {
                    start: None,
                    end: None,
                }],
            }
        }
        _ => {
            let total = data.len();
            let count = desired.min(total);
            (0..count)
                .map(|i| Scope::RowRange {
                    start: i * total / count,
                    end: (i + 1) * total / count,
                })
                .collect()
        }
    }
}

fn int_boundaries(min: i64, max: i64, desired: usize) -> Vec<Value> {
    let span = i128::from(max) - i128::from(min) + 1;
    let count = (desired as i128).min(span).max(1);
    let width = (span + count - 1) / count;

    (1..count)
        .filter_map(|k| i64::try_from(i128::from(min) + k * width).ok())
        .filter(|b| *b <= max)
        .map(Value::Int64)
        .collect()
}

fn ranges_from_boundaries(boundaries: Vec<Value>) -> Vec<Scope> {
    let mut scopes = Vec::with_capacity(boundaries.len() + 1);
    let mut start = None;
    for boundary in boundaries {
        scopes.push(Scope::KeyRange {
            start: start.take(),
            end: Some(boundary.clone()),
        });
        start = Some(boundary);
    }
    scopes.push(Scope::KeyRange { start, end: None });
    scopes
}
