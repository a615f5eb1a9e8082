// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result formatting for CLI output

use crate::cli::commands::OutputFormat;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use partscan::{OutputColumn, OutputRow, OutputValue, RunSummary};

/// Result formatter for different output formats
pub struct ResultFormatter;

impl ResultFormatter {
    /// Format scanned rows in the specified format
    pub fn format(
        columns: &[OutputColumn],
        rows: &[OutputRow],
        summary: &RunSummary,
        format: OutputFormat,
    ) -> String {
        match format {
            OutputFormat::Table => Self::format_table(columns, rows, summary),
            OutputFormat::Json => Self::format_json(columns, rows, summary),
            OutputFormat::Csv => Self::format_csv(columns, rows),
        }
    }

    /// Format rows as a table using comfy-table
    fn format_table(columns: &[OutputColumn], rows: &[OutputRow], summary: &RunSummary) -> String {
        if rows.is_empty() {
            return format!("{}\n", "No rows found".yellow());
        }

        let mut output = String::new();

        output.push_str(&format!("{}\n", "Scan Results".bold().green()));
        output.push_str(&format!("Read path: {}\n", summary.path));
        output.push_str(&format!(
            "Elapsed: {} ms\n",
            summary.elapsed.as_millis()
        ));
        output.push_str(&format!("Rows returned: {}\n\n", rows.len()));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);

        let header_cells: Vec<Cell> = columns
            .iter()
            .map(|col| Cell::new(&col.name).fg(Color::Green))
            .collect();
        table.set_header(header_cells);

        for row in rows {
            let row_values: Vec<String> = row
                .values
                .iter()
                .map(Self::value_to_string)
                .collect();
            table.add_row(row_values);
        }

        output.push_str(&table.to_string());
        output.push('\n');

        if summary.stats.skipped_empty > 0 {
            output.push_str(&format!(
                "\n{}\n",
                format!("{} empty partitions skipped", summary.stats.skipped_empty).yellow()
            ));
        }

        output
    }

    /// Format rows as JSON
    fn format_json(columns: &[OutputColumn], rows: &[OutputRow], summary: &RunSummary) -> String {
        let json_result = serde_json::json!({
            "status": "success",
            "columns": columns.iter().map(|col| serde_json::json!({
                "name": col.name,
                "type": col.output_type.to_string(),
                "source_type": col.source_type.to_string(),
            })).collect::<Vec<_>>(),
            "rows": rows.iter().map(|row| {
                let mut row_map = serde_json::Map::new();
                for (col, value) in columns.iter().zip(&row.values) {
                    row_map.insert(col.name.clone(), value.to_json());
                }
                serde_json::Value::Object(row_map)
            }).collect::<Vec<_>>(),
            "row_count": rows.len(),
            "path": summary.path.to_string(),
            "partitions": {
                "claimed": summary.stats.claimed,
                "skipped_empty": summary.stats.skipped_empty,
                "delivered": summary.stats.delivered,
            },
            "elapsed_ms": summary.elapsed.as_millis() as u64,
        });

        serde_json::to_string_pretty(&json_result).unwrap_or_else(|_| {
            "{\"status\": \"error\", \"error\": \"Could not serialize results to JSON\"}".to_string()
        })
    }

    /// Format rows as CSV
    fn format_csv(columns: &[OutputColumn], rows: &[OutputRow]) -> String {
        let mut output = String::new();

        let header: Vec<String> = columns.iter().map(|col| Self::csv_escape(&col.name)).collect();
        output.push_str(&header.join(","));
        output.push('\n');

        for row in rows {
            let row_values: Vec<String> = row
                .values
                .iter()
                .map(|v| Self::csv_escape(&v.to_string()))
                .collect();
            output.push_str(&row_values.join(","));
            output.push('\n');
        }

        output
    }

    fn value_to_string(value: &OutputValue) -> String {
        match value {
            OutputValue::Null => "NULL".to_string(),
            other => other.to_string(),
        }
    }

    fn csv_escape(s: &str) -> String {
        if s.contains(',') || s.contains('"') || s.contains('\n') {
            format!("\"{}\"", s.replace('"', "\"\""))
        } else {
            s.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partscan::{CursorStats, OutputType, ScanPath, SqlType};
    use std::time::Duration;

    fn fixture() -> (Vec<OutputColumn>, Vec<OutputRow>, RunSummary) {
        let columns = vec![
            OutputColumn {
                name: "id".into(),
                output_type: OutputType::Long,
                source_type: SqlType::Int64,
            },
            OutputColumn {
                name: "name".into(),
                output_type: OutputType::String,
                source_type: SqlType::String,
            },
        ];
        let rows = vec![
            OutputRow {
                values: vec![OutputValue::Long(1), OutputValue::String("a,\"b\"".into())],
            },
            OutputRow {
                values: vec![OutputValue::Long(2), OutputValue::Null],
            },
        ];
        let summary = RunSummary {
            path: ScanPath::Partitioned { partitions: 2 },
            batches: 2,
            rows: 2,
            stats: CursorStats {
                claimed: 2,
                skipped_empty: 0,
                delivered: 2,
                re_executions: 2,
            },
            elapsed: Duration::from_millis(3),
        };
        (columns, rows, summary)
    }

    #[test]
    fn test_csv_quotes_special_characters() {
        let (columns, rows, _) = fixture();
        assert_eq!(
            ResultFormatter::format_csv(&columns, &rows),
            "id,name\n1,\"a,\"\"b\"\"\"\n2,\n"
        );
    }

    #[test]
    fn test_json_uses_column_names() {
        let (columns, rows, summary) = fixture();
        let json: serde_json::Value =
            serde_json::from_str(&ResultFormatter::format_json(&columns, &rows, &summary)).unwrap();
        assert_eq!(json["row_count"], serde_json::json!(2));
        assert_eq!(json["rows"][1]["name"], serde_json::Value::Null);
        assert_eq!(json["columns"][0]["source_type"], "INT64");
    }
}
