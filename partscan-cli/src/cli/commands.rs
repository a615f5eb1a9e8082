// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command-line argument definitions

use clap::{Args, Parser, Subcommand, ValueEnum};
use partscan::QuerySpec;
use std::path::PathBuf;

/// partscan - partitioned snapshot reads
#[derive(Parser, Debug)]
#[command(name = "partscan", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (ignored when --verbose is set)
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read every partition of a query and print the rows
    Scan {
        /// Scan configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Fixture (JSON) loaded into the in-process store
        #[arg(long)]
        fixture: PathBuf,

        #[command(flatten)]
        query: QueryArgs,

        /// Number of workers (overrides the configuration)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show how a query would be read without reading it
    Plan {
        /// Scan configuration (JSON)
        #[arg(short, long)]
        config: PathBuf,

        /// Fixture (JSON) loaded into the in-process store
        #[arg(long)]
        fixture: PathBuf,

        #[command(flatten)]
        query: QueryArgs,
    },

    /// Show version information
    Version,
}

/// Query overrides; any of them replaces the query of the configuration
#[derive(Args, Debug, Default)]
pub struct QueryArgs {
    /// Raw SQL query
    #[arg(short, long, conflicts_with = "table")]
    pub query: Option<String>,

    /// Table to read
    #[arg(short, long)]
    pub table: Option<String>,

    /// Projection used with --table
    #[arg(long, requires = "table")]
    pub select: Option<String>,

    /// Filter used with --table
    #[arg(long = "where", requires = "table")]
    pub where_clause: Option<String>,

    /// Ordering used with --table
    #[arg(long, requires = "table")]
    pub order_by: Option<String>,
}

impl QueryArgs {
    /// Query to use, if the command line names one
    pub fn to_spec(&self) -> Option<QuerySpec> {
        if let Some(query) = &self.query {
            return Some(QuerySpec::raw(query.clone()));
        }
        let table = self.table.as_ref()?;
        let mut spec = QuerySpec::table(table.clone());
        spec.select = self.select.clone();
        spec.where_clause = self.where_clause.clone();
        spec.order_by = self.order_by.clone();
        Some(spec)
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_with_table_override() {
        let cli = Cli::parse_from([
            "partscan", "scan", "--config", "scan.json", "--fixture", "data.json", "--table",
            "Singers", "--where", "id > 3", "-w", "4", "-f", "csv",
        ]);
        match cli.command {
            Commands::Scan {
                query,
                workers,
                format,
                ..
            } => {
                assert_eq!(workers, Some(4));
                assert_eq!(format, OutputFormat::Csv);
                assert_eq!(
                    query.to_spec().unwrap().to_sql(false).unwrap(),
                    "SELECT * FROM `Singers` WHERE id > 3"
                );
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_query_and_table_conflict() {
        let result = Cli::try_parse_from([
            "partscan", "plan", "--config", "c.json", "--fixture", "f.json", "--query",
            "SELECT 1", "--table", "T",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_no_override_keeps_configured_query() {
        assert!(QueryArgs::default().to_spec().is_none());
    }
}
