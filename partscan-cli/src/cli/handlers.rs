// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command handlers

use super::commands::{OutputFormat, QueryArgs};
use super::output::ResultFormatter;
use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use partscan::{
    bridge, CollectingSink, FixtureSet, MemoryBackend, OutputType, RowBridge, ScanConfig, ScanPath,
    ScanRunner, ScanSource, SnapshotClient,
};
use std::path::Path;
use std::sync::Arc;

/// Load the configuration and apply command-line overrides
fn load_config(
    config: &Path,
    query: &QueryArgs,
    workers: Option<usize>,
) -> Result<ScanConfig, Box<dyn std::error::Error>> {
    let mut config = ScanConfig::load(config)?;
    if let Some(spec) = query.to_spec() {
        config.query = spec;
    }
    if let Some(workers) = workers {
        config.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

/// Connect to the in-process store seeded from `fixture`
fn connect(
    config: &ScanConfig,
    fixture: &Path,
) -> Result<SnapshotClient, Box<dyn std::error::Error>> {
    let fixtures = FixtureSet::load(fixture)?;
    let backend = MemoryBackend::from_fixtures(&fixtures)?;
    Ok(SnapshotClient::connect(Arc::new(backend), &config.connection)?)
}

pub fn handle_scan(
    config: &Path,
    fixture: &Path,
    query: &QueryArgs,
    workers: Option<usize>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config, query, workers)?;
    let client = connect(&config, fixture)?;
    let txn = Arc::new(client.begin_snapshot()?);

    let source = ScanSource::open(txn, &config.sql()?, &config.partition)?;
    let bridge = RowBridge::for_columns(source.columns(), &config.value_type_overrides())?;
    let sink = CollectingSink::new();

    let result = ScanRunner::new(config.workers).run(&source, &bridge, &sink);
    source.close();
    client.close();

    match result {
        Ok(summary) => {
            let output = ResultFormatter::format(bridge.columns(), &sink.rows(), &summary, format);
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", format!("Error: {}", e).red());
            Err(e.into())
        }
    }
}

pub fn handle_plan(
    config: &Path,
    fixture: &Path,
    query: &QueryArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config, query, None)?;
    let client = connect(&config, fixture)?;
    let txn = Arc::new(client.begin_snapshot()?);
    let sql = config.sql()?;
    let source = ScanSource::open(txn, &sql, &config.partition)?;

    println!("{}", "Scan Plan".bold().green());
    println!("Database: {}", client.database());
    println!("Query: {}", sql.replace('\n', " "));
    match source.path() {
        ScanPath::Partitioned { partitions } => {
            println!("Partitions: {}", partitions.to_string().bold());
        }
        ScanPath::SingleShot { reason } => {
            println!("{}", format!("Single-shot read: {}", reason).yellow());
        }
    }
    println!();

    let overrides = config.value_type_overrides();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("column").fg(Color::Green),
        Cell::new("source type").fg(Color::Green),
        Cell::new("output type").fg(Color::Green),
    ]);
    for column in source.columns() {
        let output = bridge::override_for(&overrides, &column.name)
            .or_else(|| OutputType::default_for(&column.sql_type))
            .map(|t| t.to_string())
            .unwrap_or_else(|| "unsupported (set value_type)".to_string());
        table.add_row(vec![
            column.name.clone(),
            column.sql_type.to_string(),
            output,
        ]);
    }
    println!("{}", table);

    source.close();
    client.close();
    Ok(())
}
