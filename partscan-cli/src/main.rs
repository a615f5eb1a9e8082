// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! partscan CLI entry point

use clap::Parser;
use colored::Colorize;

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --verbose wins over --log-level; RUST_LOG can still refine either
    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.to_level_filter()
    } else {
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    match cli.command {
        Commands::Version => {
            println!("{} {}", "partscan".bold().green(), partscan::VERSION);
            println!("Partitioned snapshot reads");
            Ok(())
        }

        Commands::Scan {
            config,
            fixture,
            query,
            workers,
            format,
        } => cli::handle_scan(&config, &fixture, &query, workers, format),

        Commands::Plan {
            config,
            fixture,
            query,
        } => cli::handle_plan(&config, &fixture, &query),
    }
}
