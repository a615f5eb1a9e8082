// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for partscan
//!
//! Provides one-off scans and plan inspection against the in-process
//! snapshot store seeded from a fixture file.

pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{Cli, Commands};
pub use handlers::{handle_plan, handle_scan};
