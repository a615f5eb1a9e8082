// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scan orchestration
//!
//! - `source`: chooses between the partitioned cursor and the single-shot fallback
//! - `runner`: drives a source with a pool of workers into a row sink

pub mod runner;
pub mod source;

pub use runner::{CollectingSink, RowSink, RunSummary, ScanRunner, DEFAULT_BATCH_SIZE};
pub use source::{FallbackReason, ScanPath, ScanSource, SingleShotRead};
