// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Configuration loading and validation
//!
//! - `connection`: database identity and endpoint resolution
//! - `credentials`: credential precedence and key-file loading
//! - `scan`: query, partitioning and output options of a scan run

pub mod connection;
pub mod credentials;
pub mod scan;

pub use connection::{ConnectionConfig, Endpoint, DEFAULT_EMULATOR_HOST, DEFAULT_SERVICE_HOST};
pub use credentials::{CredentialConfig, Credentials, ServiceAccountKey, AMBIENT_CREDENTIALS_ENV};
pub use scan::{ColumnOption, QuerySpec, ScanConfig, EMULATOR_PARTITION_HINT};
