// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Connection configuration: database identity, endpoint, credentials

use super::credentials::{CredentialConfig, Credentials};
use crate::error::{ScanError, ScanResult};
use crate::store::DatabaseId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Emulator address used when `use_emulator` is set without host or port
pub const DEFAULT_EMULATOR_HOST: &str = "localhost:9010";

/// Service address used when nothing overrides it
pub const DEFAULT_SERVICE_HOST: &str = "spanner.googleapis.com:443";

const PROJECT_ID_PATTERN: &str = r"^([a-z][a-z0-9.-]*[a-z0-9]:)?[a-z][a-z0-9-]{4,28}[a-z0-9]$";
const INSTANCE_ID_PATTERN: &str = r"^[a-z][a-z0-9-]{0,62}[a-z0-9]$";
const DATABASE_ID_PATTERN: &str = r"^[a-z][a-z0-9_-]{0,28}[a-z0-9]$";

/// Where the backing store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Default,
    Host(String),
    Emulator(String),
}

impl Endpoint {
    pub fn is_emulator(&self) -> bool {
        matches!(self, Endpoint::Emulator(_))
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Default => write!(f, "{}", DEFAULT_SERVICE_HOST),
            Endpoint::Host(addr) => write!(f, "{}", addr),
            Endpoint::Emulator(addr) => write!(f, "emulator://{}", addr),
        }
    }
}

/// Everything needed to open a snapshot against one database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub project_id: String,
    pub instance_id: String,
    pub database_id: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub use_emulator: bool,
    #[serde(default)]
    pub credentials: CredentialConfig,
}

impl ConnectionConfig {
    pub fn new(
        project_id: impl Into<String>,
        instance_id: impl Into<String>,
        database_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            instance_id: instance_id.into(),
            database_id: database_id.into(),
            host: None,
            port: None,
            use_emulator: false,
            credentials: CredentialConfig::default(),
        }
    }

    /// Builder-style emulator toggle
    pub fn with_emulator(mut self, use_emulator: bool) -> Self {
        self.use_emulator = use_emulator;
        self
    }

    /// Check identifier syntax
    pub fn validate(&self) -> ScanResult<()> {
        check_identifier("project_id", &self.project_id, PROJECT_ID_PATTERN)?;
        check_identifier("instance_id", &self.instance_id, INSTANCE_ID_PATTERN)?;
        check_identifier("database_id", &self.database_id, DATABASE_ID_PATTERN)?;

        if let Some(host) = &self.host {
            if host.trim().is_empty() || host.contains(char::is_whitespace) {
                return Err(ScanError::Configuration(format!(
                    "Invalid host: '{}'",
                    host
                )));
            }
        }
        Ok(())
    }

    /// Resolve the endpoint from host, port and emulator flag
    pub fn endpoint(&self) -> Endpoint {
        if self.host.is_some() || self.port.is_some() {
            let address = format!(
                "{}:{}",
                self.host.as_deref().unwrap_or(""),
                self.port.map(|p| p.to_string()).unwrap_or_default()
            );
            if self.use_emulator {
                Endpoint::Emulator(address)
            } else {
                Endpoint::Host(address)
            }
        } else if self.use_emulator {
            Endpoint::Emulator(DEFAULT_EMULATOR_HOST.to_string())
        } else {
            Endpoint::Default
        }
    }

    /// Resolve credentials according to their precedence
    pub fn resolve_credentials(&self) -> ScanResult<Credentials> {
        self.credentials.resolve(self.use_emulator)
    }

    pub fn database(&self) -> DatabaseId {
        DatabaseId::new(&self.project_id, &self.instance_id, &self.database_id)
    }
}

fn check_identifier(field: &str, value: &str, pattern: &str) -> ScanResult<()> {
    let regex = regex::Regex::new(pattern)
        .map_err(|e| ScanError::Configuration(format!("Invalid {} pattern: {}", field, e)))?;
    if regex.is_match(value) {
        Ok(())
    } else {
        Err(ScanError::Configuration(format!(
            "Invalid {}: '{}'",
            field, value
        )))
    }
}
