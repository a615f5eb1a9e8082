// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Credential selection
//!
//! Precedence: explicit bearer token, then explicit credentials file, then the
//! deprecated `json_keyfile` path, then ambient default credentials.

use crate::error::{ScanError, ScanResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Environment variable consulted for ambient credentials
pub const AMBIENT_CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// Credential material as written in the configuration
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Explicit OAuth bearer token
    #[serde(default)]
    pub oauth_token: Option<String>,
    /// Service-account key file
    #[serde(default)]
    pub credentials_file: Option<PathBuf>,
    /// Legacy service-account key file option
    #[serde(default)]
    pub json_keyfile: Option<PathBuf>,
}

impl fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "<redacted>"))
            .field("credentials_file", &self.credentials_file)
            .field("json_keyfile", &self.json_keyfile)
            .finish()
    }
}

/// Fields of a service-account key file the connection layer needs
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceAccountKey {
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub private_key_id: Option<String>,
    pub client_email: String,
}

/// Resolved credentials handed to the backing store
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    BearerToken(String),
    ServiceAccount { path: PathBuf, key: ServiceAccountKey },
    /// Ambient default credentials, optionally pinned by the environment
    Ambient { path: Option<PathBuf> },
    /// Emulator connections carry no credentials
    Emulator,
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::BearerToken(_) => "bearer-token",
            Credentials::ServiceAccount { .. } => "service-account",
            Credentials::Ambient { .. } => "ambient",
            Credentials::Emulator => "emulator",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::BearerToken(_) => write!(f, "BearerToken(<redacted>)"),
            Credentials::ServiceAccount { path, key } => f
                .debug_struct("ServiceAccount")
                .field("path", path)
                .field("client_email", &key.client_email)
                .finish(),
            Credentials::Ambient { path } => f.debug_struct("Ambient").field("path", path).finish(),
            Credentials::Emulator => write!(f, "Emulator"),
        }
    }
}

impl CredentialConfig {
    /// Pick the credentials to use, loading key files as needed
    pub fn resolve(&self, use_emulator: bool) -> ScanResult<Credentials> {
        if let Some(token) = &self.oauth_token {
            if token.trim().is_empty() {
                return Err(ScanError::Configuration(
                    "oauth_token must not be empty".to_string(),
                ));
            }
            return Ok(Credentials::BearerToken(token.clone()));
        }

        if let Some(path) = &self.credentials_file {
            return load_service_account(path);
        }

        if let Some(path) = &self.json_keyfile {
            log::warn!("'json_keyfile' option is deprecated, use 'credentials' option instead.");
            return load_service_account(path);
        }

        if use_emulator {
            return Ok(Credentials::Emulator);
        }

        let path = std::env::var_os(AMBIENT_CREDENTIALS_ENV).map(PathBuf::from);
        Ok(Credentials::Ambient { path })
    }
}

fn load_service_account(path: &Path) -> ScanResult<Credentials> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let contents = std::fs::read_to_string(&absolute).map_err(|e| {
        ScanError::Configuration(format!(
            "Cannot create a credentials from {}: {}",
            absolute.display(),
            e
        ))
    })?;

    let key: ServiceAccountKey = serde_json::from_str(&contents).map_err(|e| {
        ScanError::Configuration(format!(
            "Cannot create a credentials from {}: {}",
            absolute.display(),
            e
        ))
    })?;

    if key.key_type != "service_account" {
        return Err(ScanError::Configuration(format!(
            "Cannot create a credentials from {}: unsupported key type '{}'",
            absolute.display(),
            key.key_type
        )));
    }

    Ok(Credentials::ServiceAccount {
        path: absolute,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_key(dir: &tempfile::TempDir, name: &str, email: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"type": "service_account", "project_id": "p", "client_email": "{}"}}"#,
            email
        )
        .unwrap();
        path
    }

    #[test]
    fn test_token_beats_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = CredentialConfig {
            oauth_token: Some("ya29.token".into()),
            credentials_file: Some(write_key(&dir, "a.json", "a@example.com")),
            json_keyfile: Some(write_key(&dir, "b.json", "b@example.com")),
        };
        assert_eq!(
            config.resolve(false).unwrap(),
            Credentials::BearerToken("ya29.token".into())
        );
    }

    #[test]
    fn test_credentials_file_beats_legacy_keyfile() {
        let dir = tempfile::tempdir().unwrap();
        let config = CredentialConfig {
            oauth_token: None,
            credentials_file: Some(write_key(&dir, "a.json", "a@example.com")),
            json_keyfile: Some(write_key(&dir, "b.json", "b@example.com")),
        };
        match config.resolve(false).unwrap() {
            Credentials::ServiceAccount { key, .. } => {
                assert_eq!(key.client_email, "a@example.com")
            }
            other => panic!("unexpected credentials: {:?}", other),
        }
    }

    #[test]
    fn test_legacy_keyfile_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let config = CredentialConfig {
            json_keyfile: Some(write_key(&dir, "b.json", "b@example.com")),
            ..Default::default()
        };
        assert_eq!(config.resolve(false).unwrap().kind(), "service-account");
    }

    #[test]
    fn test_missing_or_malformed_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "not json").unwrap();

        for path in [bad, dir.path().join("missing.json")] {
            let config = CredentialConfig {
                credentials_file: Some(path),
                ..Default::default()
            };
            assert!(matches!(
                config.resolve(false),
                Err(ScanError::Configuration(msg)) if msg.starts_with("Cannot create a credentials")
            ));
        }
    }

    #[test]
    fn test_emulator_needs_no_credentials() {
        assert_eq!(
            CredentialConfig::default().resolve(true).unwrap(),
            Credentials::Emulator
        );
    }

    #[test]
    fn test_debug_redacts_token() {
        let creds = Credentials::BearerToken("secret".into());
        assert!(!format!("{:?}", creds).contains("secret"));
    }
}
