// Copyright (c) 2024-2025 rdbi Contributors
// SPDX-License-Identifier: Apache-2.0
//
//! Configuration for rdbi factories and handles
//!
//! Loaded from a JSON file, with a few settings overridable from the
//! environment:
//! - `RDBI_DATABASE_PATH`: database file (empty for in-memory)
//! - `RDBI_LOG_STATEMENTS`: `true`/`false`
//! - `RDBI_BUSY_TIMEOUT_MS`: busy timeout in milliseconds

use crate::error::{Error, Result};
use crate::transaction::TransactionIsolationLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DATABASE_PATH: &str = "RDBI_DATABASE_PATH";
pub const ENV_LOG_STATEMENTS: &str = "RDBI_LOG_STATEMENTS";
pub const ENV_BUSY_TIMEOUT_MS: &str = "RDBI_BUSY_TIMEOUT_MS";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RdbiConfig {
    pub database: DatabaseConfig,
    pub statements: StatementConfig,
    pub transactions: TransactionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; in-memory when absent
    pub path: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatementConfig {
    /// Log every statement at info level instead of debug
    pub log_statements: bool,
    /// Accept named arguments the statement does not use
    pub allow_unused_bindings: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Isolation level applied to every new handle
    pub default_isolation: Option<TransactionIsolationLevel>,
}

impl RdbiConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(format!("Invalid configuration: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("Invalid configuration in {}: {}", path.display(), e)))
    }

    /// Apply `RDBI_*` environment overrides
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(path) = std::env::var(ENV_DATABASE_PATH) {
            self.database.path = if path.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(path))
            };
        }

        if let Ok(value) = std::env::var(ENV_LOG_STATEMENTS) {
            self.statements.log_statements = parse_bool(&value).ok_or_else(|| {
                Error::Config(format!("{} must be true or false, got '{}'", ENV_LOG_STATEMENTS, value))
            })?;
        }

        if let Ok(value) = std::env::var(ENV_BUSY_TIMEOUT_MS) {
            self.database.busy_timeout_ms = value.trim().parse().map_err(|_| {
                Error::Config(format!("{} must be a number of milliseconds, got '{}'", ENV_BUSY_TIMEOUT_MS, value))
            })?;
        }

        Ok(self)
    }

    pub fn with_database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database.path = Some(path.into());
        self
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RdbiConfig::default();
        assert_eq!(config.database.path, None);
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
        assert!(!config.statements.log_statements);
        assert_eq!(config.transactions.default_isolation, None);
    }

    #[test]
    fn test_partial_json() {
        let config = RdbiConfig::from_json_str(
            r#"{"statements": {"allow_unused_bindings": true},
                "transactions": {"default_isolation": "read_uncommitted"}}"#,
        )
        .unwrap();
        assert!(config.statements.allow_unused_bindings);
        assert_eq!(
            config.transactions.default_isolation,
            Some(TransactionIsolationLevel::ReadUncommitted)
        );
        assert_eq!(config.database.busy_timeout_ms, 5000);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            RdbiConfig::from_json_str("{not json"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RdbiConfig::from_json_str(r#"{"database": {"busy_timeout_ms": "soon"}}"#),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool(" TRUE "), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
