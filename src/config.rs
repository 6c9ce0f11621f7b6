//! Configuration file parsing for `pgvigil.toml`.
//!
//! Configuration shapes the *surrounding* layer: which rules run, what
//! severity their findings carry, and the PostgreSQL version analysis
//! targets. The analysis internals (risk bands, lock table) are fixed
//! and not configurable.

use std::collections::HashMap;
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pgvigil_analyze::risk::LARGE_TABLE_ROWS;
use pgvigil_ast::severity::Severity;

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while loading configuration.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// Error reading the configuration file.
    #[error("failed to read config file: {path}")]
    #[diagnostic(code(pgvigil::config::io_error))]
    IoError {
        /// Path that could not be read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse pgvigil.toml")]
    #[diagnostic(code(pgvigil::config::toml_error))]
    TomlError {
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration structure for `pgvigil.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VigilConfig {
    /// Analysis settings.
    #[serde(default)]
    pub analyze: AnalyzeConfig,

    /// Rule settings.
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Analysis settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzeConfig {
    /// Target PostgreSQL major version.
    #[serde(default = "default_pg_version")]
    pub pg_version: u16,

    /// Row count at which the surrounding tooling treats a table as
    /// large (reporting only; scorer bands are fixed).
    #[serde(default = "default_large_table_rows")]
    pub large_table_rows: u64,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self {
            pg_version: default_pg_version(),
            large_table_rows: default_large_table_rows(),
        }
    }
}

fn default_pg_version() -> u16 {
    15
}

fn default_large_table_rows() -> u64 {
    LARGE_TABLE_ROWS
}

/// Rule settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RulesConfig {
    /// Rule ids removed from the catalog entirely.
    #[serde(default)]
    pub disabled: Vec<String>,

    /// Per-rule severity overrides, applied to reported violations.
    #[serde(default)]
    pub severity: HashMap<String, Severity>,
}

impl VigilConfig {
    /// Load configuration from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError { source: e })
    }

    /// The target PostgreSQL version.
    pub fn pg_version(&self) -> pgvigil_ast::version::PgVersion {
        pgvigil_ast::version::PgVersion::new(self.analyze.pg_version)
    }

    /// The standard catalog minus the disabled rules.
    pub fn build_catalog(&self) -> pgvigil_analyze::rules::RuleCatalog {
        pgvigil_analyze::rules::catalog::standard().without(&self.rules.disabled)
    }
}
