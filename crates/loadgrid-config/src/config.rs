// crates/loadgrid-config/src/config.rs
// ============================================================================
// Module: Loadgrid Configuration
// Description: Configuration loading and validation for loadgrid.
// Purpose: Provide strict config parsing with hard size and path limits.
// Dependencies: loadgrid-core, loadgrid-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Unknown keys are rejected. Every section has defaults, so an empty file is
//! a valid configuration describing an in-memory store with no audit output.
//!
//! The path comes from the caller, then the `LOADGRID_CONFIG` environment
//! variable, then `loadgrid.toml` in the working directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use loadgrid_core::JsonlAuditSink;
use loadgrid_core::NoopAuditSink;
use loadgrid_core::OrchestratorConfig;
use loadgrid_core::SharedAuditSink;
use loadgrid_core::StderrAuditSink;
use loadgrid_store_sqlite::SqliteStoreConfig;
use loadgrid_store_sqlite::SqliteStoreMode;
use loadgrid_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "loadgrid.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "LOADGRID_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default start delay in seconds.
const DEFAULT_START_DELAY_SECS: u64 = 30;
/// Upper bound on the start delay in seconds.
pub(crate) const MAX_START_DELAY_SECS: u64 = 3_600;
/// Default location liveness window in seconds.
const DEFAULT_LOCATION_LIVENESS_SECS: u64 = 300;
/// Upper bound on the liveness window in seconds.
pub(crate) const MAX_LOCATION_LIVENESS_SECS: u64 = 86_400;
/// Default store busy timeout in milliseconds.
const DEFAULT_STORE_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Upper bound on the store busy timeout in milliseconds.
pub(crate) const MAX_STORE_BUSY_TIMEOUT_MS: u64 = 60_000;

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Parsed `loadgrid.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadgridConfig {
    /// Orchestrator timing.
    #[serde(default)]
    pub orchestrator: OrchestratorSection,
    /// Run store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit sink.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl LoadgridConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        Self::load_from(&resolved)
    }

    /// Loads configuration like [`Self::load`], but falls back to defaults
    /// when neither a path nor the environment variable is given and the
    /// default file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an existing file fails to load.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if path.is_none() && env::var_os(CONFIG_ENV_VAR).is_none() {
            let default_path = Path::new(DEFAULT_CONFIG_NAME);
            if !default_path.exists() {
                return Ok(Self::default());
            }
        }
        Self::load(path)
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.orchestrator.validate()?;
        self.store.validate()?;
        self.audit.validate()?;
        Ok(())
    }

    /// Returns the orchestrator timing derived from this config.
    #[must_use]
    pub const fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            start_delay: Duration::from_secs(self.orchestrator.start_delay_secs),
            location_liveness: Duration::from_secs(self.orchestrator.location_liveness_secs),
        }
    }

    /// Reads and parses the file at `path`.
    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        validate_path(path)?;
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// `[orchestrator]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorSection {
    /// Lead time between the readiness barrier and the elected start.
    #[serde(default = "default_start_delay_secs")]
    pub start_delay_secs: u64,
    /// Window within which a location ping counts as online.
    #[serde(default = "default_location_liveness_secs")]
    pub location_liveness_secs: u64,
}

impl Default for OrchestratorSection {
    fn default() -> Self {
        Self {
            start_delay_secs: DEFAULT_START_DELAY_SECS,
            location_liveness_secs: DEFAULT_LOCATION_LIVENESS_SECS,
        }
    }
}

impl OrchestratorSection {
    /// Validates orchestrator timing.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.start_delay_secs > MAX_START_DELAY_SECS {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.start_delay_secs must be at most {MAX_START_DELAY_SECS}"
            )));
        }
        if self.location_liveness_secs == 0
            || self.location_liveness_secs > MAX_LOCATION_LIVENESS_SECS
        {
            return Err(ConfigError::Invalid(format!(
                "orchestrator.location_liveness_secs must be between 1 and \
                 {MAX_LOCATION_LIVENESS_SECS}"
            )));
        }
        Ok(())
    }
}

/// Serde default for the start delay.
const fn default_start_delay_secs() -> u64 {
    DEFAULT_START_DELAY_SECS
}

/// Serde default for the liveness window.
const fn default_location_liveness_secs() -> u64 {
    DEFAULT_LOCATION_LIVENESS_SECS
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `[store]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Returns a sqlite store config at `path` with default tuning.
    #[must_use]
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self {
            store_type: StoreType::Sqlite,
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Returns the `SQLite` store config when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }

    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self.path.as_ref().ok_or_else(|| {
                    ConfigError::Invalid("sqlite store requires path".to_string())
                })?;
                validate_path_string("store.path", &path.to_string_lossy())?;
                if self.busy_timeout_ms > MAX_STORE_BUSY_TIMEOUT_MS {
                    return Err(ConfigError::Invalid(format!(
                        "store.busy_timeout_ms must be at most {MAX_STORE_BUSY_TIMEOUT_MS}"
                    )));
                }
                Ok(())
            }
        }
    }
}

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// In-process store; state is lost on exit.
    #[default]
    Memory,
    /// `SQLite`-backed durable store.
    Sqlite,
}

/// Serde default for the store busy timeout.
const fn default_store_busy_timeout_ms() -> u64 {
    DEFAULT_STORE_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// `[audit]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkType,
    /// JSON lines file when `sink = "file"`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl AuditConfig {
    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the section is invalid or the audit file
    /// cannot be opened.
    pub fn build_sink(&self) -> Result<SharedAuditSink, ConfigError> {
        self.validate()?;
        match (self.sink, &self.path) {
            (AuditSinkType::None, _) => Ok(SharedAuditSink::new(NoopAuditSink)),
            (AuditSinkType::Stderr, _) => Ok(SharedAuditSink::new(StderrAuditSink)),
            (AuditSinkType::File, Some(path)) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    fs::create_dir_all(parent).map_err(|err| ConfigError::Io(err.to_string()))?;
                }
                let sink =
                    JsonlAuditSink::new(path).map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(SharedAuditSink::new(sink))
            }
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
        }
    }

    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkType::File, Some(path)) => {
                validate_path_string("audit.path", &path.to_string_lossy())
            }
            (AuditSinkType::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires path".to_string()))
            }
            (_, Some(_)) => Err(ConfigError::Invalid(
                "audit.path is only valid for sink = \"file\"".to_string(),
            )),
            (_, None) => Ok(()),
        }
    }
}

/// Audit sink kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkType {
    /// Discard audit events.
    #[default]
    None,
    /// JSON lines on stderr.
    Stderr,
    /// Append-only JSON lines file.
    File,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from the caller or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path-valued field against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::*;

    #[test]
    fn explicit_path_wins() {
        let resolved = resolve_path(Some(Path::new("custom.toml"))).unwrap();
        assert_eq!(resolved, PathBuf::from("custom.toml"));
    }

    #[test]
    fn long_component_is_rejected() {
        let path = PathBuf::from("a".repeat(MAX_PATH_COMPONENT_LENGTH + 1));
        assert!(matches!(validate_path(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn blank_path_field_is_rejected() {
        let error = validate_path_string("store.path", "  ").unwrap_err();
        assert_eq!(error, ConfigError::Invalid("store.path must be non-empty".to_string()));
    }
}
