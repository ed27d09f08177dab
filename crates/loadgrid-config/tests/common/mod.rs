// crates/loadgrid-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across loadgrid-config integration tests.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use loadgrid_config::ConfigError;
use loadgrid_config::LoadgridConfig;

/// Result type used by config tests.
pub type TestResult = Result<(), String>;

/// Parses TOML into a config without validating it.
pub fn config_from_toml(toml_str: &str) -> Result<LoadgridConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a config with all defaults applied.
pub fn minimal_config() -> Result<LoadgridConfig, toml::de::Error> {
    config_from_toml("")
}

/// Passes when `result` failed with a message containing `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
