//! Section defaults and cross-field validation tests for loadgrid-config.
// crates/loadgrid-config/tests/config_validation.rs
// =============================================================================
// Module: Config Validation Tests
// Description: Validate defaults and per-section invariants.
// Purpose: Ensure an empty config is usable and bad sections fail closed.
// =============================================================================

use std::path::PathBuf;
use std::time::Duration;

use loadgrid_config::AuditSinkType;
use loadgrid_config::LoadgridConfig;
use loadgrid_config::StoreConfig;
use loadgrid_config::StoreType;
use loadgrid_config::config_toml_example;
use loadgrid_store_sqlite::SqliteStoreMode;
use loadgrid_store_sqlite::SqliteSyncMode;

mod common;

use common::TestResult;
use common::assert_invalid;

#[test]
fn empty_config_uses_defaults() -> TestResult {
    let config = common::minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    let timing = config.orchestrator_config();
    if timing.start_delay != Duration::from_secs(30)
        || timing.location_liveness != Duration::from_secs(300)
    {
        return Err("orchestrator defaults drifted".to_string());
    }
    if config.store.store_type != StoreType::Memory || config.store.sqlite_config().is_some() {
        return Err("store should default to memory".to_string());
    }
    if config.audit.sink != AuditSinkType::None {
        return Err("audit should default to none".to_string());
    }
    Ok(())
}

#[test]
fn example_config_parses() -> TestResult {
    let config =
        LoadgridConfig::from_toml_str(&config_toml_example()).map_err(|err| err.to_string())?;
    let sqlite = config.store.sqlite_config().ok_or("example should select sqlite")?;
    if sqlite.path != PathBuf::from("loadgrid.db")
        || sqlite.journal_mode != SqliteStoreMode::Wal
        || sqlite.sync_mode != SqliteSyncMode::Full
        || sqlite.busy_timeout_ms != 5_000
    {
        return Err("sqlite settings did not carry over".to_string());
    }
    Ok(())
}

#[test]
fn unknown_keys_are_rejected() -> TestResult {
    assert_invalid(
        LoadgridConfig::from_toml_str("[orchestrator]\nstart_delay = 10\n"),
        "unknown field",
    )?;
    assert_invalid(LoadgridConfig::from_toml_str("[server]\nbind = \"x\"\n"), "unknown field")
}

#[test]
fn start_delay_is_bounded() -> TestResult {
    assert_invalid(
        LoadgridConfig::from_toml_str("[orchestrator]\nstart_delay_secs = 3601\n"),
        "orchestrator.start_delay_secs",
    )?;
    let config = LoadgridConfig::from_toml_str("[orchestrator]\nstart_delay_secs = 0\n")
        .map_err(|err| err.to_string())?;
    if config.orchestrator_config().start_delay != Duration::ZERO {
        return Err("zero delay should be allowed".to_string());
    }
    Ok(())
}

#[test]
fn liveness_window_must_be_positive() -> TestResult {
    assert_invalid(
        LoadgridConfig::from_toml_str("[orchestrator]\nlocation_liveness_secs = 0\n"),
        "orchestrator.location_liveness_secs",
    )
}

#[test]
fn memory_store_rejects_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.path = Some(PathBuf::from("run.db"));
    assert_invalid(config.validate(), "memory store must not set path")
}

#[test]
fn sqlite_store_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.store.store_type = StoreType::Sqlite;
    assert_invalid(config.validate(), "sqlite store requires path")?;
    config.store = StoreConfig::sqlite("data/loadgrid.db");
    config.validate().map_err(|err| err.to_string())?;
    config.store.busy_timeout_ms = 120_000;
    assert_invalid(config.validate(), "store.busy_timeout_ms")
}

#[test]
fn audit_path_matches_sink() -> TestResult {
    assert_invalid(
        LoadgridConfig::from_toml_str("[audit]\nsink = \"file\"\n"),
        "file audit sink requires path",
    )?;
    assert_invalid(
        LoadgridConfig::from_toml_str("[audit]\nsink = \"stderr\"\npath = \"audit.jsonl\"\n"),
        "audit.path is only valid",
    )
}
