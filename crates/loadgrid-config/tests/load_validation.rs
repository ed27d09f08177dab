//! File loading tests for loadgrid-config.
// crates/loadgrid-config/tests/load_validation.rs
// =============================================================================
// Module: Config Load Tests
// Description: Validate file size, encoding, and parse error handling.
// Purpose: Ensure config files are read with hard limits.
// =============================================================================

use std::fs;

use loadgrid_config::ConfigError;
use loadgrid_config::LoadgridConfig;
use loadgrid_core::AuditEvent;
use loadgrid_core::AuditKind;
use loadgrid_core::AuditSink;
use loadgrid_core::RunName;
use loadgrid_core::Timestamp;
use tempfile::TempDir;

mod common;

use common::TestResult;
use common::assert_invalid;

#[test]
fn explicit_path_is_loaded() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("loadgrid.toml");
    fs::write(&path, "[orchestrator]\nstart_delay_secs = 5\n").map_err(|err| err.to_string())?;
    let config = LoadgridConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    if config.orchestrator.start_delay_secs != 5 {
        return Err("start delay was not read from file".to_string());
    }
    Ok(())
}

#[test]
fn missing_explicit_file_is_an_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    match LoadgridConfig::load_or_default(Some(&dir.path().join("absent.toml"))) {
        Err(ConfigError::Io(_)) => Ok(()),
        other => Err(format!("expected io error, got {}", describe(&other))),
    }
}

#[test]
fn oversized_file_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("loadgrid.toml");
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    fs::write(&path, padding).map_err(|err| err.to_string())?;
    assert_invalid(LoadgridConfig::load(Some(&path)), "size limit")
}

#[test]
fn non_utf8_file_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = dir.path().join("loadgrid.toml");
    fs::write(&path, [0xff_u8, 0xfe, 0x00]).map_err(|err| err.to_string())?;
    assert_invalid(LoadgridConfig::load(Some(&path)), "utf-8")
}

#[test]
fn malformed_toml_is_a_parse_error() -> TestResult {
    match LoadgridConfig::from_toml_str("[store\ntype = ") {
        Err(ConfigError::Parse(_)) => Ok(()),
        other => Err(format!("expected parse error, got {}", describe(&other))),
    }
}

#[test]
fn file_audit_sink_appends_json_lines() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let log = dir.path().join("logs").join("audit.jsonl");
    let toml = format!("[audit]\nsink = \"file\"\npath = '{}'\n", log.display());
    let config = LoadgridConfig::from_toml_str(&toml).map_err(|err| err.to_string())?;
    let sink = config.audit.build_sink().map_err(|err| err.to_string())?;
    let at = Timestamp::from_unix_seconds(0).map_err(|err| err.to_string())?;
    sink.record(&AuditEvent::new(at, AuditKind::RunDeleted {
        run: RunName::new("gone"),
    }));
    let content = fs::read_to_string(&log).map_err(|err| err.to_string())?;
    if !content.contains("\"event\":\"run_deleted\"") || content.lines().count() != 1 {
        return Err(format!("unexpected audit log: {content}"));
    }
    Ok(())
}

fn describe(result: &Result<LoadgridConfig, ConfigError>) -> String {
    match result {
        Ok(_) => "a valid config".to_string(),
        Err(error) => error.to_string(),
    }
}
