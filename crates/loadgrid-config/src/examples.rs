// crates/loadgrid-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Canonical example configuration payload.
// Purpose: Deterministic example for docs and the CLI.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Canonical example for `loadgrid.toml`. Every key is shown with its
//! default unless a default would leave the section unusable.

/// Returns a canonical example `loadgrid.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[orchestrator]
start_delay_secs = 30
location_liveness_secs = 300

[store]
type = "sqlite"
path = "loadgrid.db"
journal_mode = "wal"
sync_mode = "full"
busy_timeout_ms = 5000

[audit]
sink = "file"
path = "loadgrid-audit.jsonl"
"#,
    )
}
