// crates/loadgrid-config/src/lib.rs
// ============================================================================
// Module: Loadgrid Config Library
// Description: Canonical config model and validation for loadgrid.toml.
// Purpose: Single source of truth for orchestrator, store, and audit settings.
// Dependencies: loadgrid-core, loadgrid-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `loadgrid-config` parses `loadgrid.toml`, rejects unknown keys and
//! inconsistent sections, and turns the result into the values the
//! orchestrator and its adapters are built from.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
