// crates/loadgrid-store-sqlite/src/lib.rs
// ============================================================================
// Module: Loadgrid SQLite Store
// Description: Durable RunStore backend using SQLite.
// Purpose: Persist locations and run aggregates across process restarts.
// Dependencies: loadgrid-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`RunStore`](loadgrid_core::RunStore)
//! that keeps runs, location jobs, and attachments in normalized tables.
//! Every aggregate write runs in one immediate transaction guarded by the
//! run's revision column, so concurrent processes sharing a database file
//! detect lost updates instead of overwriting each other.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteRunStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
