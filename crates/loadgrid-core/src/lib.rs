// crates/loadgrid-core/src/lib.rs
// ============================================================================
// Module: Loadgrid Core Library
// Description: Public API surface for the Loadgrid orchestration core.
// Purpose: Expose core types, interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Loadgrid coordinates one logical load test across worker fleets at
//! several independent locations. The core provides the per-location state
//! machine, the readiness barrier that elects a synchronized start, the
//! failure cascade, and the workload partitioner. It is storage-agnostic and
//! integrates through explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::AuditEvent;
pub use interfaces::AuditKind;
pub use interfaces::AuditSink;
pub use interfaces::Clock;
pub use interfaces::NameGenerator;
pub use interfaces::RunStore;
pub use interfaces::StoreError;
pub use runtime::EntityKind;
pub use runtime::FixedClock;
pub use runtime::InMemoryAuditSink;
pub use runtime::InMemoryRunStore;
pub use runtime::JsonlAuditSink;
pub use runtime::LocationJobView;
pub use runtime::LocationView;
pub use runtime::NoopAuditSink;
pub use runtime::Orchestrator;
pub use runtime::OrchestratorConfig;
pub use runtime::OrchestratorError;
pub use runtime::RandomNameGenerator;
pub use runtime::Reactor;
pub use runtime::ReactorEffect;
pub use runtime::RunStatus;
pub use runtime::RunSummary;
pub use runtime::RunView;
pub use runtime::SequenceNameGenerator;
pub use runtime::SharedAuditSink;
pub use runtime::StatusCounts;
pub use runtime::StderrAuditSink;
pub use runtime::SystemClock;
pub use runtime::WorkerJobView;
