// crates/loadgrid-core/src/runtime/mod.rs
// ============================================================================
// Module: Loadgrid Runtime
// Description: Orchestrator, reactor, aggregator, and reference adapters.
// Purpose: Execute run lifecycle commands against pluggable interfaces.
// Dependencies: crate::{core, interfaces}, rand, serde_json
// ============================================================================

//! ## Overview
//! Runtime modules implement the command surface and the cross-location
//! rules, plus in-process implementations of every interface so hosts and
//! tests can run the orchestrator without external systems.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod aggregator;
pub mod audit;
pub mod clock;
pub mod naming;
pub mod orchestrator;
pub mod reactor;
pub mod store;
pub mod views;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use aggregator::RunStatus;
pub use aggregator::RunSummary;
pub use aggregator::StatusCounts;
pub use aggregator::summarize;
pub use audit::InMemoryAuditSink;
pub use audit::JsonlAuditSink;
pub use audit::NoopAuditSink;
pub use audit::SharedAuditSink;
pub use audit::StderrAuditSink;
pub use clock::FixedClock;
pub use clock::SystemClock;
pub use naming::RandomNameGenerator;
pub use naming::SequenceNameGenerator;
pub use orchestrator::DEFAULT_LOCATION_LIVENESS;
pub use orchestrator::DEFAULT_START_DELAY;
pub use orchestrator::EntityKind;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorConfig;
pub use orchestrator::OrchestratorError;
pub use reactor::Reactor;
pub use reactor::ReactorEffect;
pub use store::InMemoryRunStore;
pub use views::LocationJobView;
pub use views::LocationView;
pub use views::RunView;
pub use views::WorkerJobView;
