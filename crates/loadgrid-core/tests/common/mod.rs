// crates/loadgrid-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared orchestrator harness for core integration tests.
// Purpose: Build deterministic orchestrators over the in-memory adapters.
// Dependencies: loadgrid-core
// ============================================================================

//! ## Overview
//! The harness wires an orchestrator to an in-memory store, sequential run
//! names, a fixed clock, and an in-memory audit sink, with a handful of
//! registered locations.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use loadgrid_core::FixedClock;
use loadgrid_core::InMemoryAuditSink;
use loadgrid_core::InMemoryRunStore;
use loadgrid_core::LocationName;
use loadgrid_core::LocationStatus;
use loadgrid_core::Orchestrator;
use loadgrid_core::OrchestratorConfig;
use loadgrid_core::RunName;
use loadgrid_core::RunParams;
use loadgrid_core::SequenceNameGenerator;
use loadgrid_core::Timestamp;

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Orchestrator over in-process adapters.
pub type TestOrchestrator =
    Orchestrator<InMemoryRunStore, SequenceNameGenerator, FixedClock, InMemoryAuditSink>;

/// Orchestrator plus handles on its clock and audit sink.
pub struct Harness {
    /// Orchestrator under test.
    pub orchestrator: TestOrchestrator,
    /// Shared clock handle.
    pub clock: FixedClock,
    /// Shared audit handle.
    pub audit: InMemoryAuditSink,
}

/// Start of the test clock.
pub const EPOCH_SECONDS: i64 = 1_700_000_000;

/// Returns the timestamp `seconds` after the test epoch.
pub fn at(seconds: i64) -> Timestamp {
    Timestamp::from_unix_seconds(EPOCH_SECONDS + seconds).unwrap()
}

/// Builds a harness over `store` with the given locations registered.
pub fn harness_with_store(store: InMemoryRunStore, locations: &[&str]) -> Harness {
    let clock = FixedClock::new(at(0));
    let audit = InMemoryAuditSink::new();
    let config = OrchestratorConfig {
        start_delay: Duration::from_secs(30),
        location_liveness: Duration::from_secs(300),
    };
    let orchestrator = Orchestrator::new(
        store,
        SequenceNameGenerator::new(),
        clock.clone(),
        audit.clone(),
        config,
    );
    for location in locations {
        orchestrator.register_location(location, "").unwrap();
    }
    Harness {
        orchestrator,
        clock,
        audit,
    }
}

/// Builds a harness with the given locations registered.
pub fn harness(locations: &[&str]) -> Harness {
    harness_with_store(InMemoryRunStore::new(), locations)
}

/// Creates a draft run with the given `(location, workers)` shares.
pub fn draft_run(harness: &Harness, shares: &[(&str, u32)]) -> RunName {
    let params = shares.iter().fold(RunParams::new("https://shop.example.com"), |params, share| {
        params.with_location(share.0, share.1)
    });
    harness.orchestrator.create_run(params).unwrap().name
}

/// Creates and starts a run with the given shares.
pub fn live_run(harness: &Harness, shares: &[(&str, u32)]) -> RunName {
    let name = draft_run(harness, shares);
    harness.orchestrator.start_run(&name).unwrap();
    name
}

/// Requests `status` for one job and unwraps the result.
pub fn report(harness: &Harness, run: &RunName, location: &str, status: LocationStatus) {
    harness
        .orchestrator
        .request_status(run, &LocationName::new(location), status, None)
        .unwrap();
}

/// Returns the status of one job.
pub fn status_of(harness: &Harness, run: &RunName, location: &str) -> LocationStatus {
    harness.orchestrator.location_view(run, &LocationName::new(location)).unwrap().status
}
