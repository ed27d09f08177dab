// crates/loadgrid-core/tests/readiness_race.rs
// ============================================================================
// Module: Readiness Race Tests
// Description: Concurrent status reports against one run aggregate.
// Purpose: Show optimistic revisions let exactly one writer elect the start.
// Dependencies: loadgrid-core
// ============================================================================

//! ## Overview
//! Many threads report `ready` for different locations of the same run at
//! once. Losers of a save race observe `ConcurrentModification` and retry
//! the whole command, and the start instant is elected exactly once.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::thread;

use common::at;
use common::harness;
use common::live_run;
use common::report;
use loadgrid_core::AuditKind;
use loadgrid_core::LocationName;
use loadgrid_core::LocationStatus;
use loadgrid_core::OrchestratorError;

const LOCATIONS: usize = 16;

#[test]
fn concurrent_ready_reports_elect_one_start() {
    let names: Vec<String> = (0..LOCATIONS).map(|index| format!("loc-{index}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let harness = harness(&refs);
    let shares: Vec<(&str, u32)> = refs.iter().map(|name| (*name, 2)).collect();
    let run = live_run(&harness, &shares);
    for name in &refs {
        report(&harness, &run, name, LocationStatus::Queued);
    }

    thread::scope(|scope| {
        let handles: Vec<_> = refs
            .iter()
            .map(|name| {
                let orchestrator = &harness.orchestrator;
                let run = run.clone();
                let location = LocationName::new(*name);
                scope.spawn(move || {
                    loop {
                        match orchestrator.request_status(
                            &run,
                            &location,
                            LocationStatus::Ready,
                            None,
                        ) {
                            Ok(_) => return,
                            Err(OrchestratorError::ConcurrentModification(_)) => {}
                            Err(other) => panic!("unexpected error: {other}"),
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    });

    let view = harness.orchestrator.run_view(&run).unwrap();
    assert!(view.ready);
    assert_eq!(view.started_at, Some(at(30)));
    let applied = harness
        .audit
        .events()
        .into_iter()
        .filter(|event| {
            matches!(
                event.kind,
                AuditKind::TransitionApplied {
                    to: LocationStatus::Ready,
                    ..
                }
            )
        })
        .count();
    assert_eq!(applied, LOCATIONS);
    let elected = harness
        .audit
        .events()
        .into_iter()
        .filter(|event| matches!(event.kind, AuditKind::StartElected { .. }))
        .count();
    assert_eq!(elected, 1);
    assert_eq!(view.revision, u64::try_from(2 + 2 * LOCATIONS).unwrap());
}
