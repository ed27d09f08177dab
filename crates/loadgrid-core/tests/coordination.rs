// crates/loadgrid-core/tests/coordination.rs
// ============================================================================
// Module: Cross-Location Coordination Tests
// Description: Guards, readiness barrier, completion, and failure cascade.
// Purpose: Validate job transitions and reactor rules through the orchestrator.
// Dependencies: loadgrid-core
// ============================================================================

//! ## Overview
//! Drives location jobs through the orchestrator and checks the
//! cross-location rules, including duplicate and stale event delivery.

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

use std::time::Duration;

use common::at;
use common::draft_run;
use common::harness;
use common::live_run;
use common::report;
use common::status_of;
use loadgrid_core::AuditKind;
use loadgrid_core::JobKey;
use loadgrid_core::LocationJob;
use loadgrid_core::LocationName;
use loadgrid_core::LocationStatus;
use loadgrid_core::OrchestratorError;
use loadgrid_core::RunName;
use loadgrid_core::RunStatus;
use loadgrid_core::StatusChange;
use loadgrid_core::Transition;

#[test]
fn guard_rejects_out_of_order_transition() {
    let harness = harness(&["fra"]);
    let run = live_run(&harness, &[("fra", 1)]);
    let fra = LocationName::new("fra");
    let before = harness.orchestrator.run_view(&run).unwrap();

    let err = harness
        .orchestrator
        .transition_location(&run, &fra, Transition::Start, None)
        .unwrap_err();
    match err {
        OrchestratorError::InvalidTransition(err) => {
            assert_eq!(err.current, LocationStatus::Pending);
            assert_eq!(err.target, LocationStatus::Running);
            assert_eq!(err.job, JobKey::new(run.clone(), fra.clone()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(harness.orchestrator.run_view(&run).unwrap(), before);
    assert!(harness.audit.events().iter().any(|event| matches!(
        event.kind,
        AuditKind::TransitionRejected {
            current: LocationStatus::Pending,
            ..
        }
    )));
}

/// Returns true when the transition table allows `transition` from `status`.
fn allowed(status: LocationStatus, transition: Transition) -> bool {
    use LocationStatus as S;
    match transition {
        Transition::Accept => status == S::Pending,
        Transition::Ready => status == S::Queued,
        Transition::Start => status == S::Ready,
        Transition::Finish => status == S::Running,
        Transition::Fail | Transition::Cancel => {
            matches!(status, S::Pending | S::Queued | S::Ready | S::Running)
        }
        Transition::Retry => status == S::Failed,
    }
}

#[test]
fn every_forbidden_pair_is_rejected_without_change() {
    let mut rejected = 0;
    for status in LocationStatus::ALL {
        for transition in Transition::ALL {
            let mut job = LocationJob::new(RunName::new("run"), LocationName::new("fra"), 2);
            job.status = status;
            job.status_description = "earlier".to_string();
            job.online_workers = 1;
            let before = job.clone();
            let result = job.apply(transition, Some("attempt"));
            if allowed(status, transition) {
                let change = result.unwrap();
                assert_eq!(change.from, status);
                assert_eq!(job.status, transition.target());
                continue;
            }
            let err = result.unwrap_err();
            assert_eq!(err.current, status, "{status} {transition}");
            assert_eq!(err.target, transition.target());
            assert_eq!(err.transition, transition);
            assert_eq!(job, before, "{status} {transition} changed the job");
            rejected += 1;
        }
    }
    assert_eq!(rejected, 36);
}

#[test]
fn terminal_jobs_reject_fail_and_cancel() {
    let harness = harness(&["fra"]);
    let run = live_run(&harness, &[("fra", 1)]);
    let fra = LocationName::new("fra");
    harness.orchestrator.transition_location(&run, &fra, Transition::Fail, Some("boom")).unwrap();
    for transition in [Transition::Fail, Transition::Cancel, Transition::Finish] {
        let err = harness
            .orchestrator
            .transition_location(&run, &fra, transition, Some("late"))
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::InvalidTransition(_)));
    }
    assert_eq!(harness.orchestrator.location_view(&run, &fra).unwrap().status_description, "boom");
}

#[test]
fn draft_jobs_cannot_transition() {
    let harness = harness(&["fra"]);
    let run = draft_run(&harness, &[("fra", 1)]);
    let err = harness
        .orchestrator
        .transition_location(&run, &LocationName::new("fra"), Transition::Accept, None)
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::ConstraintViolation(_)));
    assert!(matches!(
        harness
            .orchestrator
            .transition_location(&run, &LocationName::new("sfo"), Transition::Accept, None)
            .unwrap_err(),
        OrchestratorError::UnknownEntity { .. }
    ));
}

#[test]
fn unknown_job_is_reported() {
    let harness = harness(&["fra", "sfo"]);
    let run = live_run(&harness, &[("fra", 1)]);
    let err = harness
        .orchestrator
        .transition_location(&run, &LocationName::new("sfo"), Transition::Accept, None)
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::UnknownEntity { .. }));
}

#[test]
fn readiness_barrier_elects_start_once() {
    let harness = harness(&["fra", "sfo", "syd"]);
    let run = live_run(&harness, &[("fra", 1), ("sfo", 2), ("syd", 1)]);
    for location in ["fra", "sfo", "syd"] {
        report(&harness, &run, location, LocationStatus::Queued);
    }
    harness.clock.set(at(100));
    report(&harness, &run, "fra", LocationStatus::Ready);
    report(&harness, &run, "sfo", LocationStatus::Ready);
    let partial = harness.orchestrator.run_view(&run).unwrap();
    assert_eq!(partial.started_at, None);
    assert!(!partial.ready);

    report(&harness, &run, "syd", LocationStatus::Ready);
    let view = harness.orchestrator.location_view(&run, &LocationName::new("syd")).unwrap();
    assert_eq!(view.started_at, Some(at(130)));
    assert!(view.ready);

    harness.clock.advance(Duration::from_secs(45));
    let change = StatusChange {
        job: JobKey::new(run.clone(), LocationName::new("fra")),
        transition: Transition::Ready,
        from: LocationStatus::Queued,
        to: LocationStatus::Ready,
    };
    assert!(harness.orchestrator.deliver_status_change(&change).unwrap().is_empty());
    assert_eq!(harness.orchestrator.run_view(&run).unwrap().started_at, Some(at(130)));

    let elected = harness
        .audit
        .events()
        .into_iter()
        .filter(|event| matches!(event.kind, AuditKind::StartElected { .. }))
        .count();
    assert_eq!(elected, 1);
}

#[test]
fn retried_job_does_not_move_elected_start() {
    let harness = harness(&["fra", "sfo"]);
    let run = live_run(&harness, &[("fra", 1), ("sfo", 1)]);
    for location in ["fra", "sfo"] {
        report(&harness, &run, location, LocationStatus::Queued);
        report(&harness, &run, location, LocationStatus::Ready);
    }
    let started_at = harness.orchestrator.run_view(&run).unwrap().started_at;
    assert_eq!(started_at, Some(at(30)));

    harness.clock.advance(Duration::from_secs(10));
    let fra = LocationName::new("fra");
    harness
        .orchestrator
        .request_status(&run, &fra, LocationStatus::Failed, Some("node lost"))
        .unwrap();
    assert_eq!(status_of(&harness, &run, "sfo"), LocationStatus::Canceled);
    let retried = harness
        .orchestrator
        .request_status(&run, &fra, LocationStatus::Pending, Some("retrying"))
        .unwrap();
    assert_eq!(retried.status, LocationStatus::Pending);
    assert_eq!(retried.status_description, "retrying");
    assert_eq!(retried.started_at, started_at);
}

#[test]
fn completion_is_stamped_once() {
    let harness = harness(&["fra", "sfo"]);
    let run = live_run(&harness, &[("fra", 1), ("sfo", 1)]);
    for location in ["fra", "sfo"] {
        report(&harness, &run, location, LocationStatus::Queued);
        report(&harness, &run, location, LocationStatus::Ready);
        report(&harness, &run, location, LocationStatus::Running);
    }
    harness.clock.set(at(500));
    report(&harness, &run, "fra", LocationStatus::Completed);
    assert_eq!(harness.orchestrator.run_view(&run).unwrap().completed_at, None);
    harness.clock.set(at(620));
    report(&harness, &run, "sfo", LocationStatus::Completed);

    let view = harness.orchestrator.run_view(&run).unwrap();
    assert_eq!(view.completed_at, Some(at(620)));
    assert_eq!(view.status, RunStatus::Completed);
    assert!(view.completed);

    harness.clock.set(at(900));
    let change = StatusChange {
        job: JobKey::new(run.clone(), LocationName::new("sfo")),
        transition: Transition::Finish,
        from: LocationStatus::Running,
        to: LocationStatus::Completed,
    };
    for _ in 0..2 {
        assert!(harness.orchestrator.deliver_status_change(&change).unwrap().is_empty());
    }
    let after = harness.orchestrator.run_view(&run).unwrap();
    assert_eq!(after.completed_at, Some(at(620)));
    assert_eq!(after.revision, view.revision);
}

#[test]
fn failure_cascade_replaces_an_operator_cancel() {
    let harness = harness(&["a", "b", "c"]);
    let run = live_run(&harness, &[("a", 1), ("b", 1), ("c", 1)]);
    harness
        .orchestrator
        .request_status(
            &run,
            &LocationName::new("b"),
            LocationStatus::Canceled,
            Some("operator stop"),
        )
        .unwrap();
    harness
        .orchestrator
        .request_status(&run, &LocationName::new("a"), LocationStatus::Failed, Some("boom"))
        .unwrap();

    let view = harness.orchestrator.run_view(&run).unwrap();
    assert_eq!(view.locations[1].status, LocationStatus::Canceled);
    assert_eq!(view.locations[1].status_description, "Canceled because location a failed.");
    assert_eq!(view.locations[2].status, LocationStatus::Canceled);
    assert_eq!(view.locations[2].status_description, "Canceled because location a failed.");
}

#[test]
fn failure_cascades_to_live_siblings_only() {
    let harness = harness(&["a", "b", "c"]);
    let run = live_run(&harness, &[("a", 1), ("b", 1), ("c", 1)]);
    for location in ["a", "b", "c"] {
        report(&harness, &run, location, LocationStatus::Queued);
        report(&harness, &run, location, LocationStatus::Ready);
    }
    report(&harness, &run, "a", LocationStatus::Running);
    report(&harness, &run, "c", LocationStatus::Running);
    report(&harness, &run, "c", LocationStatus::Completed);

    harness
        .orchestrator
        .request_status(
            &run,
            &LocationName::new("a"),
            LocationStatus::Failed,
            Some("worker crashed"),
        )
        .unwrap();

    let view = harness.orchestrator.run_view(&run).unwrap();
    assert_eq!(view.status, RunStatus::Failed);
    assert_eq!(view.locations[0].status, LocationStatus::Failed);
    assert_eq!(view.locations[0].status_description, "worker crashed");
    assert_eq!(view.locations[1].status, LocationStatus::Canceled);
    assert_eq!(view.locations[1].status_description, "Canceled because location a failed.");
    assert_eq!(view.locations[2].status, LocationStatus::Completed);
    assert_eq!(view.completed_at, None);

    let cascaded: Vec<String> = harness
        .audit
        .events()
        .into_iter()
        .filter_map(|event| match event.kind {
            AuditKind::SiblingCanceled {
                location,
                ..
            } => Some(location.to_string()),
            _ => None,
        })
        .collect();
    assert_eq!(cascaded, vec!["b".to_string()]);

    let change = StatusChange {
        job: JobKey::new(run.clone(), LocationName::new("a")),
        transition: Transition::Fail,
        from: LocationStatus::Running,
        to: LocationStatus::Failed,
    };
    assert!(harness.orchestrator.deliver_status_change(&change).unwrap().is_empty());
}

#[test]
fn online_workers_never_change_status() {
    let harness = harness(&["fra"]);
    let run = live_run(&harness, &[("fra", 3)]);
    report(&harness, &run, "fra", LocationStatus::Queued);
    let fra = LocationName::new("fra");
    let view = harness.orchestrator.report_online_workers(&run, &fra, 2).unwrap();
    assert_eq!(view.online_workers, 2);
    assert_eq!(view.status, LocationStatus::Queued);
    assert_eq!(view.segments.len(), 3);
    assert_eq!(view.boundaries.len(), 4);
}

#[test]
fn worker_listing_hides_drafts_by_default() {
    let harness = harness(&["fra", "sfo"]);
    let draft = draft_run(&harness, &[("fra", 1)]);
    harness.clock.advance(Duration::from_secs(1));
    let live = live_run(&harness, &[("sfo", 1), ("fra", 2)]);
    let fra = LocationName::new("fra");

    let visible = harness.orchestrator.list_jobs(&fra, false).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].run, live);
    let segments: Vec<String> = visible[0].segments.iter().map(ToString::to_string).collect();
    assert_eq!(segments, vec!["1/3:2/3".to_string(), "2/3:1".to_string()]);

    let all = harness.orchestrator.list_jobs(&fra, true).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].run, draft);
}
