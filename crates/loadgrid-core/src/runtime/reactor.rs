// crates/loadgrid-core/src/runtime/reactor.rs
// ============================================================================
// Module: Loadgrid Orchestration Reactor
// Description: Cross-location rules fired by location status changes.
// Purpose: Elect the start instant, stamp completion, and cascade failures.
// Dependencies: crate::{core, runtime::aggregator}
// ============================================================================

//! ## Overview
//! The reactor runs inside the unit of work that persisted a status change,
//! against the same in-memory run aggregate, before the aggregate is saved.
//! Three rules exist:
//!
//! 1. When the last job becomes `ready`, `started_at` is set once to the
//!    current instant plus the start delay, truncated to whole seconds.
//! 2. When the last job becomes `completed`, `completed_at` is set once to
//!    the current instant truncated to whole seconds.
//! 3. When a job becomes `failed`, every sibling that is not `failed` or
//!    `completed` is forced to `canceled` without a guard check. An earlier
//!    cancel reason is replaced by the cascade description.
//!
//! # Invariants
//! - Rules only fire while the job still holds the event's new status, so
//!   stale or duplicate deliveries are no-ops.
//! - Rules 1 and 2 never overwrite a timestamp that is already set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use serde::Serialize;

use crate::core::identifiers::LocationName;
use crate::core::job::StatusChange;
use crate::core::run::RunRecord;
use crate::core::status::LocationStatus;
use crate::core::time::Timestamp;
use crate::runtime::aggregator::StatusCounts;

// ============================================================================
// SECTION: Effects
// ============================================================================

/// Change applied to a run aggregate by a reactor rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum ReactorEffect {
    /// Readiness barrier elected the start instant.
    StartElected {
        /// Elected start instant.
        started_at: Timestamp,
    },
    /// Every job completed.
    CompletionStamped {
        /// Completion instant.
        completed_at: Timestamp,
    },
    /// Sibling forced to canceled by the failure cascade.
    SiblingCanceled {
        /// Canceled sibling.
        location: LocationName,
        /// Location whose failure triggered the cascade.
        failed_location: LocationName,
    },
}

// ============================================================================
// SECTION: Reactor
// ============================================================================

/// Status-change reactor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reactor {
    /// Lead time between the readiness barrier and the elected start.
    start_delay: Duration,
}

impl Reactor {
    /// Creates a reactor with the given start delay.
    #[must_use]
    pub const fn new(start_delay: Duration) -> Self {
        Self {
            start_delay,
        }
    }

    /// Applies every rule matching `change` to `record`.
    ///
    /// Returns the effects applied; an empty list means nothing changed.
    #[must_use]
    pub fn react(
        &self,
        record: &mut RunRecord,
        change: &StatusChange,
        now: Timestamp,
    ) -> Vec<ReactorEffect> {
        if change.job.run != record.run.name {
            return Vec::new();
        }
        let current = match record.job(&change.job.location) {
            Some(job) if job.status == change.to => job.status,
            _ => return Vec::new(),
        };
        match current {
            LocationStatus::Ready => self.elect_start(record, now).into_iter().collect(),
            LocationStatus::Completed => stamp_completion(record, now).into_iter().collect(),
            LocationStatus::Failed => cascade_failure(record, &change.job.location),
            _ => Vec::new(),
        }
    }

    /// Sets `started_at` once every job is ready.
    fn elect_start(&self, record: &mut RunRecord, now: Timestamp) -> Option<ReactorEffect> {
        if record.run.started_at.is_some()
            || !StatusCounts::from_jobs(&record.jobs).all(LocationStatus::Ready)
        {
            return None;
        }
        let started_at = now.saturating_add(self.start_delay).truncated_to_seconds();
        record.run.started_at = Some(started_at);
        Some(ReactorEffect::StartElected {
            started_at,
        })
    }
}

/// Sets `completed_at` once every job completed.
fn stamp_completion(record: &mut RunRecord, now: Timestamp) -> Option<ReactorEffect> {
    if record.run.completed_at.is_some()
        || !StatusCounts::from_jobs(&record.jobs).all(LocationStatus::Completed)
    {
        return None;
    }
    let completed_at = now.truncated_to_seconds();
    record.run.completed_at = Some(completed_at);
    Some(ReactorEffect::CompletionStamped {
        completed_at,
    })
}

/// Forces every sibling of the failed job that has not completed or failed
/// to canceled, overwriting any earlier cancel reason.
fn cascade_failure(record: &mut RunRecord, failed: &LocationName) -> Vec<ReactorEffect> {
    let description = format!("Canceled because location {failed} failed.");
    record
        .jobs
        .iter_mut()
        .filter(|job| &job.location != failed)
        .filter(|job| !matches!(job.status, LocationStatus::Completed | LocationStatus::Failed))
        .filter(|job| {
            job.status != LocationStatus::Canceled || job.status_description != description
        })
        .map(|job| {
            job.status = LocationStatus::Canceled;
            job.status_description.clone_from(&description);
            ReactorEffect::SiblingCanceled {
                location: job.location.clone(),
                failed_location: failed.clone(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::*;
    use crate::core::identifiers::RunName;
    use crate::core::run::RunParams;

    fn live_run() -> RunRecord {
        let params =
            RunParams::new("https://example.com").with_location("a", 1).with_location("b", 1);
        let mut record =
            RunRecord::draft(RunName::new("run"), params, Timestamp::from_unix_seconds(0).unwrap());
        record.run.draft = false;
        record
    }

    fn at(seconds: i64) -> Timestamp {
        Timestamp::from_unix_seconds(seconds).unwrap()
    }

    #[test]
    fn stale_event_is_ignored() {
        let reactor = Reactor::new(Duration::from_secs(30));
        let mut record = live_run();
        for job in &mut record.jobs {
            job.accept().unwrap();
        }
        let change = record.jobs[0].ready().unwrap();
        record.jobs[1].ready().unwrap();
        record.jobs[0].start().unwrap();
        assert!(reactor.react(&mut record, &change, at(10)).is_empty());
        assert_eq!(record.run.started_at, None);
    }

    #[test]
    fn start_is_truncated_and_elected_once() {
        let reactor = Reactor::new(Duration::from_millis(30_500));
        let mut record = live_run();
        for job in &mut record.jobs {
            job.accept().unwrap();
        }
        let first = record.jobs[0].ready().unwrap();
        assert!(reactor.react(&mut record, &first, at(100)).is_empty());
        let last = record.jobs[1].ready().unwrap();
        let effects = reactor.react(&mut record, &last, at(100));
        assert_eq!(
            effects,
            vec![ReactorEffect::StartElected {
                started_at: at(130)
            }]
        );
        assert!(reactor.react(&mut record, &last, at(200)).is_empty());
        assert_eq!(record.run.started_at, Some(at(130)));
    }

    #[test]
    fn cascade_overrides_an_earlier_cancel() {
        let reactor = Reactor::new(Duration::ZERO);
        let mut record = live_run();
        record.jobs[1].cancel(Some("operator stop")).unwrap();
        let change = record.jobs[0].fail(Some("boom")).unwrap();
        let effects = reactor.react(&mut record, &change, at(5));
        assert_eq!(
            effects,
            vec![ReactorEffect::SiblingCanceled {
                location: LocationName::new("b"),
                failed_location: LocationName::new("a"),
            }]
        );
        assert_eq!(record.jobs[1].status, LocationStatus::Canceled);
        assert_eq!(record.jobs[1].status_description, "Canceled because location a failed.");
        assert!(reactor.react(&mut record, &change, at(6)).is_empty());
    }

    #[test]
    fn events_for_other_runs_are_ignored() {
        let reactor = Reactor::new(Duration::ZERO);
        let mut record = live_run();
        let mut change = record.jobs[0].fail(Some("boom")).unwrap();
        change.job.run = RunName::new("other");
        assert!(reactor.react(&mut record, &change, at(0)).is_empty());
        assert_eq!(record.jobs[1].status, LocationStatus::Pending);
    }
}
