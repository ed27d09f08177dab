// crates/loadgrid-core/src/core/job.rs
// ============================================================================
// Module: Loadgrid Location Jobs
// Description: Per-(run, location) job entity with guarded transitions.
// Purpose: Apply state machine transitions and emit status-change events.
// Dependencies: crate::core::{identifiers, status}, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`LocationJob`] is one location's share of a run. Every successful
//! transition returns a [`StatusChange`] which the orchestrator hands to the
//! reactor inside the same unit of work. Rejected transitions leave the job
//! untouched and surface a [`TransitionError`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::JobKey;
use crate::core::identifiers::LocationName;
use crate::core::identifiers::RunName;
use crate::core::status::LocationStatus;
use crate::core::status::Transition;

// ============================================================================
// SECTION: Events and Errors
// ============================================================================

/// Event describing a persisted status change of one location job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Job whose status changed.
    pub job: JobKey,
    /// Transition that fired.
    pub transition: Transition,
    /// Status before the transition.
    pub from: LocationStatus,
    /// Status after the transition.
    pub to: LocationStatus,
}

/// Guard violation raised when a transition is not permitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition {transition} for job {job}: cannot move from {current} to {target}")]
pub struct TransitionError {
    /// Job the transition was attempted on.
    pub job: JobKey,
    /// Attempted transition.
    pub transition: Transition,
    /// Status at the time of the attempt.
    pub current: LocationStatus,
    /// Status the transition would have produced.
    pub target: LocationStatus,
}

// ============================================================================
// SECTION: Location Job
// ============================================================================

/// One location's share of a test run.
///
/// # Invariants
/// - `num_workers` is positive and fixed once the run is live.
/// - `status_description` is only written by fail, cancel, and retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationJob {
    /// Owning run.
    pub run: RunName,
    /// Execution site.
    pub location: LocationName,
    /// Number of workers requested at this location.
    pub num_workers: u32,
    /// Number of workers observed online.
    pub online_workers: u32,
    /// Current status.
    pub status: LocationStatus,
    /// Last recorded failure, cancel, or retry reason.
    pub status_description: String,
}

impl LocationJob {
    /// Creates a pending job with no online workers.
    #[must_use]
    pub const fn new(run: RunName, location: LocationName, num_workers: u32) -> Self {
        Self {
            run,
            location,
            num_workers,
            online_workers: 0,
            status: LocationStatus::Pending,
            status_description: String::new(),
        }
    }

    /// Returns the job identity.
    #[must_use]
    pub fn key(&self) -> JobKey {
        JobKey::new(self.run.clone(), self.location.clone())
    }

    /// Returns the recorded description or the canned text for the status.
    #[must_use]
    pub fn status_text(&self) -> &str {
        if self.status_description.is_empty() {
            self.status.default_description()
        } else {
            &self.status_description
        }
    }

    /// Applies a transition after checking its guard.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the current status is outside the
    /// transition's source set. The job is unchanged in that case.
    pub fn apply(
        &mut self,
        transition: Transition,
        message: Option<&str>,
    ) -> Result<StatusChange, TransitionError> {
        let from = self.status;
        let to = transition.target();
        if !transition.permits(from) {
            return Err(TransitionError {
                job: self.key(),
                transition,
                current: from,
                target: to,
            });
        }
        if transition.records_message()
            && let Some(message) = message.filter(|message| !message.is_empty())
        {
            self.status_description = message.to_string();
        }
        self.status = to;
        Ok(StatusChange {
            job: self.key(),
            transition,
            from,
            to,
        })
    }

    /// Marks the job as accepted by its location.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the job is pending.
    pub fn accept(&mut self) -> Result<StatusChange, TransitionError> {
        self.apply(Transition::Accept, None)
    }

    /// Marks all workers at the location as ready.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the job is queued.
    pub fn ready(&mut self) -> Result<StatusChange, TransitionError> {
        self.apply(Transition::Ready, None)
    }

    /// Marks load generation as started.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the job is ready.
    pub fn start(&mut self) -> Result<StatusChange, TransitionError> {
        self.apply(Transition::Start, None)
    }

    /// Marks load generation as finished.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the job is running.
    pub fn finish(&mut self) -> Result<StatusChange, TransitionError> {
        self.apply(Transition::Finish, None)
    }

    /// Marks the job as failed, recording a non-empty message.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the job is already terminal.
    pub fn fail(&mut self, message: Option<&str>) -> Result<StatusChange, TransitionError> {
        self.apply(Transition::Fail, message)
    }

    /// Cancels the job, recording a non-empty message.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the job is already terminal.
    pub fn cancel(&mut self, message: Option<&str>) -> Result<StatusChange, TransitionError> {
        self.apply(Transition::Cancel, message)
    }

    /// Returns a failed job to pending, recording a non-empty message.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the job is failed.
    pub fn retry(&mut self, message: Option<&str>) -> Result<StatusChange, TransitionError> {
        self.apply(Transition::Retry, message)
    }

    /// Returns a fresh pending copy of the job owned by `run`.
    #[must_use]
    pub fn reset_for(&self, run: RunName) -> Self {
        Self::new(run, self.location.clone(), self.num_workers)
    }
}

#[cfg(test)]
mod tests {
    #![allow(
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::*;

    fn job() -> LocationJob {
        LocationJob::new(RunName::new("run"), LocationName::new("fra"), 2)
    }

    #[test]
    fn happy_path_walks_every_state() {
        let mut job = job();
        job.accept().unwrap();
        job.ready().unwrap();
        job.start().unwrap();
        let change = job.finish().unwrap();
        assert_eq!(change.from, LocationStatus::Running);
        assert_eq!(change.to, LocationStatus::Completed);
        assert_eq!(job.status_text(), "Test has completed successfully.");
    }

    #[test]
    fn rejected_transition_leaves_job_untouched() {
        let mut job = job();
        job.fail(Some("boom")).unwrap();
        let before = job.clone();
        let err = job.start().unwrap_err();
        assert_eq!(err.current, LocationStatus::Failed);
        assert_eq!(err.target, LocationStatus::Running);
        assert_eq!(err.job, before.key());
        assert_eq!(job, before);
    }

    #[test]
    fn empty_message_keeps_previous_description() {
        let mut job = job();
        job.fail(Some("disk full")).unwrap();
        job.retry(Some("")).unwrap();
        assert_eq!(job.status, LocationStatus::Pending);
        assert_eq!(job.status_description, "disk full");
        job.cancel(Some("operator stop")).unwrap();
        assert_eq!(job.status_text(), "operator stop");
    }

    #[test]
    fn happy_path_transitions_ignore_messages() {
        let mut job = job();
        job.apply(Transition::Accept, Some("ignored")).unwrap();
        assert!(job.status_description.is_empty());
        assert_eq!(job.status_text(), "Queued for execution. Waiting for workers to come online.");
    }

    #[test]
    fn failed_job_without_message_has_empty_text() {
        let mut job = job();
        job.fail(None).unwrap();
        assert_eq!(job.status_text(), "");
    }
}
