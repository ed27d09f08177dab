// crates/loadgrid-core/src/runtime/aggregator.rs
// ============================================================================
// Module: Loadgrid Run Aggregator
// Description: Per-status counts and the coarse run status.
// Purpose: Summarize a run from its location jobs on every request.
// Dependencies: crate::core, serde
// ============================================================================

//! ## Overview
//! The aggregator is a pure fold over a run's jobs. It is recomputed for
//! every view; nothing is cached between requests.
//!
//! The coarse status follows a fixed priority: `draft` for draft runs, then
//! `failed`, `canceled`, `completed` (only when every job completed), then
//! the earliest non-empty of `pending`, `queued`, `ready`, `running`, and
//! `unknown` when the run has no jobs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::core::job::LocationJob;
use crate::core::run::RunRecord;
use crate::core::status::LocationStatus;

// ============================================================================
// SECTION: Counts
// ============================================================================

/// Number of jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    /// Jobs waiting to be accepted.
    pub pending: usize,
    /// Jobs waiting for workers.
    pub queued: usize,
    /// Jobs with all workers ready.
    pub ready: usize,
    /// Jobs generating load.
    pub running: usize,
    /// Jobs that finished.
    pub completed: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Jobs that were canceled.
    pub canceled: usize,
    /// All jobs.
    pub total: usize,
}

impl StatusCounts {
    /// Counts jobs per status.
    #[must_use]
    pub fn from_jobs(jobs: &[LocationJob]) -> Self {
        let mut counts = Self::default();
        for job in jobs {
            *counts.slot(job.status) += 1;
            counts.total += 1;
        }
        counts
    }

    /// Returns the count for `status`.
    #[must_use]
    pub const fn count(&self, status: LocationStatus) -> usize {
        match status {
            LocationStatus::Pending => self.pending,
            LocationStatus::Queued => self.queued,
            LocationStatus::Ready => self.ready,
            LocationStatus::Running => self.running,
            LocationStatus::Completed => self.completed,
            LocationStatus::Failed => self.failed,
            LocationStatus::Canceled => self.canceled,
        }
    }

    /// Returns true when the run has jobs and every one has `status`.
    #[must_use]
    pub const fn all(&self, status: LocationStatus) -> bool {
        self.total > 0 && self.count(status) == self.total
    }

    /// Returns the counter for `status`.
    const fn slot(&mut self, status: LocationStatus) -> &mut usize {
        match status {
            LocationStatus::Pending => &mut self.pending,
            LocationStatus::Queued => &mut self.queued,
            LocationStatus::Ready => &mut self.ready,
            LocationStatus::Running => &mut self.running,
            LocationStatus::Completed => &mut self.completed,
            LocationStatus::Failed => &mut self.failed,
            LocationStatus::Canceled => &mut self.canceled,
        }
    }
}

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Coarse status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is still a draft.
    Draft,
    /// Some job waits to be accepted.
    Pending,
    /// Some job waits for workers.
    Queued,
    /// Some job is ready.
    Ready,
    /// Some job is running.
    Running,
    /// Every job completed.
    Completed,
    /// Some job failed.
    Failed,
    /// Some job was canceled.
    Canceled,
    /// Run has no jobs.
    Unknown,
}

impl RunStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregated state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Per-status job counts.
    pub counts: StatusCounts,
    /// Every job is ready.
    pub ready: bool,
    /// Every job completed.
    pub completed: bool,
    /// Coarse run status.
    pub status: RunStatus,
}

/// Summarizes a run from its current jobs.
#[must_use]
pub fn summarize(record: &RunRecord) -> RunSummary {
    let counts = StatusCounts::from_jobs(&record.jobs);
    RunSummary {
        counts,
        ready: counts.all(LocationStatus::Ready),
        completed: counts.all(LocationStatus::Completed),
        status: coarse_status(record.run.draft, &counts),
    }
}

/// Applies the run status priority order.
fn coarse_status(draft: bool, counts: &StatusCounts) -> RunStatus {
    if draft {
        return RunStatus::Draft;
    }
    if counts.failed > 0 {
        return RunStatus::Failed;
    }
    if counts.canceled > 0 {
        return RunStatus::Canceled;
    }
    if counts.all(LocationStatus::Completed) {
        return RunStatus::Completed;
    }
    [
        (LocationStatus::Pending, RunStatus::Pending),
        (LocationStatus::Queued, RunStatus::Queued),
        (LocationStatus::Ready, RunStatus::Ready),
        (LocationStatus::Running, RunStatus::Running),
    ]
    .into_iter()
    .find(|(status, _)| counts.count(*status) > 0)
    .map_or(RunStatus::Unknown, |(_, run_status)| run_status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identifiers::RunName;
    use crate::core::run::RunParams;
    use crate::core::time::Timestamp;

    fn record(statuses: &[LocationStatus], draft: bool) -> RunRecord {
        let mut params = RunParams::new("https://example.com");
        for index in 0..statuses.len() {
            params = params.with_location(format!("loc-{index}"), 1);
        }
        let now = Timestamp::from_datetime(time::OffsetDateTime::UNIX_EPOCH);
        let mut record = RunRecord::draft(RunName::new("run"), params, now);
        record.run.draft = draft;
        for (job, status) in record.jobs.iter_mut().zip(statuses) {
            job.status = *status;
        }
        record
    }

    #[test]
    fn priority_order_is_respected() {
        use LocationStatus as S;
        let status =
            |statuses: &[LocationStatus], draft: bool| summarize(&record(statuses, draft)).status;
        assert_eq!(status(&[S::Running, S::Failed], true), RunStatus::Draft);
        assert_eq!(status(&[S::Canceled, S::Failed], false), RunStatus::Failed);
        assert_eq!(status(&[S::Completed, S::Canceled], false), RunStatus::Canceled);
        assert_eq!(status(&[S::Completed, S::Completed], false), RunStatus::Completed);
        assert_eq!(status(&[S::Running, S::Queued], false), RunStatus::Queued);
        assert_eq!(status(&[S::Completed, S::Running], false), RunStatus::Running);
        assert_eq!(status(&[], false), RunStatus::Unknown);
    }

    #[test]
    fn flags_require_jobs() {
        let empty = summarize(&record(&[], false));
        assert!(!empty.ready);
        assert!(!empty.completed);
        let ready = summarize(&record(&[LocationStatus::Ready, LocationStatus::Ready], false));
        assert!(ready.ready);
        assert_eq!(ready.counts.ready, 2);
        assert_eq!(ready.counts.total, 2);
    }
}
