// crates/loadgrid-core/src/interfaces/mod.rs
// ============================================================================
// Module: Loadgrid Interfaces
// Description: Backend-agnostic seams for storage, time, naming, and audit.
// Purpose: Define the contracts the orchestrator consumes from its host.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! The orchestrator owns no I/O. It persists run aggregates through
//! [`RunStore`], reads time through [`Clock`], draws run names from
//! [`NameGenerator`], and reports what it did through [`AuditSink`].
//! Stores must save a run aggregate atomically and reject saves whose
//! revision is stale.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::LocationName;
use crate::core::identifiers::RunName;
use crate::core::location::TestLocation;
use crate::core::run::RunRecord;
use crate::core::status::LocationStatus;
use crate::core::status::Transition;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Run Store
// ============================================================================

/// Run store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("run store io error: {0}")]
    Io(String),
    /// Store data is corrupted or fails integrity checks.
    #[error("run store corruption: {0}")]
    Corrupt(String),
    /// Store data version is incompatible.
    #[error("run store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store data is invalid.
    #[error("run store invalid data: {0}")]
    Invalid(String),
    /// Saved revision no longer matches the stored one.
    #[error("run store conflict: {0}")]
    Conflict(String),
    /// Record with the same key already exists.
    #[error("run store duplicate: {0}")]
    Duplicate(String),
    /// Referential constraint rejected the write.
    #[error("run store constraint violation: {0}")]
    Constraint(String),
    /// Store reported an error.
    #[error("run store error: {0}")]
    Store(String),
}

/// Persistence for run aggregates and test locations.
///
/// # Invariants
/// - `insert_run` and `save_run` persist the run, its jobs, and its
///   attachments as one atomic unit.
/// - `save_run` succeeds only when the stored revision equals
///   `record.revision` and returns the new revision.
/// - Jobs may only reference registered locations, and locations referenced
///   by any job cannot be deleted.
pub trait RunStore {
    /// Registers a new location.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the name is taken.
    fn insert_location(&self, location: &TestLocation) -> Result<(), StoreError>;

    /// Loads a location by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_location(&self, name: &LocationName) -> Result<Option<TestLocation>, StoreError>;

    /// Lists every location ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_locations(&self) -> Result<Vec<TestLocation>, StoreError>;

    /// Deletes a location, returning false when it did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Constraint`] when a job still references it.
    fn delete_location(&self, name: &LocationName) -> Result<bool, StoreError>;

    /// Records a liveness ping, returning false for unknown locations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn record_ping(&self, name: &LocationName, at: Timestamp) -> Result<bool, StoreError>;

    /// Inserts a new run aggregate and returns its first revision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] when the run name is taken and
    /// [`StoreError::Constraint`] when a job references an unknown location.
    fn insert_run(&self, record: &RunRecord) -> Result<u64, StoreError>;

    /// Loads a run aggregate by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn load_run(&self, name: &RunName) -> Result<Option<RunRecord>, StoreError>;

    /// Saves a run aggregate loaded at `record.revision`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] when the run changed or vanished
    /// since it was loaded.
    fn save_run(&self, record: &RunRecord) -> Result<u64, StoreError>;

    /// Deletes a run with its jobs and attachments, returning false when it
    /// did not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the delete fails.
    fn delete_run(&self, name: &RunName) -> Result<bool, StoreError>;

    /// Lists every run aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when listing fails.
    fn list_runs(&self) -> Result<Vec<RunRecord>, StoreError>;
}

// ============================================================================
// SECTION: Clock and Naming
// ============================================================================

/// Source of the current instant.
pub trait Clock {
    /// Returns the current instant.
    fn now(&self) -> Timestamp;
}

/// Source of fresh run names.
pub trait NameGenerator {
    /// Returns a new candidate name for a run against `target`.
    fn run_name(&self, target: &str) -> RunName;
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Structured audit record emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// Instant the event was recorded.
    pub timestamp: Timestamp,
    /// Event payload, tagged by `event`.
    #[serde(flatten)]
    pub kind: AuditKind,
}

impl AuditEvent {
    /// Creates an audit event.
    #[must_use]
    pub const fn new(timestamp: Timestamp, kind: AuditKind) -> Self {
        Self {
            timestamp,
            kind,
        }
    }
}

/// Audit event payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditKind {
    /// Location registered.
    LocationRegistered {
        /// Location name.
        location: LocationName,
    },
    /// Location removed.
    LocationRemoved {
        /// Location name.
        location: LocationName,
    },
    /// Location pinged.
    LocationPinged {
        /// Location name.
        location: LocationName,
    },
    /// Draft run created.
    RunCreated {
        /// Run name.
        run: RunName,
        /// Number of location jobs.
        jobs: usize,
    },
    /// Run duplicated into a new draft.
    RunDuplicated {
        /// Source run.
        source: RunName,
        /// New run.
        run: RunName,
    },
    /// Run left draft.
    RunStarted {
        /// Run name.
        run: RunName,
    },
    /// Run canceled by an operator.
    RunCanceled {
        /// Run name.
        run: RunName,
        /// Jobs moved to canceled.
        canceled: usize,
    },
    /// Run deleted.
    RunDeleted {
        /// Run name.
        run: RunName,
    },
    /// Draft job set replaced.
    LocationsReplaced {
        /// Run name.
        run: RunName,
        /// Number of jobs after the edit.
        jobs: usize,
    },
    /// Location job transition applied.
    TransitionApplied {
        /// Run name.
        run: RunName,
        /// Location name.
        location: LocationName,
        /// Transition that fired.
        transition: Transition,
        /// Status before.
        from: LocationStatus,
        /// Status after.
        to: LocationStatus,
    },
    /// Location job transition rejected by its guard.
    TransitionRejected {
        /// Run name.
        run: RunName,
        /// Location name.
        location: LocationName,
        /// Attempted transition.
        transition: Transition,
        /// Status at the time of the attempt.
        current: LocationStatus,
    },
    /// Observed worker count updated.
    WorkersReported {
        /// Run name.
        run: RunName,
        /// Location name.
        location: LocationName,
        /// Workers observed online.
        online_workers: u32,
    },
    /// Readiness barrier elected the start instant.
    StartElected {
        /// Run name.
        run: RunName,
        /// Elected start instant.
        started_at: Timestamp,
    },
    /// Last location completed.
    CompletionStamped {
        /// Run name.
        run: RunName,
        /// Completion instant.
        completed_at: Timestamp,
    },
    /// Sibling job canceled because another location failed.
    SiblingCanceled {
        /// Run name.
        run: RunName,
        /// Canceled sibling.
        location: LocationName,
        /// Location whose failure triggered the cascade.
        failed_location: LocationName,
    },
}

/// Destination for audit events.
pub trait AuditSink: Send + Sync {
    /// Records an audit event. Sinks never fail the calling command.
    fn record(&self, event: &AuditEvent);
}
