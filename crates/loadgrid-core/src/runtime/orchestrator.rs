// crates/loadgrid-core/src/runtime/orchestrator.rs
// ============================================================================
// Module: Loadgrid Orchestrator
// Description: Command surface for runs, location jobs, and locations.
// Purpose: Run every command as one load-modify-save unit of work.
// Dependencies: crate::{core, interfaces, runtime}, thiserror
// ============================================================================

//! ## Overview
//! [`Orchestrator`] is the only writer of run aggregates. Every command
//! loads the aggregate, applies guarded transitions, lets the
//! [`Reactor`] apply cross-location rules to the same aggregate, and saves it
//! with an optimistic revision check. A lost race surfaces as
//! [`OrchestratorError::ConcurrentModification`]; callers retry the whole
//! command. The orchestrator never retries on its own and never blocks.
//! Failed commands leave stored state untouched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::core::identifiers::JobKey;
use crate::core::identifiers::LocationName;
use crate::core::identifiers::RunName;
use crate::core::identifiers::is_slug;
use crate::core::job::LocationJob;
use crate::core::job::StatusChange;
use crate::core::job::TransitionError;
use crate::core::location::TestLocation;
use crate::core::run::LocationRequest;
use crate::core::run::ParamError;
use crate::core::run::RunParams;
use crate::core::run::RunRecord;
use crate::core::run::validate_location_requests;
use crate::core::status::LocationStatus;
use crate::core::status::Transition;
use crate::core::time::Timestamp;
use crate::interfaces::AuditEvent;
use crate::interfaces::AuditKind;
use crate::interfaces::AuditSink;
use crate::interfaces::Clock;
use crate::interfaces::NameGenerator;
use crate::interfaces::RunStore;
use crate::interfaces::StoreError;
use crate::runtime::reactor::Reactor;
use crate::runtime::reactor::ReactorEffect;
use crate::runtime::views::LocationView;
use crate::runtime::views::RunView;
use crate::runtime::views::WorkerJobView;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Default lead time between the readiness barrier and the elected start.
pub const DEFAULT_START_DELAY: Duration = Duration::from_secs(30);
/// Default window within which a location ping counts as online.
pub const DEFAULT_LOCATION_LIVENESS: Duration = Duration::from_secs(300);
/// Attempts at drawing an unused run name before giving up.
const MAX_NAME_ATTEMPTS: usize = 8;

/// Orchestrator configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Lead time added to the readiness instant to elect the start.
    pub start_delay: Duration,
    /// Ping age under which a location counts as online.
    pub location_liveness: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            start_delay: DEFAULT_START_DELAY,
            location_liveness: DEFAULT_LOCATION_LIVENESS,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Kind of entity a lookup failed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Test run.
    Run,
    /// Test location.
    Location,
    /// Location job.
    Job,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Run => "run",
            Self::Location => "location",
            Self::Job => "location job",
        })
    }
}

/// Orchestrator command errors.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Transition guard rejected the request.
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    /// Run, location, or job does not exist.
    #[error("unknown {kind}: {name}")]
    UnknownEntity {
        /// Kind of the missing entity.
        kind: EntityKind,
        /// Name of the missing entity.
        name: String,
    },
    /// Run changed between load and save; retry the command.
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),
    /// Uniqueness or referential rule violated.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    /// Caller input failed validation.
    #[error("invalid input: {0}")]
    InvalidInput(ParamError),
    /// Storage failed.
    #[error(transparent)]
    Store(StoreError),
}

impl OrchestratorError {
    /// Builds an unknown-entity error.
    fn unknown(kind: EntityKind, name: impl fmt::Display) -> Self {
        Self::UnknownEntity {
            kind,
            name: name.to_string(),
        }
    }
}

impl From<StoreError> for OrchestratorError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(message) => Self::ConcurrentModification(message),
            StoreError::Duplicate(message) | StoreError::Constraint(message) => {
                Self::ConstraintViolation(message)
            }
            other => Self::Store(other),
        }
    }
}

impl From<ParamError> for OrchestratorError {
    fn from(err: ParamError) -> Self {
        match err {
            ParamError::DuplicateLocation(_) => Self::ConstraintViolation(err.to_string()),
            other => Self::InvalidInput(other),
        }
    }
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Command surface over run aggregates.
pub struct Orchestrator<S, N, C, A> {
    /// Run store implementation.
    store: S,
    /// Run name generator.
    names: N,
    /// Time source.
    clock: C,
    /// Audit sink.
    audit: A,
    /// Cross-location rules.
    reactor: Reactor,
    /// Orchestrator configuration.
    config: OrchestratorConfig,
}

impl<S, N, C, A> Orchestrator<S, N, C, A>
where
    S: RunStore,
    N: NameGenerator,
    C: Clock,
    A: AuditSink,
{
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(store: S, names: N, clock: C, audit: A, config: OrchestratorConfig) -> Self {
        Self {
            store,
            names,
            clock,
            audit,
            reactor: Reactor::new(config.start_delay),
            config,
        }
    }

    // ------------------------------------------------------------------------
    // Locations
    // ------------------------------------------------------------------------

    /// Registers a new test location.
    ///
    /// An empty display name falls back to the location name.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidInput`] for non-slug names and
    /// [`OrchestratorError::ConstraintViolation`] when the name is taken.
    pub fn register_location(
        &self,
        name: &str,
        display_name: &str,
    ) -> Result<LocationView, OrchestratorError> {
        if !is_slug(name) {
            return Err(ParamError::InvalidName(name.to_string()).into());
        }
        let display_name = if display_name.trim().is_empty() { name } else { display_name };
        let location = TestLocation::new(LocationName::new(name), display_name);
        self.store.insert_location(&location)?;
        let now = self.clock.now();
        self.emit(
            now,
            AuditKind::LocationRegistered {
                location: location.name.clone(),
            },
        );
        Ok(LocationView::from_location(location, now, self.config.location_liveness))
    }

    /// Removes a test location no job refers to.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown locations and
    /// [`OrchestratorError::ConstraintViolation`] while any job references it.
    pub fn remove_location(&self, name: &LocationName) -> Result<(), OrchestratorError> {
        if !self.store.delete_location(name)? {
            return Err(OrchestratorError::unknown(EntityKind::Location, name));
        }
        self.emit(
            self.clock.now(),
            AuditKind::LocationRemoved {
                location: name.clone(),
            },
        );
        Ok(())
    }

    /// Records a liveness ping from a location's agent.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown locations.
    pub fn ping_location(&self, name: &LocationName) -> Result<LocationView, OrchestratorError> {
        let now = self.clock.now();
        if !self.store.record_ping(name, now)? {
            return Err(OrchestratorError::unknown(EntityKind::Location, name));
        }
        self.emit(
            now,
            AuditKind::LocationPinged {
                location: name.clone(),
            },
        );
        let location = self
            .store
            .load_location(name)?
            .ok_or_else(|| OrchestratorError::unknown(EntityKind::Location, name))?;
        Ok(LocationView::from_location(location, now, self.config.location_liveness))
    }

    /// Lists locations with their liveness.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] when listing fails.
    pub fn list_locations(&self) -> Result<Vec<LocationView>, OrchestratorError> {
        let now = self.clock.now();
        Ok(self
            .store
            .list_locations()?
            .into_iter()
            .map(|location| {
                LocationView::from_location(location, now, self.config.location_liveness)
            })
            .collect())
    }

    // ------------------------------------------------------------------------
    // Run lifecycle
    // ------------------------------------------------------------------------

    /// Creates a draft run from validated parameters.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidInput`] for invalid parameters,
    /// [`OrchestratorError::UnknownEntity`] for unregistered locations, and
    /// [`OrchestratorError::ConstraintViolation`] for repeated locations.
    pub fn create_run(&self, params: RunParams) -> Result<RunView, OrchestratorError> {
        params.validate()?;
        self.require_locations(&params.locations)?;
        let now = self.clock.now();
        let record =
            self.insert_fresh(&params.target, |name| RunRecord::draft(name, params.clone(), now))?;
        self.emit(
            now,
            AuditKind::RunCreated {
                run: record.run.name.clone(),
                jobs: record.jobs.len(),
            },
        );
        Ok(RunView::from_record(&record))
    }

    /// Commits a draft run to execution. Starting a live run is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown runs and
    /// [`OrchestratorError::ConcurrentModification`] on a lost race.
    pub fn start_run(&self, name: &RunName) -> Result<RunView, OrchestratorError> {
        let mut record = self.load(name)?;
        if record.run.draft {
            record.run.draft = false;
            self.commit(&mut record)?;
            self.emit(
                self.clock.now(),
                AuditKind::RunStarted {
                    run: name.clone(),
                },
            );
        }
        Ok(RunView::from_record(&record))
    }

    /// Cancels every job that is not already completed, failed, or canceled.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown runs and
    /// [`OrchestratorError::ConcurrentModification`] on a lost race.
    pub fn cancel_run(
        &self,
        name: &RunName,
        message: Option<&str>,
    ) -> Result<RunView, OrchestratorError> {
        let mut record = self.load(name)?;
        let now = self.clock.now();
        let mut changes = Vec::new();
        for job in record.jobs.iter_mut().filter(|job| !job.status.is_terminal()) {
            changes.push(job.cancel(message)?);
        }
        if changes.is_empty() {
            return Ok(RunView::from_record(&record));
        }
        let effects: Vec<ReactorEffect> = changes
            .iter()
            .flat_map(|change| self.reactor.react(&mut record, change, now))
            .collect();
        self.commit(&mut record)?;
        for change in &changes {
            self.emit_change(now, change);
        }
        self.emit_effects(now, name, &effects);
        self.emit(
            now,
            AuditKind::RunCanceled {
                run: name.clone(),
                canceled: changes.len(),
            },
        );
        Ok(RunView::from_record(&record))
    }

    /// Copies a run into a fresh draft with pending jobs.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown runs and
    /// [`OrchestratorError::ConstraintViolation`] when a referenced location
    /// disappeared.
    pub fn duplicate_run(&self, name: &RunName) -> Result<RunView, OrchestratorError> {
        let source = self.load(name)?;
        let now = self.clock.now();
        let record = self.insert_fresh(&source.run.target, |new_name| {
            source.duplicate_as(new_name, now)
        })?;
        self.emit(
            now,
            AuditKind::RunDuplicated {
                source: name.clone(),
                run: record.run.name.clone(),
            },
        );
        Ok(RunView::from_record(&record))
    }

    /// Deletes a run with its jobs and attachments.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown runs.
    pub fn delete_run(&self, name: &RunName) -> Result<(), OrchestratorError> {
        if !self.store.delete_run(name)? {
            return Err(OrchestratorError::unknown(EntityKind::Run, name));
        }
        self.emit(
            self.clock.now(),
            AuditKind::RunDeleted {
                run: name.clone(),
            },
        );
        Ok(())
    }

    /// Replaces the job set of a draft run.
    ///
    /// Jobs kept by the request keep their position and take the new worker
    /// count; dropped jobs are removed and new ones are appended in request
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::ConstraintViolation`] for live runs or
    /// repeated locations and [`OrchestratorError::UnknownEntity`] for
    /// unknown runs or locations.
    pub fn replace_locations(
        &self,
        name: &RunName,
        requests: &[LocationRequest],
    ) -> Result<RunView, OrchestratorError> {
        validate_location_requests(requests)?;
        self.require_locations(requests)?;
        let mut record = self.load(name)?;
        if !record.run.draft {
            return Err(OrchestratorError::ConstraintViolation(format!(
                "run {name} is live; its locations can no longer change"
            )));
        }
        let mut jobs: Vec<_> = record
            .jobs
            .drain(..)
            .filter_map(|mut job| {
                let request = requests.iter().find(|request| request.location == job.location)?;
                job.num_workers = request.num_workers;
                Some(job)
            })
            .collect();
        for request in requests {
            if !jobs.iter().any(|job| job.location == request.location) {
                jobs.push(LocationJob::new(
                    name.clone(),
                    request.location.clone(),
                    request.num_workers,
                ));
            }
        }
        record.jobs = jobs;
        self.commit(&mut record)?;
        self.emit(
            self.clock.now(),
            AuditKind::LocationsReplaced {
                run: name.clone(),
                jobs: record.jobs.len(),
            },
        );
        Ok(RunView::from_record(&record))
    }

    /// Lists every run, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] when listing fails.
    pub fn list_runs(&self) -> Result<Vec<RunView>, OrchestratorError> {
        Ok(self.sorted_runs()?.iter().map(RunView::from_record).collect())
    }

    /// Returns the aggregated view of a run.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown runs.
    pub fn run_view(&self, name: &RunName) -> Result<RunView, OrchestratorError> {
        Ok(RunView::from_record(&self.load(name)?))
    }

    // ------------------------------------------------------------------------
    // Location jobs
    // ------------------------------------------------------------------------

    /// Applies a named transition to one job of a live run.
    ///
    /// Reactor rules run against the same aggregate before it is saved.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::InvalidTransition`] when the guard
    /// rejects the transition, [`OrchestratorError::UnknownEntity`] when the
    /// run has no job at `location`, [`OrchestratorError::ConstraintViolation`]
    /// for draft runs, and [`OrchestratorError::ConcurrentModification`] on a
    /// lost race.
    pub fn transition_location(
        &self,
        run: &RunName,
        location: &LocationName,
        transition: Transition,
        message: Option<&str>,
    ) -> Result<WorkerJobView, OrchestratorError> {
        let mut record = self.load(run)?;
        let draft = record.run.draft;
        let job = record.job_mut(location).ok_or_else(|| {
            OrchestratorError::unknown(EntityKind::Job, JobKey::new(run.clone(), location.clone()))
        })?;
        if draft {
            return Err(OrchestratorError::ConstraintViolation(format!(
                "run {run} is a draft; its jobs cannot change status"
            )));
        }
        let now = self.clock.now();
        let change = match job.apply(transition, message) {
            Ok(change) => change,
            Err(err) => {
                self.emit(
                    now,
                    AuditKind::TransitionRejected {
                        run: run.clone(),
                        location: location.clone(),
                        transition,
                        current: err.current,
                    },
                );
                return Err(err.into());
            }
        };
        let effects = self.reactor.react(&mut record, &change, now);
        self.commit(&mut record)?;
        self.emit_change(now, &change);
        self.emit_effects(now, run, &effects);
        self.worker_view(&record, location)
    }

    /// Moves a job to the requested status through the unique transition
    /// leading there.
    ///
    /// # Errors
    ///
    /// Same as [`Self::transition_location`].
    pub fn request_status(
        &self,
        run: &RunName,
        location: &LocationName,
        status: LocationStatus,
        message: Option<&str>,
    ) -> Result<WorkerJobView, OrchestratorError> {
        self.transition_location(run, location, Transition::targeting(status), message)
    }

    /// Records the observed number of online workers. Status is unaffected.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown jobs and
    /// [`OrchestratorError::ConcurrentModification`] on a lost race.
    pub fn report_online_workers(
        &self,
        run: &RunName,
        location: &LocationName,
        online_workers: u32,
    ) -> Result<WorkerJobView, OrchestratorError> {
        let mut record = self.load(run)?;
        let job = record.job_mut(location).ok_or_else(|| {
            OrchestratorError::unknown(EntityKind::Job, JobKey::new(run.clone(), location.clone()))
        })?;
        if job.online_workers != online_workers {
            job.online_workers = online_workers;
            self.commit(&mut record)?;
            self.emit(
                self.clock.now(),
                AuditKind::WorkersReported {
                    run: run.clone(),
                    location: location.clone(),
                    online_workers,
                },
            );
        }
        self.worker_view(&record, location)
    }

    /// Re-delivers a status-change event to the reactor.
    ///
    /// Hosts wiring external change notifications call this; the rules are
    /// idempotent, so duplicate or stale events change nothing.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown runs and
    /// [`OrchestratorError::ConcurrentModification`] on a lost race.
    pub fn deliver_status_change(
        &self,
        change: &StatusChange,
    ) -> Result<Vec<ReactorEffect>, OrchestratorError> {
        let mut record = self.load(&change.job.run)?;
        let now = self.clock.now();
        let effects = self.reactor.react(&mut record, change, now);
        if !effects.is_empty() {
            self.commit(&mut record)?;
            self.emit_effects(now, &change.job.run, &effects);
        }
        Ok(effects)
    }

    /// Returns the worker view of one job.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::UnknownEntity`] for unknown runs or jobs.
    pub fn location_view(
        &self,
        run: &RunName,
        location: &LocationName,
    ) -> Result<WorkerJobView, OrchestratorError> {
        self.worker_view(&self.load(run)?, location)
    }

    /// Lists the jobs a location's agent should look at, oldest run first.
    ///
    /// Draft runs are skipped unless `include_drafts` is set.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Store`] when listing fails.
    pub fn list_jobs(
        &self,
        location: &LocationName,
        include_drafts: bool,
    ) -> Result<Vec<WorkerJobView>, OrchestratorError> {
        let mut views = Vec::new();
        for record in self.sorted_runs()? {
            if record.run.draft && !include_drafts {
                continue;
            }
            if let Some(job) = record.job(location) {
                views.push(WorkerJobView::from_record(&record, job)?);
            }
        }
        Ok(views)
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    /// Loads a run aggregate or fails with an unknown-run error.
    fn load(&self, name: &RunName) -> Result<RunRecord, OrchestratorError> {
        self.store.load_run(name)?.ok_or_else(|| OrchestratorError::unknown(EntityKind::Run, name))
    }

    /// Saves a run aggregate and adopts the new revision.
    fn commit(&self, record: &mut RunRecord) -> Result<(), OrchestratorError> {
        record.revision = self.store.save_run(record)?;
        Ok(())
    }

    /// Inserts a fresh aggregate, drawing new names on collisions.
    fn insert_fresh(
        &self,
        target: &str,
        build: impl Fn(RunName) -> RunRecord,
    ) -> Result<RunRecord, OrchestratorError> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let mut record = build(self.names.run_name(target));
            match self.store.insert_run(&record) {
                Ok(revision) => {
                    record.revision = revision;
                    return Ok(record);
                }
                Err(StoreError::Duplicate(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Err(OrchestratorError::ConstraintViolation(format!(
            "no unused run name for {target} after {MAX_NAME_ATTEMPTS} attempts"
        )))
    }

    /// Fails unless every requested location is registered.
    fn require_locations(&self, requests: &[LocationRequest]) -> Result<(), OrchestratorError> {
        for request in requests {
            if self.store.load_location(&request.location)?.is_none() {
                return Err(OrchestratorError::unknown(EntityKind::Location, &request.location));
            }
        }
        Ok(())
    }

    /// Returns every run ordered by creation instant, then name.
    fn sorted_runs(&self) -> Result<Vec<RunRecord>, OrchestratorError> {
        let mut records = self.store.list_runs()?;
        records.sort_by(|left, right| {
            left.run
                .created_at
                .cmp(&right.run.created_at)
                .then_with(|| left.run.name.cmp(&right.run.name))
        });
        Ok(records)
    }

    /// Builds the worker view of the job at `location`.
    fn worker_view(
        &self,
        record: &RunRecord,
        location: &LocationName,
    ) -> Result<WorkerJobView, OrchestratorError> {
        let job = record.job(location).ok_or_else(|| {
            OrchestratorError::unknown(
                EntityKind::Job,
                JobKey::new(record.run.name.clone(), location.clone()),
            )
        })?;
        Ok(WorkerJobView::from_record(record, job)?)
    }

    /// Records an audit event.
    fn emit(&self, now: Timestamp, kind: AuditKind) {
        self.audit.record(&AuditEvent::new(now, kind));
    }

    /// Records an applied transition.
    fn emit_change(&self, now: Timestamp, change: &StatusChange) {
        self.emit(
            now,
            AuditKind::TransitionApplied {
                run: change.job.run.clone(),
                location: change.job.location.clone(),
                transition: change.transition,
                from: change.from,
                to: change.to,
            },
        );
    }

    /// Records reactor effects.
    fn emit_effects(&self, now: Timestamp, run: &RunName, effects: &[ReactorEffect]) {
        for effect in effects {
            let kind = match effect {
                ReactorEffect::StartElected {
                    started_at,
                } => AuditKind::StartElected {
                    run: run.clone(),
                    started_at: *started_at,
                },
                ReactorEffect::CompletionStamped {
                    completed_at,
                } => AuditKind::CompletionStamped {
                    run: run.clone(),
                    completed_at: *completed_at,
                },
                ReactorEffect::SiblingCanceled {
                    location,
                    failed_location,
                } => AuditKind::SiblingCanceled {
                    run: run.clone(),
                    location: location.clone(),
                    failed_location: failed_location.clone(),
                },
            };
            self.emit(now, kind);
        }
    }
}
