// crates/loadgrid-core/src/runtime/views.rs
// ============================================================================
// Module: Loadgrid Views
// Description: Serializable read models for runs, jobs, and locations.
// Purpose: Expose what an operator console or worker transport serializes.
// Dependencies: crate::{core, runtime::aggregator}, serde
// ============================================================================

//! ## Overview
//! Views are built fresh from a run aggregate on every request. A
//! [`RunView`] is the operator's picture of a run; a [`WorkerJobView`] is
//! everything one location's workers need to execute their share.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::core::identifiers::LocationName;
use crate::core::identifiers::RunName;
use crate::core::job::LocationJob;
use crate::core::location::TestLocation;
use crate::core::run::KeyValue;
use crate::core::run::ParamError;
use crate::core::run::ResourceHints;
use crate::core::run::RunRecord;
use crate::core::run::ScriptSource;
use crate::core::segments::Segment;
use crate::core::segments::SegmentBoundary;
use crate::core::segments::assigned_segments;
use crate::core::status::LocationStatus;
use crate::core::time::Timestamp;
use crate::runtime::aggregator::RunStatus;
use crate::runtime::aggregator::RunSummary;
use crate::runtime::aggregator::StatusCounts;
use crate::runtime::aggregator::summarize;

// ============================================================================
// SECTION: Run View
// ============================================================================

/// One job as shown inside a run view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationJobView {
    /// Execution site.
    pub location: LocationName,
    /// Current status.
    pub status: LocationStatus,
    /// Recorded description or canned status text.
    pub status_description: String,
    /// Requested workers.
    pub num_workers: u32,
    /// Observed online workers.
    pub online_workers: u32,
    /// Segments assigned to the job's workers.
    pub segments: Vec<Segment>,
}

/// Operator view of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunView {
    /// Run name.
    pub name: RunName,
    /// URL under test.
    pub target: String,
    /// Script source reference.
    pub source: ScriptSource,
    /// Per-worker resource hints.
    pub resources: ResourceHints,
    /// Run is still a draft.
    pub draft: bool,
    /// Coarse run status.
    pub status: RunStatus,
    /// Every job is ready.
    pub ready: bool,
    /// Every job completed.
    pub completed: bool,
    /// Per-status job counts.
    pub counts: StatusCounts,
    /// Total workers across locations.
    pub total_workers: u64,
    /// Run-wide segment boundaries.
    pub boundaries: Vec<SegmentBoundary>,
    /// Creation instant.
    pub created_at: Timestamp,
    /// Elected start instant.
    pub started_at: Option<Timestamp>,
    /// Completion instant.
    pub completed_at: Option<Timestamp>,
    /// Jobs in insertion order.
    pub locations: Vec<LocationJobView>,
    /// Environment variables.
    pub env_vars: Vec<KeyValue>,
    /// Metric labels.
    pub labels: Vec<KeyValue>,
    /// Store revision the view was read at.
    pub revision: u64,
}

impl RunView {
    /// Builds the view of a run aggregate.
    #[must_use]
    pub fn from_record(record: &RunRecord) -> Self {
        let RunSummary {
            counts,
            ready,
            completed,
            status,
        } = summarize(record);
        let worker_counts = record.worker_counts();
        let locations = record
            .jobs
            .iter()
            .enumerate()
            .map(|(position, job)| LocationJobView {
                location: job.location.clone(),
                status: job.status,
                status_description: job.status_text().to_string(),
                num_workers: job.num_workers,
                online_workers: job.online_workers,
                segments: assigned_segments(&worker_counts, position),
            })
            .collect();
        Self {
            name: record.run.name.clone(),
            target: record.run.target.clone(),
            source: record.run.source.clone(),
            resources: record.run.resources.clone(),
            draft: record.run.draft,
            status,
            ready,
            completed,
            counts,
            total_workers: record.total_workers(),
            boundaries: record.boundaries(),
            created_at: record.run.created_at,
            started_at: record.run.started_at,
            completed_at: record.run.completed_at,
            locations,
            env_vars: record.env_vars.clone(),
            labels: record.labels.clone(),
            revision: record.revision,
        }
    }
}

// ============================================================================
// SECTION: Worker View
// ============================================================================

/// Everything one location's workers need for their share of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerJobView {
    /// Run name.
    pub run: RunName,
    /// Execution site.
    pub location: LocationName,
    /// Current job status.
    pub status: LocationStatus,
    /// Recorded description or canned status text.
    pub status_description: String,
    /// Requested workers.
    pub num_workers: u32,
    /// Observed online workers.
    pub online_workers: u32,
    /// Segments assigned to this location's workers.
    pub segments: Vec<Segment>,
    /// Run-wide segment boundaries.
    pub boundaries: Vec<SegmentBoundary>,
    /// Elected start instant.
    pub started_at: Option<Timestamp>,
    /// Completion instant.
    pub completed_at: Option<Timestamp>,
    /// Every job of the run is ready.
    pub ready: bool,
    /// Every job of the run completed.
    pub completed: bool,
    /// URL under test.
    pub target: String,
    /// Script source reference.
    pub source: ScriptSource,
    /// Per-worker resource hints.
    pub resources: ResourceHints,
    /// Parsed node selector.
    pub node_selector: BTreeMap<String, String>,
    /// Environment variables.
    pub env_vars: Vec<KeyValue>,
    /// Metric labels.
    pub labels: Vec<KeyValue>,
}

impl WorkerJobView {
    /// Builds the worker view of `job` within `record`.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvalidNodeSelector`] when the stored selector
    /// does not parse.
    pub fn from_record(record: &RunRecord, job: &LocationJob) -> Result<Self, ParamError> {
        let summary = summarize(record);
        Ok(Self {
            run: record.run.name.clone(),
            location: job.location.clone(),
            status: job.status,
            status_description: job.status_text().to_string(),
            num_workers: job.num_workers,
            online_workers: job.online_workers,
            segments: record.segments_for(&job.location).unwrap_or_default(),
            boundaries: record.boundaries(),
            started_at: record.run.started_at,
            completed_at: record.run.completed_at,
            ready: summary.ready,
            completed: summary.completed,
            target: record.run.target.clone(),
            source: record.run.source.clone(),
            resources: record.run.resources.clone(),
            node_selector: record.run.resources.node_selector_labels()?,
            env_vars: record.env_vars.clone(),
            labels: record.labels.clone(),
        })
    }
}

// ============================================================================
// SECTION: Location View
// ============================================================================

/// Registered location with its liveness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationView {
    /// Location name.
    pub name: LocationName,
    /// Human-readable label.
    pub display_name: String,
    /// Last check-in.
    pub last_ping: Option<Timestamp>,
    /// Pinged within the liveness window; `None` when never pinged.
    pub online: Option<bool>,
}

impl LocationView {
    /// Builds the view of `location` as of `now`.
    #[must_use]
    pub fn from_location(location: TestLocation, now: Timestamp, window: Duration) -> Self {
        let online = location.is_online(now, window);
        Self {
            name: location.name,
            display_name: location.display_name,
            last_ping: location.last_ping,
            online,
        }
    }
}
