// crates/loadgrid-core/src/core/run.rs
// ============================================================================
// Module: Loadgrid Test Runs
// Description: Test run definition, run aggregate, and creation parameters.
// Purpose: Model a run with its ordered location jobs and attachments.
// Dependencies: crate::core::{identifiers, job, segments, time}, serde, url
// ============================================================================

//! ## Overview
//! A [`RunRecord`] is the unit of persistence and locking: the run row, its
//! location jobs in insertion order, and its key/value attachments. Stores
//! save the whole aggregate atomically and bump `revision` on every save.
//! [`RunParams`] carries caller input for new runs and validates it before
//! anything is persisted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::core::identifiers::LocationName;
use crate::core::identifiers::RunName;
use crate::core::identifiers::is_slug;
use crate::core::job::LocationJob;
use crate::core::segments::Segment;
use crate::core::segments::SegmentBoundary;
use crate::core::segments::assigned_segments;
use crate::core::segments::run_boundaries;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default repository the test script is fetched from.
pub const DEFAULT_SOURCE_REPO: &str = "github.com/ReviewSignal/k6-WordPress-benchmarks";
/// Default git reference of the test script.
pub const DEFAULT_SOURCE_REF: &str = "main";
/// Default script path relative to the repository root.
pub const DEFAULT_SOURCE_SCRIPT: &str = "loadtest.js";
/// Largest worker count a single location may request.
pub const MAX_WORKERS_PER_LOCATION: u32 = 32_767;

// ============================================================================
// SECTION: Run Parameters
// ============================================================================

/// Script source reference, opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptSource {
    /// Git repository to fetch the script from.
    pub repo: String,
    /// Branch, tag, or commit.
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// Script path relative to the repository root.
    pub script: String,
}

impl Default for ScriptSource {
    fn default() -> Self {
        Self {
            repo: DEFAULT_SOURCE_REPO.to_string(),
            git_ref: DEFAULT_SOURCE_REF.to_string(),
            script: DEFAULT_SOURCE_SCRIPT.to_string(),
        }
    }
}

/// Per-worker resource hints forwarded to location agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceHints {
    /// CPU cores per worker.
    pub cpu: String,
    /// Memory per worker.
    pub memory: String,
    /// Whether each worker should run on its own node.
    pub dedicated_nodes: bool,
    /// Whitespace-separated `label=value` node selector.
    #[serde(default)]
    pub node_selector: String,
    /// Go-style duration workers may run for.
    pub job_deadline: String,
}

impl Default for ResourceHints {
    fn default() -> Self {
        Self {
            cpu: "1".to_string(),
            memory: "2G".to_string(),
            dedicated_nodes: true,
            node_selector: String::new(),
            job_deadline: "1h".to_string(),
        }
    }
}

impl ResourceHints {
    /// Parses the node selector into an ordered label map.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError::InvalidNodeSelector`] for pairs without exactly one `=`.
    pub fn node_selector_labels(&self) -> Result<BTreeMap<String, String>, ParamError> {
        let mut labels = BTreeMap::new();
        for pair in self.node_selector.split_whitespace() {
            let mut parts = pair.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(key), Some(value), None) if !key.is_empty() => {
                    labels.insert(key.to_string(), value.to_string());
                }
                _ => return Err(ParamError::InvalidNodeSelector(pair.to_string())),
            }
        }
        Ok(labels)
    }
}

/// Named key/value attachment (environment variable or label).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyValue {
    /// Attachment name.
    pub name: String,
    /// Attachment value.
    pub value: String,
}

impl KeyValue {
    /// Creates a key/value attachment.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Requested share of a run at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationRequest {
    /// Execution site.
    pub location: LocationName,
    /// Workers to run at the site.
    pub num_workers: u32,
}

impl LocationRequest {
    /// Creates a location request.
    #[must_use]
    pub fn new(location: impl Into<LocationName>, num_workers: u32) -> Self {
        Self {
            location: location.into(),
            num_workers,
        }
    }
}

/// Caller input for a new run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunParams {
    /// URL under test.
    pub target: String,
    /// Script source reference.
    #[serde(default)]
    pub source: ScriptSource,
    /// Per-worker resource hints.
    #[serde(default)]
    pub resources: ResourceHints,
    /// Location shares in insertion order.
    #[serde(default)]
    pub locations: Vec<LocationRequest>,
    /// Environment variables passed to the test script.
    #[serde(default)]
    pub env_vars: Vec<KeyValue>,
    /// Labels attached to emitted metrics.
    #[serde(default)]
    pub labels: Vec<KeyValue>,
}

impl RunParams {
    /// Creates parameters with defaults for everything but the target.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            source: ScriptSource::default(),
            resources: ResourceHints::default(),
            locations: Vec::new(),
            env_vars: Vec::new(),
            labels: Vec::new(),
        }
    }

    /// Adds a location share.
    #[must_use]
    pub fn with_location(mut self, location: impl Into<LocationName>, num_workers: u32) -> Self {
        self.locations.push(LocationRequest::new(location, num_workers));
        self
    }

    /// Validates every field that does not require store access.
    ///
    /// # Errors
    ///
    /// Returns [`ParamError`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), ParamError> {
        validate_target(&self.target)?;
        validate_go_duration(&self.resources.job_deadline)?;
        self.resources.node_selector_labels()?;
        validate_location_requests(&self.locations)?;
        for env_var in &self.env_vars {
            if !is_slug(&env_var.name) {
                return Err(ParamError::InvalidAttachment(env_var.name.clone()));
            }
        }
        for label in &self.labels {
            if !is_slug(&label.name) || !is_slug(&label.value) {
                return Err(ParamError::InvalidAttachment(format!(
                    "{}={}",
                    label.name, label.value
                )));
            }
        }
        Ok(())
    }
}

/// Parameter validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// Target is not an absolute http(s) URL.
    #[error("invalid target url: {0}")]
    InvalidTarget(String),
    /// Job deadline is not a Go duration.
    #[error("invalid duration {0}: use Go duration format (for example 90m or 1h30m)")]
    InvalidDeadline(String),
    /// Node selector pair is malformed.
    #[error("invalid node selector pair: {0}")]
    InvalidNodeSelector(String),
    /// Worker count outside `1..=MAX_WORKERS_PER_LOCATION`.
    #[error(
        "location {location} requests {num_workers} workers (allowed 1..={max})",
        max = MAX_WORKERS_PER_LOCATION
    )]
    InvalidWorkers {
        /// Location the request was for.
        location: LocationName,
        /// Requested worker count.
        num_workers: u32,
    },
    /// Location listed more than once for the same run.
    #[error("location {0} appears more than once in the run")]
    DuplicateLocation(LocationName),
    /// Attachment name or value is not a slug.
    #[error("invalid attachment: {0}")]
    InvalidAttachment(String),
    /// Location name is not a slug.
    #[error("invalid location name: {0}")]
    InvalidName(String),
}

/// Validates that the target is an absolute http or https URL.
///
/// # Errors
///
/// Returns [`ParamError::InvalidTarget`] otherwise.
pub fn validate_target(target: &str) -> Result<(), ParamError> {
    let url = Url::parse(target).map_err(|err| ParamError::InvalidTarget(err.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        _ => Err(ParamError::InvalidTarget(target.to_string())),
    }
}

/// Validates worker counts and uniqueness of a list of location shares.
///
/// # Errors
///
/// Returns [`ParamError`] for out-of-range counts or repeated locations.
pub fn validate_location_requests(requests: &[LocationRequest]) -> Result<(), ParamError> {
    let mut seen = BTreeSet::new();
    for request in requests {
        if request.num_workers == 0 || request.num_workers > MAX_WORKERS_PER_LOCATION {
            return Err(ParamError::InvalidWorkers {
                location: request.location.clone(),
                num_workers: request.num_workers,
            });
        }
        if !seen.insert(request.location.clone()) {
            return Err(ParamError::DuplicateLocation(request.location.clone()));
        }
    }
    Ok(())
}

/// Validates a Go `time.ParseDuration` string such as `1h30m` or `1.5s`.
///
/// # Errors
///
/// Returns [`ParamError::InvalidDeadline`] when the value does not parse.
pub fn validate_go_duration(value: &str) -> Result<(), ParamError> {
    let invalid = || ParamError::InvalidDeadline(value.to_string());
    let unsigned = value.strip_prefix(['-', '+']).unwrap_or(value);
    if unsigned == "0" {
        return Ok(());
    }
    if unsigned.is_empty() {
        return Err(invalid());
    }
    let mut rest = unsigned;
    while !rest.is_empty() {
        let number_len =
            rest.find(|ch: char| !(ch.is_ascii_digit() || ch == '.')).unwrap_or(rest.len());
        let number = &rest[..number_len];
        let digits = number.chars().filter(char::is_ascii_digit).count();
        if digits == 0 || number.matches('.').count() > 1 {
            return Err(invalid());
        }
        rest = &rest[number_len..];
        let unit_len = rest.find(|ch: char| ch.is_ascii_digit() || ch == '.').unwrap_or(rest.len());
        match &rest[..unit_len] {
            "ns" | "us" | "\u{b5}s" | "\u{3bc}s" | "ms" | "s" | "m" | "h" => {}
            _ => return Err(invalid()),
        }
        rest = &rest[unit_len..];
    }
    Ok(())
}

// ============================================================================
// SECTION: Test Run
// ============================================================================

/// One logical distributed load test.
///
/// # Invariants
/// - `started_at` and `completed_at` are written at most once.
/// - `draft` only moves from true to false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRun {
    /// Unique run name.
    pub name: RunName,
    /// URL under test.
    pub target: String,
    /// Script source reference.
    pub source: ScriptSource,
    /// Per-worker resource hints.
    pub resources: ResourceHints,
    /// Editable and not yet visible to workers.
    pub draft: bool,
    /// Creation instant.
    pub created_at: Timestamp,
    /// Synchronized start instant elected by the readiness barrier.
    pub started_at: Option<Timestamp>,
    /// Instant the last location completed.
    pub completed_at: Option<Timestamp>,
}

/// Run aggregate: the unit of persistence and optimistic locking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run row.
    pub run: TestRun,
    /// Location jobs in insertion order.
    pub jobs: Vec<LocationJob>,
    /// Environment variables in insertion order.
    pub env_vars: Vec<KeyValue>,
    /// Labels in insertion order.
    pub labels: Vec<KeyValue>,
    /// Store revision the aggregate was loaded at.
    pub revision: u64,
}

impl RunRecord {
    /// Builds a fresh draft aggregate from validated parameters.
    #[must_use]
    pub fn draft(name: RunName, params: RunParams, now: Timestamp) -> Self {
        let jobs = params
            .locations
            .into_iter()
            .map(|request| LocationJob::new(name.clone(), request.location, request.num_workers))
            .collect();
        Self {
            run: TestRun {
                name,
                target: params.target,
                source: params.source,
                resources: params.resources,
                draft: true,
                created_at: now,
                started_at: None,
                completed_at: None,
            },
            jobs,
            env_vars: params.env_vars,
            labels: params.labels,
            revision: 0,
        }
    }

    /// Returns the position of the job at `location`.
    #[must_use]
    pub fn position(&self, location: &LocationName) -> Option<usize> {
        self.jobs.iter().position(|job| &job.location == location)
    }

    /// Returns the job at `location`.
    #[must_use]
    pub fn job(&self, location: &LocationName) -> Option<&LocationJob> {
        self.jobs.iter().find(|job| &job.location == location)
    }

    /// Returns the job at `location` mutably.
    pub fn job_mut(&mut self, location: &LocationName) -> Option<&mut LocationJob> {
        self.jobs.iter_mut().find(|job| &job.location == location)
    }

    /// Returns worker counts in insertion order.
    #[must_use]
    pub fn worker_counts(&self) -> Vec<u32> {
        self.jobs.iter().map(|job| job.num_workers).collect()
    }

    /// Returns the total worker count across locations.
    #[must_use]
    pub fn total_workers(&self) -> u64 {
        self.jobs.iter().map(|job| u64::from(job.num_workers)).sum()
    }

    /// Returns the run-wide segment boundaries.
    #[must_use]
    pub fn boundaries(&self) -> Vec<SegmentBoundary> {
        run_boundaries(self.total_workers())
    }

    /// Returns the segments assigned to the job at `location`.
    #[must_use]
    pub fn segments_for(&self, location: &LocationName) -> Option<Vec<Segment>> {
        self.position(location).map(|position| assigned_segments(&self.worker_counts(), position))
    }

    /// Returns a fresh draft copy under a new name.
    ///
    /// Jobs are reset to pending with empty descriptions; attachments are
    /// copied in order.
    #[must_use]
    pub fn duplicate_as(&self, name: RunName, now: Timestamp) -> Self {
        Self {
            run: TestRun {
                name: name.clone(),
                target: self.run.target.clone(),
                source: self.run.source.clone(),
                resources: self.run.resources.clone(),
                draft: true,
                created_at: now,
                started_at: None,
                completed_at: None,
            },
            jobs: self.jobs.iter().map(|job| job.reset_for(name.clone())).collect(),
            env_vars: self.env_vars.clone(),
            labels: self.labels.clone(),
            revision: 0,
        }
    }
}
