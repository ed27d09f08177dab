// crates/loadgrid-core/src/core/status.rs
// ============================================================================
// Module: Loadgrid Location Status Model
// Description: Location job statuses and the explicit transition table.
// Purpose: Define which transitions are permitted from which states.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A location job moves along `pending -> queued -> ready -> running ->
//! completed`. `failed` and `canceled` are terminal side entries reachable
//! from any non-terminal state, and `failed -> pending` is the explicit retry
//! path. The table lives in [`Transition::sources`] and
//! [`Transition::target`]; guards are enforced by
//! [`crate::core::job::LocationJob::apply`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Location Status
// ============================================================================

/// Lifecycle status of a location job.
///
/// # Invariants
/// - Variants and their labels are stable for persistence and wire output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStatus {
    /// Waiting for the location to accept the job.
    Pending,
    /// Accepted; workers are being scheduled.
    Queued,
    /// All workers at the location are online and waiting for the start time.
    Ready,
    /// Load generation in progress.
    Running,
    /// Load generation finished successfully.
    Completed,
    /// Location reported a failure.
    Failed,
    /// Job was canceled by an operator or by the failure cascade.
    Canceled,
}

impl LocationStatus {
    /// All statuses in lifecycle order.
    pub const ALL: [Self; 7] = [
        Self::Pending,
        Self::Queued,
        Self::Ready,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Canceled,
    ];

    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    /// Returns true for statuses with no outgoing happy-path transition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    /// Returns the canned description shown when no message was recorded.
    #[must_use]
    pub const fn default_description(self) -> &'static str {
        match self {
            Self::Pending => "Waiting for job to be accepted.",
            Self::Queued => "Queued for execution. Waiting for workers to come online.",
            Self::Ready => "Workers are ready to start the test.",
            Self::Running => "Test is running.",
            Self::Completed => "Test has completed successfully.",
            Self::Canceled => "Job was canceled.",
            Self::Failed => "",
        }
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationStatus {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownLabel::new("status", value))
    }
}

// ============================================================================
// SECTION: Transitions
// ============================================================================

/// Set of statuses a transition may start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSet {
    /// Exactly one source status.
    Only(LocationStatus),
    /// Any status that is not terminal.
    AnyNonTerminal,
}

impl SourceSet {
    /// Returns true when `status` belongs to the set.
    #[must_use]
    pub const fn contains(self, status: LocationStatus) -> bool {
        match self {
            Self::Only(source) => source as u8 == status as u8,
            Self::AnyNonTerminal => !status.is_terminal(),
        }
    }
}

/// Named transition of the location job state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// `pending -> queued`.
    Accept,
    /// `queued -> ready`.
    Ready,
    /// `ready -> running`.
    Start,
    /// `running -> completed`.
    Finish,
    /// `non-terminal -> failed`.
    Fail,
    /// `non-terminal -> canceled`.
    Cancel,
    /// `failed -> pending`.
    Retry,
}

impl Transition {
    /// All transitions in table order.
    pub const ALL: [Self; 7] = [
        Self::Accept,
        Self::Ready,
        Self::Start,
        Self::Finish,
        Self::Fail,
        Self::Cancel,
        Self::Retry,
    ];

    /// Returns the stable verb for the transition.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Ready => "ready",
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Fail => "fail",
            Self::Cancel => "cancel",
            Self::Retry => "retry",
        }
    }

    /// Returns the statuses this transition may start from.
    #[must_use]
    pub const fn sources(self) -> SourceSet {
        match self {
            Self::Accept => SourceSet::Only(LocationStatus::Pending),
            Self::Ready => SourceSet::Only(LocationStatus::Queued),
            Self::Start => SourceSet::Only(LocationStatus::Ready),
            Self::Finish => SourceSet::Only(LocationStatus::Running),
            Self::Fail | Self::Cancel => SourceSet::AnyNonTerminal,
            Self::Retry => SourceSet::Only(LocationStatus::Failed),
        }
    }

    /// Returns the status the transition leads to.
    #[must_use]
    pub const fn target(self) -> LocationStatus {
        match self {
            Self::Accept => LocationStatus::Queued,
            Self::Ready => LocationStatus::Ready,
            Self::Start => LocationStatus::Running,
            Self::Finish => LocationStatus::Completed,
            Self::Fail => LocationStatus::Failed,
            Self::Cancel => LocationStatus::Canceled,
            Self::Retry => LocationStatus::Pending,
        }
    }

    /// Returns true when the transition records a caller-supplied message.
    #[must_use]
    pub const fn records_message(self) -> bool {
        matches!(self, Self::Fail | Self::Cancel | Self::Retry)
    }

    /// Returns true when the transition may fire from `status`.
    #[must_use]
    pub const fn permits(self, status: LocationStatus) -> bool {
        self.sources().contains(status)
    }

    /// Returns the unique transition leading to `status`.
    #[must_use]
    pub fn targeting(status: LocationStatus) -> Self {
        match status {
            LocationStatus::Pending => Self::Retry,
            LocationStatus::Queued => Self::Accept,
            LocationStatus::Ready => Self::Ready,
            LocationStatus::Running => Self::Start,
            LocationStatus::Completed => Self::Finish,
            LocationStatus::Failed => Self::Fail,
            LocationStatus::Canceled => Self::Cancel,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = UnknownLabel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|transition| transition.as_str() == value)
            .ok_or_else(|| UnknownLabel::new("transition", value))
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Error returned when parsing an unknown status or transition label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownLabel {
    /// Label family that failed to parse.
    pub kind: &'static str,
    /// Offending input.
    pub value: String,
}

impl UnknownLabel {
    /// Creates a new parse error.
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
