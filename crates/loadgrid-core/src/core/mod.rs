// crates/loadgrid-core/src/core/mod.rs
// ============================================================================
// Module: Loadgrid Core Types
// Description: Run, location, and job model plus the segment partitioner.
// Purpose: Provide stable, serializable types shared by every adapter.
// Dependencies: serde, thiserror, time, url
// ============================================================================

//! ## Overview
//! Core types define test runs, location jobs and their state machine, test
//! locations, and workload segments. They are pure: nothing here reads the
//! clock, touches storage, or draws randomness.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod job;
pub mod location;
pub mod naming;
pub mod run;
pub mod segments;
pub mod status;
pub mod time;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::JobKey;
pub use identifiers::LocationName;
pub use identifiers::RunName;
pub use identifiers::is_slug;
pub use job::LocationJob;
pub use job::StatusChange;
pub use job::TransitionError;
pub use location::TestLocation;
pub use naming::run_name_for;
pub use naming::slugify;
pub use run::KeyValue;
pub use run::LocationRequest;
pub use run::MAX_WORKERS_PER_LOCATION;
pub use run::ParamError;
pub use run::ResourceHints;
pub use run::RunParams;
pub use run::RunRecord;
pub use run::ScriptSource;
pub use run::TestRun;
pub use segments::Segment;
pub use segments::SegmentBoundary;
pub use segments::assigned_segments;
pub use segments::run_boundaries;
pub use status::LocationStatus;
pub use status::SourceSet;
pub use status::Transition;
pub use status::UnknownLabel;
pub use time::Timestamp;
pub use time::TimestampError;
