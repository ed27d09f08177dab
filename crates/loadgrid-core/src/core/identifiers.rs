// crates/loadgrid-core/src/core/identifiers.rs
// ============================================================================
// Module: Loadgrid Identifiers
// Description: Canonical opaque identifiers for runs, locations, and jobs.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the string-based identifiers used throughout Loadgrid.
//! Identifiers are opaque and serialize as strings. Slug validation is handled
//! at the orchestrator boundary rather than within these simple wrappers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Unique, immutable name of a test run.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunName(String);

impl RunName {
    /// Creates a new run name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RunName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Name of a geographically distinct execution site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationName(String);

impl LocationName {
    /// Creates a new location name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for LocationName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for LocationName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Identity of a location job: one run's share at one location.
///
/// # Invariants
/// - At most one job exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobKey {
    /// Owning run.
    pub run: RunName,
    /// Execution site.
    pub location: LocationName,
}

impl JobKey {
    /// Creates a job key from its parts.
    #[must_use]
    pub const fn new(run: RunName, location: LocationName) -> Self {
        Self {
            run,
            location,
        }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.run, self.location)
    }
}

// ============================================================================
// SECTION: Slug Validation
// ============================================================================

/// Returns true when the value is a non-empty slug (`[A-Za-z0-9_-]+`).
#[must_use]
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_accepts_dashes_and_underscores() {
        assert!(is_slug("eu-west_1"));
        assert!(!is_slug(""));
        assert!(!is_slug("eu west"));
        assert!(!is_slug("eu.west"));
    }

    #[test]
    fn job_key_display_joins_run_and_location() {
        let key = JobKey::new(RunName::new("example-com-abcde"), LocationName::new("fra"));
        assert_eq!(key.to_string(), "example-com-abcde - fra");
    }
}
