// crates/loadgrid-core/src/core/time.rs
// ============================================================================
// Module: Loadgrid Time Model
// Description: Canonical timestamp representation for runs and locations.
// Purpose: Provide explicit, serializable UTC instants with second truncation.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Loadgrid records wall-clock instants (run creation, synchronized start,
//! completion, location pings) as UTC timestamps serialized in RFC 3339. The
//! core never reads wall-clock time directly; hosts supply instants through
//! the [`crate::interfaces::Clock`] interface.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::UtcOffset;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Timestamp construction or parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimestampError {
    /// Value falls outside the representable range.
    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
    /// Value is not a valid RFC 3339 timestamp.
    #[error("invalid rfc3339 timestamp: {0}")]
    Parse(String),
}

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// UTC instant used for run and location bookkeeping.
///
/// # Invariants
/// - Always normalized to the UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

impl Timestamp {
    /// Wraps an existing date-time, normalizing it to UTC.
    #[must_use]
    pub fn from_datetime(value: OffsetDateTime) -> Self {
        Self(value.to_offset(UtcOffset::UTC))
    }

    /// Builds a timestamp from unix seconds.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::OutOfRange`] when the value is not representable.
    pub fn from_unix_seconds(seconds: i64) -> Result<Self, TimestampError> {
        OffsetDateTime::from_unix_timestamp(seconds)
            .map(Self)
            .map_err(|err| TimestampError::OutOfRange(err.to_string()))
    }

    /// Parses an RFC 3339 timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TimestampError::Parse`] when the input is malformed.
    pub fn parse_rfc3339(value: &str) -> Result<Self, TimestampError> {
        OffsetDateTime::parse(value, &Rfc3339)
            .map(Self::from_datetime)
            .map_err(|err| TimestampError::Parse(err.to_string()))
    }

    /// Formats the timestamp as RFC 3339.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.format(&Rfc3339).unwrap_or_else(|_| self.0.unix_timestamp().to_string())
    }

    /// Returns the unix timestamp in whole seconds.
    #[must_use]
    pub const fn unix_seconds(&self) -> i64 {
        self.0.unix_timestamp()
    }

    /// Returns the timestamp with sub-second precision dropped.
    #[must_use]
    pub fn truncated_to_seconds(&self) -> Self {
        Self(self.0.replace_nanosecond(0).unwrap_or(self.0))
    }

    /// Adds a duration, saturating at the representable maximum.
    #[must_use]
    pub fn saturating_add(&self, delta: Duration) -> Self {
        let delta = time::Duration::try_from(delta).unwrap_or(time::Duration::MAX);
        Self(self.0.checked_add(delta).unwrap_or(self.0))
    }

    /// Returns the elapsed time since `earlier`, or zero when `earlier` is later.
    #[must_use]
    pub fn elapsed_since(&self, earlier: Self) -> Duration {
        Duration::try_from(self.0 - earlier.0).unwrap_or(Duration::ZERO)
    }

    /// Returns the underlying date-time.
    #[must_use]
    pub const fn as_datetime(&self) -> OffsetDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
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

    #[test]
    fn truncation_drops_subsecond_precision() {
        let base = Timestamp::from_unix_seconds(1_700_000_000).unwrap();
        let later = base.saturating_add(Duration::from_millis(20_750));
        assert_eq!(later.truncated_to_seconds().unix_seconds(), 1_700_000_020);
        assert_eq!(later.truncated_to_seconds().as_datetime().nanosecond(), 0);
    }

    #[test]
    fn rfc3339_roundtrip_preserves_instant() {
        let parsed = Timestamp::parse_rfc3339("2026-10-19T12:00:05+02:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-10-19T10:00:05Z");
    }

    #[test]
    fn elapsed_since_clamps_negative_spans() {
        let early = Timestamp::from_unix_seconds(100).unwrap();
        let late = Timestamp::from_unix_seconds(160).unwrap();
        assert_eq!(late.elapsed_since(early), Duration::from_secs(60));
        assert_eq!(early.elapsed_since(late), Duration::ZERO);
    }
}
