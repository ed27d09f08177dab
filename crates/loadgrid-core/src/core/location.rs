// crates/loadgrid-core/src/core/location.rs
// ============================================================================
// Module: Loadgrid Test Locations
// Description: Named execution sites and their liveness.
// Purpose: Provide the reference data location jobs point at.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Test locations are leaf reference data. Each site's operator agent pings
//! periodically; a location counts as online while its last ping is within
//! the configured liveness window.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::LocationName;
use crate::core::time::Timestamp;

/// Named, geographically distinct execution site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestLocation {
    /// Unique slug.
    pub name: LocationName,
    /// Human-readable label.
    pub display_name: String,
    /// Last check-in from the location's agent.
    pub last_ping: Option<Timestamp>,
}

impl TestLocation {
    /// Creates a location that has never pinged.
    #[must_use]
    pub fn new(name: LocationName, display_name: impl Into<String>) -> Self {
        Self {
            name,
            display_name: display_name.into(),
            last_ping: None,
        }
    }

    /// Returns whether the location pinged within `window` of `now`.
    ///
    /// `None` means the location never pinged.
    #[must_use]
    pub fn is_online(&self, now: Timestamp, window: Duration) -> Option<bool> {
        self.last_ping.map(|ping| ping > now || now.elapsed_since(ping) < window)
    }
}
