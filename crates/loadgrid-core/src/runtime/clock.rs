// crates/loadgrid-core/src/runtime/clock.rs
// ============================================================================
// Module: Loadgrid Clocks
// Description: Wall-clock and controllable clock implementations.
// Purpose: Provide time to the orchestrator through the Clock interface.
// Dependencies: crate::{core, interfaces}, time
// ============================================================================

//! ## Overview
//! [`SystemClock`] reads UTC wall-clock time. [`FixedClock`] holds a settable
//! instant shared across clones, for tests and deterministic replays.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use time::OffsetDateTime;

use crate::core::time::Timestamp;
use crate::interfaces::Clock;

// ============================================================================
// SECTION: Clocks
// ============================================================================

/// UTC wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_datetime(OffsetDateTime::now_utc())
    }
}

/// Manually driven clock; clones observe the same instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    /// Current instant.
    now: Arc<Mutex<Timestamp>>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: Timestamp) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = guard.saturating_add(delta);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.now.lock().map_or_else(|poisoned| *poisoned.into_inner(), |guard| *guard)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only panic-based assertions are permitted.")]

    use super::*;

    #[test]
    fn fixed_clock_is_shared_between_clones() {
        let clock = FixedClock::new(Timestamp::from_unix_seconds(10).unwrap());
        let observer = clock.clone();
        clock.advance(Duration::from_secs(5));
        assert_eq!(observer.now().unix_seconds(), 15);
        clock.set(Timestamp::from_unix_seconds(100).unwrap());
        assert_eq!(observer.now().unix_seconds(), 100);
    }
}
