// crates/loadgrid-core/src/runtime/store.rs
// ============================================================================
// Module: Loadgrid In-Memory Store
// Description: Mutex-guarded run store for tests and single-process hosts.
// Purpose: Provide a RunStore implementation without external deps.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryRunStore`] keeps locations and run aggregates behind one mutex,
//! so every store call is atomic. It enforces the same revision, uniqueness,
//! and reference rules as the SQLite store. Clones share state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::identifiers::LocationName;
use crate::core::identifiers::RunName;
use crate::core::location::TestLocation;
use crate::core::run::RunRecord;
use crate::core::time::Timestamp;
use crate::interfaces::RunStore;
use crate::interfaces::StoreError;

// ============================================================================
// SECTION: In-Memory Store
// ============================================================================

/// Store contents guarded together.
#[derive(Debug, Default)]
struct StoreState {
    /// Locations keyed by name.
    locations: BTreeMap<LocationName, TestLocation>,
    /// Run aggregates keyed by name, stored at their current revision.
    runs: BTreeMap<RunName, RunRecord>,
}

impl StoreState {
    /// Fails when any job references an unregistered location.
    fn check_references(&self, record: &RunRecord) -> Result<(), StoreError> {
        match record.jobs.iter().find(|job| !self.locations.contains_key(&job.location)) {
            Some(job) => Err(StoreError::Constraint(format!(
                "run {} references unknown location {}",
                record.run.name, job.location
            ))),
            None => Ok(()),
        }
    }
}

/// In-memory run store.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRunStore {
    /// Shared store state.
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryRunStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the store state.
    fn lock(&self) -> Result<MutexGuard<'_, StoreState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Store("run store mutex poisoned".to_string()))
    }
}

impl RunStore for InMemoryRunStore {
    fn insert_location(&self, location: &TestLocation) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if guard.locations.contains_key(&location.name) {
            return Err(StoreError::Duplicate(format!("location {} already exists", location.name)));
        }
        guard.locations.insert(location.name.clone(), location.clone());
        Ok(())
    }

    fn load_location(&self, name: &LocationName) -> Result<Option<TestLocation>, StoreError> {
        Ok(self.lock()?.locations.get(name).cloned())
    }

    fn list_locations(&self) -> Result<Vec<TestLocation>, StoreError> {
        Ok(self.lock()?.locations.values().cloned().collect())
    }

    fn delete_location(&self, name: &LocationName) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        if let Some(run) =
            guard.runs.values().find(|record| record.jobs.iter().any(|job| &job.location == name))
        {
            return Err(StoreError::Constraint(format!(
                "location {name} is used by run {}",
                run.run.name
            )));
        }
        Ok(guard.locations.remove(name).is_some())
    }

    fn record_ping(&self, name: &LocationName, at: Timestamp) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        let Some(location) = guard.locations.get_mut(name) else {
            return Ok(false);
        };
        location.last_ping = Some(at);
        Ok(true)
    }

    fn insert_run(&self, record: &RunRecord) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        if guard.runs.contains_key(&record.run.name) {
            return Err(StoreError::Duplicate(format!("run {} already exists", record.run.name)));
        }
        guard.check_references(record)?;
        let mut stored = record.clone();
        stored.revision = 1;
        guard.runs.insert(stored.run.name.clone(), stored);
        Ok(1)
    }

    fn load_run(&self, name: &RunName) -> Result<Option<RunRecord>, StoreError> {
        Ok(self.lock()?.runs.get(name).cloned())
    }

    fn save_run(&self, record: &RunRecord) -> Result<u64, StoreError> {
        let mut guard = self.lock()?;
        let current = match guard.runs.get(&record.run.name) {
            Some(stored) => stored.revision,
            None => {
                return Err(StoreError::Conflict(format!(
                    "run {} no longer exists",
                    record.run.name
                )));
            }
        };
        if current != record.revision {
            return Err(StoreError::Conflict(format!(
                "run {} is at revision {current}, save expected {}",
                record.run.name, record.revision
            )));
        }
        guard.check_references(record)?;
        let mut stored = record.clone();
        stored.revision = current + 1;
        guard.runs.insert(stored.run.name.clone(), stored);
        Ok(current + 1)
    }

    fn delete_run(&self, name: &RunName) -> Result<bool, StoreError> {
        Ok(self.lock()?.runs.remove(name).is_some())
    }

    fn list_runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        Ok(self.lock()?.runs.values().cloned().collect())
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
    use crate::core::run::RunParams;

    fn seeded() -> (InMemoryRunStore, RunRecord) {
        let store = InMemoryRunStore::new();
        store.insert_location(&TestLocation::new(LocationName::new("fra"), "Frankfurt")).unwrap();
        let record = RunRecord::draft(
            RunName::new("example-com-00001"),
            RunParams::new("https://example.com").with_location("fra", 2),
            Timestamp::from_unix_seconds(0).unwrap(),
        );
        (store, record)
    }

    #[test]
    fn stale_revision_is_rejected() {
        let (store, record) = seeded();
        store.insert_run(&record).unwrap();
        let mut first = store.load_run(&record.run.name).unwrap().unwrap();
        let second = first.clone();
        first.run.draft = false;
        assert_eq!(store.save_run(&first).unwrap(), 2);
        assert!(matches!(store.save_run(&second), Err(StoreError::Conflict(_))));
    }

    #[test]
    fn referenced_location_is_protected() {
        let (store, record) = seeded();
        store.insert_run(&record).unwrap();
        let fra = LocationName::new("fra");
        assert!(matches!(store.delete_location(&fra), Err(StoreError::Constraint(_))));
        assert!(store.delete_run(&record.run.name).unwrap());
        assert!(store.delete_location(&fra).unwrap());
    }

    #[test]
    fn unknown_location_reference_is_rejected() {
        let store = InMemoryRunStore::new();
        let record = RunRecord::draft(
            RunName::new("orphan"),
            RunParams::new("https://example.com").with_location("nowhere", 1),
            Timestamp::from_unix_seconds(0).unwrap(),
        );
        assert!(matches!(store.insert_run(&record), Err(StoreError::Constraint(_))));
    }
}
