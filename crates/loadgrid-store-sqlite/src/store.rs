// crates/loadgrid-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Run Store
// Description: Durable RunStore backed by SQLite with WAL support.
// Purpose: Persist locations and run aggregates with revision checks.
// Dependencies: loadgrid-core, rusqlite, serde
// ============================================================================

//! ## Overview
//! This module implements [`RunStore`] on top of SQLite. Runs are stored in
//! normalized tables: one row per run, one row per location job, and one row
//! per environment variable or label, each child ordered by an explicit
//! position column.
//!
//! Writes open an immediate transaction so that two processes sharing the
//! database file serialize on the write lock. A save compares the stored
//! revision with the one the caller loaded and fails with
//! [`SqliteStoreError::Conflict`] when another writer got there first.
//!
//! # Invariants
//! - Deleting a run cascades to its jobs and attachments.
//! - A location referenced by any job cannot be deleted.
//! - Each `(run, location)` pair appears at most once.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use loadgrid_core::KeyValue;
use loadgrid_core::LocationJob;
use loadgrid_core::LocationName;
use loadgrid_core::LocationStatus;
use loadgrid_core::ResourceHints;
use loadgrid_core::RunName;
use loadgrid_core::RunRecord;
use loadgrid_core::RunStore;
use loadgrid_core::ScriptSource;
use loadgrid_core::StoreError;
use loadgrid_core::TestLocation;
use loadgrid_core::TestRun;
use loadgrid_core::Timestamp;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::Transaction;
use rusqlite::TransactionBehavior;
use rusqlite::ffi;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Schema version stored in `store_meta`.
const SCHEMA_VERSION: i64 = 1;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Table definitions created on first open.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS test_locations (
    name TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    last_ping TEXT
);
CREATE TABLE IF NOT EXISTS test_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    target TEXT NOT NULL,
    source_repo TEXT NOT NULL,
    source_ref TEXT NOT NULL,
    source_script TEXT NOT NULL,
    cpu TEXT NOT NULL,
    memory TEXT NOT NULL,
    dedicated_nodes INTEGER NOT NULL,
    node_selector TEXT NOT NULL,
    job_deadline TEXT NOT NULL,
    draft INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    started_at TEXT,
    completed_at TEXT,
    revision INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS test_run_locations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_run TEXT NOT NULL REFERENCES test_runs(name) ON DELETE CASCADE,
    location TEXT NOT NULL REFERENCES test_locations(name) ON DELETE RESTRICT,
    position INTEGER NOT NULL,
    num_workers INTEGER NOT NULL CHECK (num_workers > 0),
    online_workers INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    status_description TEXT NOT NULL DEFAULT '',
    UNIQUE (test_run, location)
);
CREATE INDEX IF NOT EXISTS idx_test_run_locations_location
    ON test_run_locations (location);
CREATE TABLE IF NOT EXISTS test_run_env_vars (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_run TEXT NOT NULL REFERENCES test_runs(name) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    value TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS test_run_labels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    test_run TEXT NOT NULL REFERENCES test_runs(name) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    name TEXT NOT NULL,
    value TEXT NOT NULL
);
";

// ============================================================================
// SECTION: Config
// ============================================================================

/// SQLite journal mode used by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// Write-ahead logging; readers do not block the writer.
    #[default]
    Wal,
    /// Rollback journal deleted after each transaction.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the pragma value for the mode.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// SQLite synchronous level used by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Sync on every commit.
    #[default]
    Full,
    /// Sync at checkpoints only.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the pragma value for the level.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "FULL",
            Self::Normal => "NORMAL",
        }
    }
}

/// Configuration of the SQLite run store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SqliteStoreConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Milliseconds to wait on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// Synchronous level.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Serde default for the busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the SQLite store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SqliteStoreError {
    /// Filesystem failure.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// SQLite failure.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data failed to decode.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Database was written by another schema version.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Configuration or input rejected.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Revision check failed.
    #[error("sqlite store conflict: {0}")]
    Conflict(String),
    /// Uniqueness violated.
    #[error("sqlite store duplicate: {0}")]
    Duplicate(String),
    /// Reference or check constraint violated.
    #[error("sqlite store constraint violation: {0}")]
    Constraint(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::Conflict(message) => Self::Conflict(message),
            SqliteStoreError::Duplicate(message) => Self::Duplicate(message),
            SqliteStoreError::Constraint(message) => Self::Constraint(message),
        }
    }
}

/// Classifies a rusqlite error, separating constraint failures.
fn db_error(error: &rusqlite::Error) -> SqliteStoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = error
        && failure.code == ErrorCode::ConstraintViolation
    {
        return match failure.extended_code {
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                SqliteStoreError::Duplicate(error.to_string())
            }
            _ => SqliteStoreError::Constraint(error.to_string()),
        };
    }
    SqliteStoreError::Db(error.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// SQLite-backed run store.
///
/// Clones share one connection. Separate instances opened on the same file
/// hold separate connections and coordinate through SQLite locking.
#[derive(Clone)]
pub struct SqliteRunStore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Connection guarded for use across threads.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRunStore {
    /// Opens or creates the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or the schema version does not match.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns the store configuration.
    #[must_use]
    pub const fn config(&self) -> &SqliteStoreConfig {
        &self.config
    }

    /// Locks the connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Runs `body` inside an immediate transaction and commits on success.
    fn write<T>(
        &self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|err| db_error(&err))?;
        let value = body(&tx)?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(value)
    }

    /// Runs `body` inside a deferred read transaction.
    fn read<T>(
        &self,
        body: impl FnOnce(&Transaction<'_>) -> Result<T, SqliteStoreError>,
    ) -> Result<T, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        let value = body(&tx)?;
        tx.commit().map_err(|err| db_error(&err))?;
        Ok(value)
    }

    /// Inserts a location.
    fn insert_location_state(&self, location: &TestLocation) -> Result<(), SqliteStoreError> {
        self.write(|tx| {
            tx.execute(
                "INSERT INTO test_locations (name, display_name, last_ping) VALUES (?1, ?2, ?3)",
                params![
                    location.name.as_str(),
                    location.display_name,
                    location.last_ping.map(|at| at.to_rfc3339())
                ],
            )
            .map_err(|err| db_error(&err))?;
            Ok(())
        })
    }

    /// Loads one location.
    fn load_location_state(
        &self,
        name: &LocationName,
    ) -> Result<Option<TestLocation>, SqliteStoreError> {
        self.read(|tx| {
            let row = tx
                .query_row(
                    "SELECT name, display_name, last_ping FROM test_locations WHERE name = ?1",
                    params![name.as_str()],
                    location_columns,
                )
                .optional()
                .map_err(|err| db_error(&err))?;
            row.map(decode_location).transpose()
        })
    }

    /// Lists locations ordered by name.
    fn list_locations_state(&self) -> Result<Vec<TestLocation>, SqliteStoreError> {
        self.read(|tx| {
            let mut stmt = tx
                .prepare("SELECT name, display_name, last_ping FROM test_locations ORDER BY name")
                .map_err(|err| db_error(&err))?;
            let rows = stmt
                .query_map([], location_columns)
                .map_err(|err| db_error(&err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| db_error(&err))?;
            rows.into_iter().map(decode_location).collect()
        })
    }

    /// Deletes a location; referenced locations fail the foreign key.
    fn delete_location_state(&self, name: &LocationName) -> Result<bool, SqliteStoreError> {
        self.write(|tx| {
            let removed = tx
                .execute("DELETE FROM test_locations WHERE name = ?1", params![name.as_str()])
                .map_err(|err| match db_error(&err) {
                    SqliteStoreError::Constraint(_) => {
                        SqliteStoreError::Constraint(format!("location {name} is used by a run"))
                    }
                    other => other,
                })?;
            Ok(removed > 0)
        })
    }

    /// Stamps a location's last ping.
    fn record_ping_state(
        &self,
        name: &LocationName,
        at: Timestamp,
    ) -> Result<bool, SqliteStoreError> {
        self.write(|tx| {
            let updated = tx
                .execute(
                    "UPDATE test_locations SET last_ping = ?2 WHERE name = ?1",
                    params![name.as_str(), at.to_rfc3339()],
                )
                .map_err(|err| db_error(&err))?;
            Ok(updated > 0)
        })
    }

    /// Inserts a new run at revision 1.
    fn insert_run_state(&self, record: &RunRecord) -> Result<u64, SqliteStoreError> {
        self.write(|tx| {
            let run = &record.run;
            tx.execute(
                "INSERT INTO test_runs (name, target, source_repo, source_ref, source_script, \
                 cpu, memory, dedicated_nodes, node_selector, job_deadline, draft, created_at, \
                 started_at, completed_at, revision) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 1)",
                params![
                    run.name.as_str(),
                    run.target,
                    run.source.repo,
                    run.source.git_ref,
                    run.source.script,
                    run.resources.cpu,
                    run.resources.memory,
                    run.resources.dedicated_nodes,
                    run.resources.node_selector,
                    run.resources.job_deadline,
                    run.draft,
                    run.created_at.to_rfc3339(),
                    run.started_at.map(|at| at.to_rfc3339()),
                    run.completed_at.map(|at| at.to_rfc3339()),
                ],
            )
            .map_err(|err| db_error(&err))?;
            write_children(tx, record)?;
            Ok(1)
        })
    }

    /// Loads one run aggregate.
    fn load_run_state(&self, name: &RunName) -> Result<Option<RunRecord>, SqliteStoreError> {
        self.read(|tx| load_record(tx, name))
    }

    /// Saves a run aggregate if its revision is current.
    fn save_run_state(&self, record: &RunRecord) -> Result<u64, SqliteStoreError> {
        self.write(|tx| {
            let run = &record.run;
            let stored: Option<i64> = tx
                .query_row(
                    "SELECT revision FROM test_runs WHERE name = ?1",
                    params![run.name.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|err| db_error(&err))?;
            let Some(stored) = stored else {
                return Err(SqliteStoreError::Conflict(format!(
                    "run {} no longer exists",
                    run.name
                )));
            };
            let current = to_revision(stored)?;
            if current != record.revision {
                return Err(SqliteStoreError::Conflict(format!(
                    "run {} is at revision {current}, save expected {}",
                    run.name, record.revision
                )));
            }
            let next = current + 1;
            tx.execute(
                "UPDATE test_runs SET target = ?2, source_repo = ?3, source_ref = ?4, \
                 source_script = ?5, cpu = ?6, memory = ?7, dedicated_nodes = ?8, \
                 node_selector = ?9, job_deadline = ?10, draft = ?11, started_at = ?12, \
                 completed_at = ?13, revision = ?14 WHERE name = ?1",
                params![
                    run.name.as_str(),
                    run.target,
                    run.source.repo,
                    run.source.git_ref,
                    run.source.script,
                    run.resources.cpu,
                    run.resources.memory,
                    run.resources.dedicated_nodes,
                    run.resources.node_selector,
                    run.resources.job_deadline,
                    run.draft,
                    run.started_at.map(|at| at.to_rfc3339()),
                    run.completed_at.map(|at| at.to_rfc3339()),
                    from_revision(next)?,
                ],
            )
            .map_err(|err| db_error(&err))?;
            for table in ["test_run_locations", "test_run_env_vars", "test_run_labels"] {
                tx.execute(&format!("DELETE FROM {table} WHERE test_run = ?1"), params![
                    run.name.as_str()
                ])
                .map_err(|err| db_error(&err))?;
            }
            write_children(tx, record)?;
            Ok(next)
        })
    }

    /// Deletes a run; children cascade.
    fn delete_run_state(&self, name: &RunName) -> Result<bool, SqliteStoreError> {
        self.write(|tx| {
            let removed = tx
                .execute("DELETE FROM test_runs WHERE name = ?1", params![name.as_str()])
                .map_err(|err| db_error(&err))?;
            Ok(removed > 0)
        })
    }

    /// Lists every run aggregate in insertion order.
    fn list_runs_state(&self) -> Result<Vec<RunRecord>, SqliteStoreError> {
        self.read(|tx| {
            let mut stmt =
                tx.prepare("SELECT name FROM test_runs ORDER BY id").map_err(|err| db_error(&err))?;
            let names = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(|err| db_error(&err))?
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| db_error(&err))?;
            let mut records = Vec::with_capacity(names.len());
            for name in names {
                if let Some(record) = load_record(tx, &RunName::new(name))? {
                    records.push(record);
                }
            }
            Ok(records)
        })
    }
}

impl RunStore for SqliteRunStore {
    fn insert_location(&self, location: &TestLocation) -> Result<(), StoreError> {
        self.insert_location_state(location).map_err(StoreError::from)
    }

    fn load_location(&self, name: &LocationName) -> Result<Option<TestLocation>, StoreError> {
        self.load_location_state(name).map_err(StoreError::from)
    }

    fn list_locations(&self) -> Result<Vec<TestLocation>, StoreError> {
        self.list_locations_state().map_err(StoreError::from)
    }

    fn delete_location(&self, name: &LocationName) -> Result<bool, StoreError> {
        self.delete_location_state(name).map_err(StoreError::from)
    }

    fn record_ping(&self, name: &LocationName, at: Timestamp) -> Result<bool, StoreError> {
        self.record_ping_state(name, at).map_err(StoreError::from)
    }

    fn insert_run(&self, record: &RunRecord) -> Result<u64, StoreError> {
        self.insert_run_state(record).map_err(StoreError::from)
    }

    fn load_run(&self, name: &RunName) -> Result<Option<RunRecord>, StoreError> {
        self.load_run_state(name).map_err(StoreError::from)
    }

    fn save_run(&self, record: &RunRecord) -> Result<u64, StoreError> {
        self.save_run_state(record).map_err(StoreError::from)
    }

    fn delete_run(&self, name: &RunName) -> Result<bool, StoreError> {
        self.delete_run_state(name).map_err(StoreError::from)
    }

    fn list_runs(&self) -> Result<Vec<RunRecord>, StoreError> {
        self.list_runs_state().map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw location columns.
type LocationRow = (String, String, Option<String>);

/// Raw run columns, in `RUN_COLUMNS` order.
struct RunRow {
    /// Run name.
    name: String,
    /// Target URL.
    target: String,
    /// Script source.
    source: ScriptSource,
    /// Resource hints.
    resources: ResourceHints,
    /// Draft flag.
    draft: bool,
    /// Creation instant text.
    created_at: String,
    /// Start instant text.
    started_at: Option<String>,
    /// Completion instant text.
    completed_at: Option<String>,
    /// Stored revision.
    revision: i64,
}

/// Raw job columns.
type JobRow = (String, i64, i64, String, String);

/// Column list matching [`run_columns`].
const RUN_COLUMNS: &str = "name, target, source_repo, source_ref, source_script, cpu, memory, \
                           dedicated_nodes, node_selector, job_deadline, draft, created_at, \
                           started_at, completed_at, revision";

/// Reads location columns from a row.
fn location_columns(row: &Row<'_>) -> rusqlite::Result<LocationRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

/// Reads run columns from a row.
fn run_columns(row: &Row<'_>) -> rusqlite::Result<RunRow> {
    Ok(RunRow {
        name: row.get(0)?,
        target: row.get(1)?,
        source: ScriptSource {
            repo: row.get(2)?,
            git_ref: row.get(3)?,
            script: row.get(4)?,
        },
        resources: ResourceHints {
            cpu: row.get(5)?,
            memory: row.get(6)?,
            dedicated_nodes: row.get(7)?,
            node_selector: row.get(8)?,
            job_deadline: row.get(9)?,
        },
        draft: row.get(10)?,
        created_at: row.get(11)?,
        started_at: row.get(12)?,
        completed_at: row.get(13)?,
        revision: row.get(14)?,
    })
}

/// Decodes a location row.
fn decode_location(row: LocationRow) -> Result<TestLocation, SqliteStoreError> {
    let (name, display_name, last_ping) = row;
    Ok(TestLocation {
        name: LocationName::new(name),
        display_name,
        last_ping: decode_optional_timestamp(last_ping)?,
    })
}

/// Loads a run and its children inside `tx`.
fn load_record(
    tx: &Transaction<'_>,
    name: &RunName,
) -> Result<Option<RunRecord>, SqliteStoreError> {
    let row = tx
        .query_row(
            &format!("SELECT {RUN_COLUMNS} FROM test_runs WHERE name = ?1"),
            params![name.as_str()],
            run_columns,
        )
        .optional()
        .map_err(|err| db_error(&err))?;
    let Some(row) = row else {
        return Ok(None);
    };
    let run_name = RunName::new(row.name);
    let run = TestRun {
        name: run_name.clone(),
        target: row.target,
        source: row.source,
        resources: row.resources,
        draft: row.draft,
        created_at: decode_timestamp(&row.created_at)?,
        started_at: decode_optional_timestamp(row.started_at)?,
        completed_at: decode_optional_timestamp(row.completed_at)?,
    };
    let jobs = load_jobs(tx, &run_name)?;
    let env_vars = load_pairs(tx, "test_run_env_vars", &run_name)?;
    let labels = load_pairs(tx, "test_run_labels", &run_name)?;
    Ok(Some(RunRecord {
        run,
        jobs,
        env_vars,
        labels,
        revision: to_revision(row.revision)?,
    }))
}

/// Loads the jobs of a run in position order.
fn load_jobs(tx: &Transaction<'_>, run: &RunName) -> Result<Vec<LocationJob>, SqliteStoreError> {
    let mut stmt = tx
        .prepare(
            "SELECT location, num_workers, online_workers, status, status_description \
             FROM test_run_locations WHERE test_run = ?1 ORDER BY position",
        )
        .map_err(|err| db_error(&err))?;
    let rows: Vec<JobRow> = stmt
        .query_map(params![run.as_str()], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .map_err(|err| db_error(&err))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| db_error(&err))?;
    rows.into_iter()
        .map(|(location, num_workers, online_workers, status, status_description)| {
            let status = status.parse::<LocationStatus>().map_err(|err| {
                SqliteStoreError::Corrupt(format!("run {run} location {location}: {err}"))
            })?;
            Ok(LocationJob {
                run: run.clone(),
                location: LocationName::new(location),
                num_workers: to_count(num_workers)?,
                online_workers: to_count(online_workers)?,
                status,
                status_description,
            })
        })
        .collect()
}

/// Loads name/value attachments from `table` in position order.
fn load_pairs(
    tx: &Transaction<'_>,
    table: &str,
    run: &RunName,
) -> Result<Vec<KeyValue>, SqliteStoreError> {
    let mut stmt = tx
        .prepare(&format!("SELECT name, value FROM {table} WHERE test_run = ?1 ORDER BY position"))
        .map_err(|err| db_error(&err))?;
    stmt.query_map(params![run.as_str()], |row| {
        Ok(KeyValue {
            name: row.get(0)?,
            value: row.get(1)?,
        })
    })
    .map_err(|err| db_error(&err))?
    .collect::<Result<Vec<_>, _>>()
    .map_err(|err| db_error(&err))
}

/// Writes jobs and attachments of `record`.
fn write_children(tx: &Transaction<'_>, record: &RunRecord) -> Result<(), SqliteStoreError> {
    let run = record.run.name.as_str();
    for (position, job) in record.jobs.iter().enumerate() {
        tx.execute(
            "INSERT INTO test_run_locations (test_run, location, position, num_workers, \
             online_workers, status, status_description) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run,
                job.location.as_str(),
                to_position(position)?,
                job.num_workers,
                job.online_workers,
                job.status.as_str(),
                job.status_description,
            ],
        )
        .map_err(|err| match db_error(&err) {
            SqliteStoreError::Constraint(_) => SqliteStoreError::Constraint(format!(
                "run {run} references unknown location {}",
                job.location
            )),
            other => other,
        })?;
    }
    let attachments =
        [("test_run_env_vars", &record.env_vars), ("test_run_labels", &record.labels)];
    for (table, pairs) in attachments {
        for (position, pair) in pairs.iter().enumerate() {
            tx.execute(
                &format!(
                    "INSERT INTO {table} (test_run, position, name, value) VALUES (?1, ?2, ?3, ?4)"
                ),
                params![run, to_position(position)?, pair.name, pair.value],
            )
            .map_err(|err| db_error(&err))?;
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Conversions
// ============================================================================

/// Parses a stored timestamp.
fn decode_timestamp(value: &str) -> Result<Timestamp, SqliteStoreError> {
    Timestamp::parse_rfc3339(value)
        .map_err(|err| SqliteStoreError::Corrupt(format!("timestamp {value}: {err}")))
}

/// Parses an optional stored timestamp.
fn decode_optional_timestamp(value: Option<String>) -> Result<Option<Timestamp>, SqliteStoreError> {
    value.as_deref().map(decode_timestamp).transpose()
}

/// Converts a stored revision.
fn to_revision(value: i64) -> Result<u64, SqliteStoreError> {
    u64::try_from(value)
        .map_err(|_| SqliteStoreError::Corrupt(format!("negative revision {value}")))
}

/// Converts a revision for storage.
fn from_revision(value: u64) -> Result<i64, SqliteStoreError> {
    i64::try_from(value)
        .map_err(|_| SqliteStoreError::Invalid(format!("revision {value} overflows")))
}

/// Converts a stored worker count.
fn to_count(value: i64) -> Result<u32, SqliteStoreError> {
    u32::try_from(value)
        .map_err(|_| SqliteStoreError::Corrupt(format!("worker count {value} out of range")))
}

/// Converts a child position for storage.
fn to_position(value: usize) -> Result<i64, SqliteStoreError> {
    i64::try_from(value)
        .map_err(|_| SqliteStoreError::Invalid(format!("position {value} overflows")))
}

// ============================================================================
// SECTION: Setup
// ============================================================================

/// Validates the store path against length limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let text = path.to_string_lossy();
    if text.is_empty() {
        return Err(SqliteStoreError::Invalid("store path is empty".to_string()));
    }
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    if path.components().any(|component| {
        component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH
    }) {
        return Err(SqliteStoreError::Invalid(
            "store path component exceeds length limit".to_string(),
        ));
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(format!(
            "store path {} is a directory",
            path.display()
        )));
    }
    Ok(())
}

/// Creates the parent directory of the store path.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens a connection and applies pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies connection pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Creates tables on first open and checks the schema version otherwise.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| db_error(&err))?;
    tx.execute("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL)", [])
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(SCHEMA_SQL).map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "expected schema version {SCHEMA_VERSION}, found {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}
