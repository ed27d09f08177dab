// crates/loadgrid-core/src/runtime/audit.rs
// ============================================================================
// Module: Loadgrid Audit Sinks
// Description: JSON-lines, stderr, in-memory, and no-op audit sinks.
// Purpose: Route orchestrator audit events without a logging framework.
// Dependencies: crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! Every sink serializes [`AuditEvent`] as one JSON object per line. Write
//! failures are swallowed so logging can never fail a command.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use crate::interfaces::AuditEvent;
use crate::interfaces::AuditSink;

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that discards events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct JsonlAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl JsonlAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Audit sink that keeps events in memory; clones share the buffer.
#[derive(Debug, Default, Clone)]
pub struct InMemoryAuditSink {
    /// Recorded events in arrival order.
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|guard| guard.clone()).unwrap_or_default()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event.clone());
        }
    }
}

/// Type-erased audit sink chosen at runtime.
#[derive(Clone)]
pub struct SharedAuditSink {
    /// Wrapped sink.
    inner: Arc<dyn AuditSink>,
}

impl SharedAuditSink {
    /// Wraps a sink.
    #[must_use]
    pub fn new(sink: impl AuditSink + 'static) -> Self {
        Self {
            inner: Arc::new(sink),
        }
    }
}

impl AuditSink for SharedAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.inner.record(event);
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
    use crate::core::identifiers::RunName;
    use crate::core::time::Timestamp;
    use crate::interfaces::AuditKind;

    fn event() -> AuditEvent {
        AuditEvent::new(
            Timestamp::from_unix_seconds(0).unwrap(),
            AuditKind::RunStarted {
                run: RunName::new("example-com-abcde"),
            },
        )
    }

    #[test]
    fn events_serialize_with_flat_tag() {
        let value = serde_json::to_value(event()).unwrap();
        assert_eq!(value["event"], "run_started");
        assert_eq!(value["run"], "example-com-abcde");
        assert_eq!(value["timestamp"], "1970-01-01T00:00:00Z");
    }

    #[test]
    fn shared_sink_forwards_to_inner_sink() {
        let memory = InMemoryAuditSink::new();
        let shared = SharedAuditSink::new(memory.clone());
        shared.record(&event());
        assert_eq!(memory.events(), vec![event()]);
    }
}
