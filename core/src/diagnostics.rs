use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use thiserror::Error;

use crate::error::ErrorClass;

/// Severity of a `Diagnostic` row (SPEC_FULL §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Info,
    Warn,
    Error,
}

/// The component that raised a diagnostic, one per continuous service plus the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Component {
    FeedPoller,
    ArticleWorker,
    ChunkingService,
    EmbeddingService,
    FtsService,
    TrendsService,
    Cli,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub sequence: u64,
    pub level: DiagnosticLevel,
    pub component: Component,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_class: Option<ErrorClass>,
    #[serde(default)]
    pub details: HashMap<String, String>,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, component: Component, message: impl Into<String>) -> Self {
        Self {
            sequence: 0,
            level,
            component,
            message: message.into(),
            error_class: None,
            details: HashMap::new(),
        }
    }

    pub fn with_error_class(mut self, class: ErrorClass) -> Self {
        self.error_class = Some(class);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum DiagnosticError {
    #[error("diagnostic sink lock poisoned")]
    LockPoisoned,
    #[error("diagnostic io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("diagnostic serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only sink for `Diagnostic` rows. The Postgres-backed implementation lives in
/// `storage`; this trait lets every crate log without depending on `storage` directly.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, diagnostic: Diagnostic) -> Result<(), DiagnosticError>;
}

#[derive(Default)]
pub struct InMemoryDiagnosticSink {
    events: Mutex<Vec<Diagnostic>>,
    sequence: AtomicU64,
}

impl InMemoryDiagnosticSink {
    pub fn events(&self) -> Result<Vec<Diagnostic>, DiagnosticError> {
        let events = self.events.lock().map_err(|_| DiagnosticError::LockPoisoned)?;
        Ok(events.clone())
    }
}

impl DiagnosticSink for InMemoryDiagnosticSink {
    fn record(&self, mut diagnostic: Diagnostic) -> Result<(), DiagnosticError> {
        let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        diagnostic.sequence = next;
        let mut events = self.events.lock().map_err(|_| DiagnosticError::LockPoisoned)?;
        events.push(diagnostic);
        Ok(())
    }
}

/// Diagnostic sink backed by a line-delimited JSON file, useful for local runs of a
/// single service without a database connection.
pub struct JsonlDiagnosticSink {
    writer: Mutex<std::fs::File>,
    sequence: AtomicU64,
}

impl JsonlDiagnosticSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DiagnosticError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;

        Ok(Self {
            writer: Mutex::new(writer),
            sequence: AtomicU64::new(0),
        })
    }
}

impl DiagnosticSink for JsonlDiagnosticSink {
    fn record(&self, mut diagnostic: Diagnostic) -> Result<(), DiagnosticError> {
        let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        diagnostic.sequence = next;

        let line = serde_json::to_string(&diagnostic)?;
        let mut writer = self.writer.lock().map_err(|_| DiagnosticError::LockPoisoned)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn in_memory_sink_records_monotonic_sequence() {
        let sink = InMemoryDiagnosticSink::default();

        sink.record(Diagnostic::new(
            DiagnosticLevel::Info,
            Component::FeedPoller,
            "polled feed",
        ))
        .unwrap();
        sink.record(Diagnostic::new(
            DiagnosticLevel::Warn,
            Component::ArticleWorker,
            "dedup skipped article",
        ))
        .unwrap();

        let events = sink.events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].sequence, 1);
        assert_eq!(events[1].sequence, 2);
    }

    #[test]
    fn jsonl_sink_writes_component_and_error_class() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("diagnostics.log");
        let sink = JsonlDiagnosticSink::open(&path).unwrap();

        let diagnostic = Diagnostic::new(
            DiagnosticLevel::Error,
            Component::EmbeddingService,
            "embedding dimension mismatch",
        )
        .with_error_class(ErrorClass::DimensionMismatch)
        .with_detail("chunk_id", "42");

        sink.record(diagnostic).unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("\"component\":\"embedding_service\""));
        assert!(content.contains("\"error_class\":\"dimension_mismatch\""));
    }
}
