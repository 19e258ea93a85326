//! Core data model.
//!
//! A record is one addressable item in the store. The engine only reads it
//! and asks the store to set a single field. An outcome classifies what one
//! reconciliation attempt did to one record.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One item read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Natural key. `None` or empty marks a malformed item.
    pub key: Option<String>,

    /// All attributes of the item, including the key attribute when the
    /// store keeps it inline.
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            fields: serde_json::Map::new(),
        }
    }

    /// A record the store returned without a usable key.
    pub fn keyless() -> Self {
        Self {
            key: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// The key, if present and non-empty.
    pub fn valid_key(&self) -> Option<&str> {
        self.key.as_deref().filter(|k| !k.is_empty())
    }

    /// Presence only. The stored value is never inspected.
    pub fn has_identifier(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}

// ---------------------------------------------------------------------------
// Store write result
// ---------------------------------------------------------------------------

/// Non-error results of a conditional assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assign {
    /// The field was absent and has been written.
    Applied,
    /// The field was already there; nothing was written.
    AlreadyPresent,
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why a record could not be reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// The record has no key or an empty key.
    MissingKey,
    /// The store rejected the write.
    Store(String),
    /// The run was cancelled before this record was dispatched.
    Cancelled,
    /// The worker processing this record's batch died.
    Aborted(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::MissingKey => write!(f, "missing key"),
            FailureReason::Store(detail) => write!(f, "store error: {detail}"),
            FailureReason::Cancelled => write!(f, "cancelled before dispatch"),
            FailureReason::Aborted(detail) => write!(f, "worker aborted: {detail}"),
        }
    }
}

/// Result of one reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The record already carried an identifier, or another writer set it first.
    Skipped,
    /// This run wrote the identifier.
    Updated,
    Failed(FailureReason),
}

impl Outcome {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Skipped => "skipped",
            Outcome::Updated => "updated",
            Outcome::Failed(_) => "failed",
        }
    }
}

/// An outcome tied to the record it describes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOutcome {
    pub key: Option<String>,
    pub outcome: Outcome,
}

impl RecordOutcome {
    pub fn new(record: &Record, outcome: Outcome) -> Self {
        Self {
            key: record.key.clone(),
            outcome,
        }
    }
}
