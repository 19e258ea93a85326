//! Span helpers for a backfill run and its batches.

use crate::model::RecordOutcome;
use tracing::Span;
use uuid::Uuid;

/// Root span of one run. `run.updated` and `run.failed` are filled in when
/// the summary is known.
pub fn start_run_span(run_id: &Uuid, identifier_field: &str) -> Span {
    tracing::info_span!(
        "backfill.run",
        "run.id" = %run_id,
        "run.field" = identifier_field,
        "run.updated" = tracing::field::Empty,
        "run.failed" = tracing::field::Empty,
    )
}

/// Span for one batch. Index is 1-based to match progress output.
pub fn start_batch_span(index: usize, total: usize, size: usize) -> Span {
    tracing::info_span!(
        "backfill.batch",
        "batch.index" = index,
        "batch.total" = total,
        "batch.size" = size,
    )
}

/// Emit one event per record outcome. Failures are warnings so they are
/// visible at the default filter level.
pub fn record_outcome(outcome: &RecordOutcome) {
    let key = outcome.key.as_deref().unwrap_or("<none>");
    match &outcome.outcome {
        crate::model::Outcome::Failed(reason) => {
            tracing::warn!(key, %reason, "record failed");
        }
        other => {
            tracing::debug!(key, outcome = other.label(), "record reconciled");
        }
    }
}

/// Fill in the run span's result fields.
pub fn record_run_totals(span: &Span, updated: usize, failed: usize) {
    span.record("run.updated", updated as u64);
    span.record("run.failed", failed as u64);
}
