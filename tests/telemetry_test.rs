//! Integration tests for telemetry initialization and span helpers.

use idfill::model::{FailureReason, Outcome, RecordOutcome};
use idfill::telemetry::run::{record_outcome, record_run_totals, start_batch_span, start_run_span};
use idfill::telemetry::{TelemetryConfig, init_telemetry};
use uuid::Uuid;

#[test]
fn telemetry_initializes_without_endpoint() {
    // Only one global subscriber per process; a second init returns Err,
    // which is fine here.
    if let Ok(guard) = init_telemetry(TelemetryConfig::default()) {
        assert!(!guard.exporting());
        guard.force_flush();
    }
}

#[test]
fn run_span_records_totals() {
    let span = start_run_span(&Uuid::new_v4(), "VectorId");
    record_run_totals(&span, 12, 1);
}

#[test]
fn batch_span_wraps_outcome_events() {
    let span = start_batch_span(1, 4, 25);
    span.in_scope(|| {
        record_outcome(&RecordOutcome {
            key: Some("photos/1.jpg".to_string()),
            outcome: Outcome::Updated,
        });
        record_outcome(&RecordOutcome {
            key: None,
            outcome: Outcome::Failed(FailureReason::MissingKey),
        });
    });
}
