//! Metric instrument factories for idfill.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without an OTLP endpoint the global provider is a no-op, so recording
//! is always safe.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("idfill")
}

/// Counter: records reconciled.
/// Labels: `outcome` ("skipped" | "updated" | "failed").
pub fn records_reconciled() -> Counter<u64> {
    meter()
        .u64_counter("idfill.records")
        .with_description("Number of records reconciled, by outcome")
        .build()
}

/// Counter: batches that finished, panicked ones included.
/// Labels: `result` ("ok" | "aborted").
pub fn batches_completed() -> Counter<u64> {
    meter()
        .u64_counter("idfill.batches")
        .with_description("Number of batches completed")
        .build()
}

/// Histogram: store conditional-assign latency in milliseconds.
/// Labels: `store`.
pub fn assign_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("idfill.assign.duration_ms")
        .with_description("Conditional assign duration in milliseconds")
        .with_unit("ms")
        .build()
}
