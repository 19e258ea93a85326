//! Reconciliation engine: per-record decisions, batch fan-out, whole runs.

pub mod backfill;
pub mod executor;
pub mod reconcile;

pub use backfill::{Backfill, RunReport};
pub use executor::BatchExecutor;
pub use reconcile::Reconciler;
