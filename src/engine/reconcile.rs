//! Per-record decision: skip, write, or fail.

use crate::identifier::identifier_of;
use crate::model::{Assign, FailureReason, Outcome, Record};
use crate::store::Store;
use std::sync::Arc;
use tracing::debug;

/// Decides what to do with a single record and performs the write.
///
/// Cheap to clone; every worker holds its own copy.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn Store>,
    field: Arc<str>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, field: impl Into<Arc<str>>) -> Self {
        Self {
            store,
            field: field.into(),
        }
    }

    /// Reconcile one record. Never returns an error: store failures become
    /// [`Outcome::Failed`] and are not retried.
    ///
    /// A record that already has the field is left alone whatever its value,
    /// so ids assigned by another process are never overwritten.
    pub async fn reconcile(&self, record: &Record) -> Outcome {
        let Some(key) = record.valid_key() else {
            return Outcome::Failed(FailureReason::MissingKey);
        };

        if record.has_identifier(&self.field) {
            return Outcome::Skipped;
        }

        let id = identifier_of(key);
        match self.store.conditional_assign(key, &self.field, id).await {
            Ok(Assign::Applied) => {
                debug!(key, %id, "identifier written");
                Outcome::Updated
            }
            Ok(Assign::AlreadyPresent) => {
                debug!(key, "identifier set concurrently");
                Outcome::Skipped
            }
            Err(e) => Outcome::Failed(FailureReason::Store(e.to_string())),
        }
    }
}
