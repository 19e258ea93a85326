//! Batch executor: partition records, fan batches out over a bounded pool.

use crate::model::{FailureReason, Outcome, Record, RecordOutcome};
use crate::telemetry::{metrics, run as spans};
use futures::FutureExt;
use opentelemetry::KeyValue;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, warn};

use super::reconcile::Reconciler;

/// Runs a [`Reconciler`] over a record set, at most `concurrency` batches
/// at a time.
///
/// Records inside a batch are processed in order by one task. There is no
/// ordering across batches. A failing record, panics included, never stops
/// its batch or any other batch.
#[derive(Clone)]
pub struct BatchExecutor {
    reconciler: Reconciler,
    concurrency: usize,
    batch_size: usize,
}

impl BatchExecutor {
    /// Zero concurrency or batch size is treated as 1.
    pub fn new(reconciler: Reconciler, concurrency: usize, batch_size: usize) -> Self {
        Self {
            reconciler,
            concurrency: concurrency.max(1),
            batch_size: batch_size.max(1),
        }
    }

    /// Process every record and return one outcome per record.
    pub async fn run(&self, records: Vec<Record>) -> Vec<RecordOutcome> {
        self.run_until(records, &CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but stop dispatching new batches once
    /// `cancel` fires.
    ///
    /// Batches already running finish and their writes stay. Records never
    /// dispatched come back as `Failed(Cancelled)`. The token only affects
    /// this call.
    pub async fn run_until(
        &self,
        records: Vec<Record>,
        cancel: &CancellationToken,
    ) -> Vec<RecordOutcome> {
        let total_records = records.len();
        let batches = partition(records, self.batch_size);
        let total = batches.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();
        // Keys of every dispatched batch whose outcomes have not come back yet.
        let mut in_flight: HashMap<usize, Vec<Option<String>>> = HashMap::new();
        let mut outcomes = Vec::with_capacity(total_records);

        info!(
            batches = total,
            records = total_records,
            concurrency = self.concurrency,
            "dispatching batches"
        );

        let mut pending = batches.into_iter().enumerate();
        for (index, batch) in pending.by_ref() {
            let Some(permit) = acquire(&semaphore, cancel).await else {
                warn!(next_batch = index + 1, total, "cancelled, no further batches dispatched");
                outcomes.extend(cancelled(&batch));
                break;
            };
            in_flight.insert(index, batch.iter().map(|r| r.key.clone()).collect());
            tasks.spawn(run_batch(
                self.reconciler.clone(),
                batch,
                index,
                total,
                permit,
            ));
        }
        for (_, batch) in pending {
            outcomes.extend(cancelled(&batch));
        }

        outcomes.extend(collect(tasks, in_flight).await);
        outcomes
    }
}

type BatchResult = (usize, Vec<RecordOutcome>);

/// Join every batch task. A batch whose task dies without reporting back
/// still yields one `Failed(Aborted)` outcome per record it held.
async fn collect(
    mut tasks: JoinSet<BatchResult>,
    mut in_flight: HashMap<usize, Vec<Option<String>>>,
) -> Vec<RecordOutcome> {
    let mut outcomes = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, batch_outcomes)) => {
                in_flight.remove(&index);
                outcomes.extend(batch_outcomes);
            }
            Err(e) => error!("batch task failed: {e}"),
        }
    }

    for (index, keys) in in_flight {
        error!(batch = index + 1, "batch lost, reporting its records as aborted");
        outcomes.extend(keys.into_iter().map(|key| RecordOutcome {
            key,
            outcome: Outcome::Failed(FailureReason::Aborted("batch task lost".to_string())),
        }));
    }
    outcomes
}

/// Wait for a free slot. `None` once `cancel` has fired.
async fn acquire(
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Option<OwnedSemaphorePermit> {
    if cancel.is_cancelled() {
        return None;
    }
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        permit = Arc::clone(semaphore).acquire_owned() => permit.ok(),
    }
}

/// Process one batch. Returns the 0-based batch index with its outcomes.
async fn run_batch(
    reconciler: Reconciler,
    batch: Vec<Record>,
    index: usize,
    total: usize,
    permit: OwnedSemaphorePermit,
) -> BatchResult {
    let _permit = permit;
    let span = spans::start_batch_span(index + 1, total, batch.len());
    let outcomes = process_batch(&reconciler, &batch).instrument(span).await;

    let aborted = outcomes
        .iter()
        .any(|o| matches!(o.outcome, Outcome::Failed(FailureReason::Aborted(_))));
    let result = if aborted { "aborted" } else { "ok" };
    metrics::batches_completed().add(1, &[KeyValue::new("result", result)]);

    let (skipped, updated, failed) = tally(&outcomes);
    info!(batch = index + 1, total, updated, skipped, failed, "batch complete");
    (index, outcomes)
}

async fn process_batch(reconciler: &Reconciler, batch: &[Record]) -> Vec<RecordOutcome> {
    let counter = metrics::records_reconciled();
    let mut outcomes = Vec::with_capacity(batch.len());
    for record in batch {
        let outcome = match AssertUnwindSafe(reconciler.reconcile(record))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => Outcome::Failed(FailureReason::Aborted(panic_message(panic.as_ref()))),
        };
        let outcome = RecordOutcome::new(record, outcome);
        counter.add(1, &[KeyValue::new("outcome", outcome.outcome.label())]);
        spans::record_outcome(&outcome);
        outcomes.push(outcome);
    }
    outcomes
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Split into batches of `size`, preserving order. The last may be short.
pub fn partition(records: Vec<Record>, size: usize) -> Vec<Vec<Record>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(records.len().div_ceil(size));
    let mut iter = records.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

fn cancelled(batch: &[Record]) -> impl Iterator<Item = RecordOutcome> + '_ {
    batch
        .iter()
        .map(|r| RecordOutcome::new(r, Outcome::Failed(FailureReason::Cancelled)))
}

fn tally(outcomes: &[RecordOutcome]) -> (usize, usize, usize) {
    outcomes
        .iter()
        .fold((0, 0, 0), |(s, u, f), o| match o.outcome {
            Outcome::Skipped => (s + 1, u, f),
            Outcome::Updated => (s, u + 1, f),
            Outcome::Failed(_) => (s, u, f + 1),
        })
}
