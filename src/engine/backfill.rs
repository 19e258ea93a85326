//! One backfill run: enumerate, survey, dispatch, summarize.

use crate::config::RunConfig;
use crate::error::Result;
use crate::model::{Record, RecordOutcome};
use crate::report::{self, Summary, Survey};
use crate::store::Store;
use crate::telemetry::run as spans;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, info};
use uuid::Uuid;

use super::executor::BatchExecutor;
use super::reconcile::Reconciler;

/// Everything an operator needs after a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub identifier_field: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub survey: Survey,
    pub summary: Summary,
}

/// Wires a store to an executor for a single pass over all records.
///
/// Stateless between runs: calling [`run`](Self::run) again is always safe
/// and only touches records that still lack the field.
pub struct Backfill {
    store: Arc<dyn Store>,
    config: RunConfig,
    executor: BatchExecutor,
}

impl Backfill {
    pub fn new(store: Arc<dyn Store>, config: RunConfig) -> Result<Self> {
        config.validate()?;
        let reconciler = Reconciler::new(Arc::clone(&store), config.identifier_field.as_str());
        let executor = BatchExecutor::new(reconciler, config.concurrency, config.batch_size);
        Ok(Self {
            store,
            config,
            executor,
        })
    }

    /// Enumerate and count without writing anything.
    pub async fn survey(&self) -> Result<(Vec<Record>, Survey)> {
        let records = self.store.enumerate().await?;
        let survey = report::survey(&records, &self.config.identifier_field);
        Ok((records, survey))
    }

    /// Run the backfill to completion.
    ///
    /// Only enumeration errors are returned as `Err`. Per-record failures
    /// are in the report.
    pub async fn run(&self) -> Result<RunReport> {
        self.run_until(CancellationToken::new()).await
    }

    /// Run the backfill, dispatching no new batches once `cancel` fires.
    ///
    /// Each call takes its own token, so a cancelled run never affects the
    /// next one.
    pub async fn run_until(&self, cancel: CancellationToken) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = spans::start_run_span(&run_id, &self.config.identifier_field);

        async {
            let started_at = Utc::now();
            let clock = Instant::now();

            info!("enumerating records");
            let (records, survey) = self.survey().await?;
            info!(
                total = survey.total,
                with_identifier = survey.with_identifier,
                pending = survey.pending,
                missing_key = survey.missing_key,
                "enumeration complete"
            );

            let outcomes: Vec<RecordOutcome> = self.executor.run_until(records, &cancel).await;
            let summary = report::summarize(&outcomes, clock.elapsed());
            spans::record_run_totals(&span, summary.updated, summary.failed);
            info!(
                updated = summary.updated,
                skipped = summary.skipped,
                failed = summary.failed,
                elapsed_ms = summary.elapsed.as_millis() as u64,
                "run complete"
            );

            Ok(RunReport {
                run_id,
                identifier_field: self.config.identifier_field.clone(),
                started_at,
                finished_at: Utc::now(),
                survey,
                summary,
            })
        }
        .instrument(span.clone())
        .await
    }
}
