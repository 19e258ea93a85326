//! Run reporting: pre-dispatch census and the final summary.
//!
//! Both are folds over plain values. Nothing here touches the store.

use crate::model::{FailureReason, Outcome, Record, RecordOutcome};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Survey
// ---------------------------------------------------------------------------

/// What the enumerated record set looks like before any write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Survey {
    pub total: usize,
    /// Records that already carry the identifier field.
    pub with_identifier: usize,
    /// Records without the field. Includes keyless ones.
    pub pending: usize,
    /// Records with no usable key.
    pub missing_key: usize,
}

pub fn survey(records: &[Record], field: &str) -> Survey {
    records.iter().fold(Survey::default(), |mut s, r| {
        s.total += 1;
        if r.has_identifier(field) {
            s.with_identifier += 1;
        } else {
            s.pending += 1;
        }
        if r.valid_key().is_none() {
            s.missing_key += 1;
        }
        s
    })
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Found {} record(s).", self.total)?;
        writeln!(f, "{} already have an identifier.", self.with_identifier)?;
        write!(f, "{} need to be updated.", self.pending)?;
        if self.missing_key > 0 {
            write!(f, "\n{} have no key and will fail.", self.missing_key)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// A record that needs operator attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub key: Option<String>,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub skipped: usize,
    pub updated: usize,
    pub failed: usize,
    pub elapsed: Duration,
    /// Every failed record, sorted by key.
    pub failures: Vec<Failure>,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.skipped + self.updated + self.failed
    }

    /// True when no record failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Fold outcomes into a summary. Order of `outcomes` does not matter.
pub fn summarize(outcomes: &[RecordOutcome], elapsed: Duration) -> Summary {
    let mut summary = Summary {
        skipped: 0,
        updated: 0,
        failed: 0,
        elapsed,
        failures: Vec::new(),
    };

    for o in outcomes {
        match &o.outcome {
            Outcome::Skipped => summary.skipped += 1,
            Outcome::Updated => summary.updated += 1,
            Outcome::Failed(reason) => {
                summary.failed += 1;
                summary.failures.push(Failure {
                    key: o.key.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }

    summary.failures.sort_by(|a, b| a.key.cmp(&b.key));
    summary
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Done in {:.2}s: updated {}, skipped {}, failed {} ({} total).",
            self.elapsed.as_secs_f64(),
            self.updated,
            self.skipped,
            self.failed,
            self.total()
        )?;
        if !self.failures.is_empty() {
            write!(f, "\nFailed records:")?;
            for failure in &self.failures {
                let key = failure.key.as_deref().unwrap_or("<no key>");
                write!(f, "\n  {key}: {}", failure.reason)?;
            }
        }
        Ok(())
    }
}
