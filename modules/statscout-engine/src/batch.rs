use tracing::{info, warn};

use statscout_common::{RowRef, ScrapeOutcome};

use crate::store::TargetStore;

/// Default flush threshold.
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Outcomes waiting for one store write, in processing order.
#[derive(Debug)]
pub struct WriteBatch {
    entries: Vec<(RowRef, ScrapeOutcome)>,
    threshold: usize,
}

impl WriteBatch {
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            entries: Vec::with_capacity(threshold),
            threshold,
        }
    }

    pub fn push(&mut self, row: RowRef, outcome: ScrapeOutcome) {
        self.entries.push((row, outcome));
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.threshold
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drain the batch, leaving it empty whatever happens to the entries next.
    pub fn take(&mut self) -> Vec<(RowRef, ScrapeOutcome)> {
        std::mem::take(&mut self.entries)
    }
}

/// What a flush did, for logging and the run log.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub rows: usize,
    /// The single batched request succeeded.
    pub batched: bool,
    /// Rows written individually after the batch request failed.
    pub written_singly: Vec<RowRef>,
    /// Rows that could not be written at all. They stay pending in the store.
    pub unwritten: Vec<RowRef>,
}

/// Write everything in `batch`. If the batched request fails, each row is
/// retried exactly once with a single write. The batch is always left empty.
pub async fn flush(store: &dyn TargetStore, batch: &mut WriteBatch) -> FlushReport {
    let entries = batch.take();
    let mut report = FlushReport {
        rows: entries.len(),
        ..FlushReport::default()
    };
    if entries.is_empty() {
        return report;
    }

    match store.write_batch(&entries).await {
        Ok(()) => {
            info!(rows = entries.len(), "Flushed write batch");
            report.batched = true;
        }
        Err(e) => {
            warn!(rows = entries.len(), error = %e, "Batch write failed, falling back to single-row writes");
            for (row, outcome) in &entries {
                match store.write_single(*row, outcome).await {
                    Ok(()) => report.written_singly.push(*row),
                    Err(e) => {
                        warn!(row = %row, error = %e, "Single-row write failed, row stays pending");
                        report.unwritten.push(*row);
                    }
                }
            }
        }
    }
    report
}
