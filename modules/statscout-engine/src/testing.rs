// Test doubles for the orchestrator's two seams.
//
// - MemoryStore (TargetStore): in-memory sheet rows with switchable failures
//   and a log of every write call.
// - ScriptedExtractor (ProfileExtractor): URL -> scripted result, with a call log.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use statscout_common::{FailureReason, ProfileCounts, RowRef, ScrapeOutcome, ScrapeTarget, Strategy};

use crate::extract::ProfileExtractor;
use crate::store::TargetStore;

pub fn counts(followers: u64, following: u64, posts: u64) -> ProfileCounts {
    ProfileCounts {
        followers,
        following,
        posts,
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemoryRow {
    row: RowRef,
    name: String,
    url: String,
    written: Option<ProfileCounts>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCall {
    Batch(Vec<RowRef>),
    Single(RowRef),
}

/// Rows behave like the sheet: pending iff the URL is non-empty and nothing
/// has been written yet. Row numbers start at 2, below the header.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<MemoryRow>>,
    writes: Mutex<Vec<WriteCall>>,
    fail_listing: AtomicBool,
    fail_batches: AtomicBool,
    fail_singles: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row(self, name: &str, url: &str) -> Self {
        {
            let mut rows = self.rows.lock().unwrap();
            let row = RowRef(rows.len() as u32 + 2);
            rows.push(MemoryRow {
                row,
                name: name.to_string(),
                url: url.to_string(),
                written: None,
            });
        }
        self
    }

    pub fn failing_listing(self) -> Self {
        self.fail_listing.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_batches(self) -> Self {
        self.fail_batches.store(true, Ordering::SeqCst);
        self
    }

    pub fn failing_singles(self) -> Self {
        self.fail_singles.store(true, Ordering::SeqCst);
        self
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().unwrap().clone()
    }

    pub fn single_writes(&self) -> Vec<RowRef> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                WriteCall::Single(row) => Some(row),
                WriteCall::Batch(_) => None,
            })
            .collect()
    }

    /// Counts stored for `row`, if any write reached it.
    pub fn written(&self, row: RowRef) -> Option<ProfileCounts> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.row == row)
            .and_then(|r| r.written)
    }

    fn apply(&self, row: RowRef, outcome: &ScrapeOutcome) {
        if let Some(r) = self.rows.lock().unwrap().iter_mut().find(|r| r.row == row) {
            r.written = Some(outcome.counts);
        }
    }
}

#[async_trait]
impl TargetStore for MemoryStore {
    async fn list_pending_targets(&self) -> Result<Vec<ScrapeTarget>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            bail!("store unreachable");
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| !r.url.trim().is_empty() && r.written.is_none())
            .map(|r| ScrapeTarget {
                row: r.row,
                display_name: r.name.clone(),
                profile_url: r.url.clone(),
            })
            .collect())
    }

    async fn write_batch(&self, batch: &[(RowRef, ScrapeOutcome)]) -> Result<()> {
        self.writes
            .lock()
            .unwrap()
            .push(WriteCall::Batch(batch.iter().map(|(row, _)| *row).collect()));
        if self.fail_batches.load(Ordering::SeqCst) {
            bail!("batch update rejected");
        }
        for (row, outcome) in batch {
            self.apply(*row, outcome);
        }
        Ok(())
    }

    async fn write_single(&self, row: RowRef, outcome: &ScrapeOutcome) -> Result<()> {
        self.writes.lock().unwrap().push(WriteCall::Single(row));
        if self.fail_singles.load(Ordering::SeqCst) {
            bail!("update rejected");
        }
        self.apply(row, outcome);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedExtractor
// ---------------------------------------------------------------------------

/// Returns the scripted result for each URL; unscripted URLs fail with HTTP 404.
pub struct ScriptedExtractor {
    strategy: Strategy,
    results: HashMap<String, Result<ProfileCounts, FailureReason>>,
    delay: Option<Duration>,
    preflight_error: Option<String>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExtractor {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            results: HashMap::new(),
            delay: None,
            preflight_error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_counts(mut self, url: &str, counts: ProfileCounts) -> Self {
        self.results.insert(url.to_string(), Ok(counts));
        self
    }

    pub fn on_failure(mut self, url: &str, reason: FailureReason) -> Self {
        self.results.insert(url.to_string(), Err(reason));
        self
    }

    /// Sleep this long inside every `extract` call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing_preflight(mut self, message: &str) -> Self {
        self.preflight_error = Some(message.to_string());
        self
    }

    /// URLs passed to `extract`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProfileExtractor for ScriptedExtractor {
    fn strategy(&self) -> Strategy {
        self.strategy
    }

    async fn extract(&self, profile_url: &str) -> Result<ProfileCounts, FailureReason> {
        self.calls.lock().unwrap().push(profile_url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .get(profile_url)
            .cloned()
            .unwrap_or(Err(FailureReason::HttpError(404)))
    }

    async fn preflight(&self) -> Result<()> {
        match &self.preflight_error {
            Some(message) => bail!("{message}"),
            None => Ok(()),
        }
    }
}
