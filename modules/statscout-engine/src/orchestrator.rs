//! The scrape job state machine.
//!
//! One `Orchestrator` owns the single process-wide `JobState`. `start` only
//! touches in-memory state and spawns the job loop; everything that blocks
//! (store reads, extraction, delays, writes) happens inside that task.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use typed_builder::TypedBuilder;
use uuid::Uuid;

use statscout_common::{
    JobPhase, JobState, PendingPreview, ProfileCounts, ScrapeOutcome, ScrapeTarget, StatScoutError,
    Strategy, CURRENT_TARGET_DONE,
};

use crate::batch::{self, WriteBatch, DEFAULT_BATCH_SIZE};
use crate::extract::ProfileExtractor;
use crate::run_log::{EventKind, JobSummary, RunLog};
use crate::store::TargetStore;

/// Rows shown by `preview` when the caller has no preference.
pub const PREVIEW_ROWS: usize = 10;

/// Collaborators and tuning for the orchestrator.
#[derive(Clone, TypedBuilder)]
pub struct OrchestratorDeps {
    pub store: Arc<dyn TargetStore>,
    /// Cheap strategy, always tried first.
    pub fetch: Arc<dyn ProfileExtractor>,
    /// Expensive fallback, tried only when `fetch` fails.
    pub rendered: Arc<dyn ProfileExtractor>,
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Pause after a target that finished on the fetch strategy.
    #[builder(default = Duration::from_millis(500))]
    pub fetch_delay: Duration,
    /// Pause after a target that needed the rendered browser.
    #[builder(default = Duration::from_secs(2))]
    pub browser_delay: Duration,
    /// Where run logs go. `None` disables them.
    #[builder(default, setter(strip_option))]
    pub data_dir: Option<PathBuf>,
}

#[derive(Clone)]
pub struct Orchestrator {
    deps: OrchestratorDeps,
    state: Arc<Mutex<JobState>>,
    cancel: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps) -> Self {
        Self {
            deps,
            state: Arc::new(Mutex::new(JobState::default())),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Consistent snapshot of the job. May lag the loop by one target.
    pub async fn status(&self) -> JobState {
        self.state.lock().await.clone()
    }

    /// Pending targets and the first `limit` of them. Read-only.
    pub async fn preview(&self, limit: usize) -> Result<PendingPreview, StatScoutError> {
        let targets = self
            .deps
            .store
            .list_pending_targets()
            .await
            .map_err(|e| StatScoutError::Store(format!("target store unreachable: {e:#}")))?;
        Ok(PendingPreview::from_targets(&targets, limit))
    }

    /// Start a job, optionally restricted to targets with these display names.
    ///
    /// Returns as soon as the state is Running and the job task is spawned.
    /// Rejected while a job is Running or Stopping; counters are untouched then.
    /// The returned handle resolves when the job ends; callers may drop it.
    pub async fn start(&self, filter: Option<Vec<String>>) -> Result<JoinHandle<()>, StatScoutError> {
        let run_id = Uuid::new_v4();
        {
            let mut state = self.state.lock().await;
            if !state.phase.accepts_start() {
                return Err(StatScoutError::AlreadyRunning);
            }
            *state = JobState::begin(run_id, Utc::now());
            self.cancel.store(false, Ordering::SeqCst);
        }
        let filter = filter.filter(|names| !names.is_empty());
        info!(%run_id, filter = ?filter, "Scrape job started");

        let job = self.clone();
        let worker = tokio::spawn(async move { job.run(run_id, filter).await });

        let state = self.state.clone();
        Ok(tokio::spawn(async move {
            if let Err(e) = worker.await {
                error!(%run_id, error = %e, "Scrape job task aborted");
                let mut state = state.lock().await;
                if state.run_id == Some(run_id) && state.phase.is_active() {
                    state.phase = JobPhase::Failed;
                    state.error = Some(format!("job task aborted: {e}"));
                    state.touch(Utc::now());
                }
            }
        }))
    }

    /// Request a cooperative stop. Idempotent; the loop halts at the next
    /// target boundary, after any in-flight extraction finishes.
    pub async fn stop(&self) -> JobPhase {
        self.cancel.store(true, Ordering::SeqCst);
        let mut state = self.state.lock().await;
        if state.phase == JobPhase::Running {
            info!(run_id = ?state.run_id, "Stop requested");
            state.phase = JobPhase::Stopping;
            state.touch(Utc::now());
        }
        state.phase
    }

    // ---------------------------------------------------------------------
    // Job loop
    // ---------------------------------------------------------------------

    async fn run(&self, run_id: Uuid, filter: Option<Vec<String>>) {
        let mut log = RunLog::new(run_id);

        let phase = match self.prepare(filter.as_deref()).await {
            Ok(targets) => {
                log.log(EventKind::JobStarted {
                    total: targets.len() as u32,
                    filter: filter.clone(),
                });
                self.process(targets, &mut log).await
            }
            Err(e) => {
                error!(%run_id, error = %format!("{e:#}"), "Scrape job failed before processing");
                let mut state = self.state.lock().await;
                state.error = Some(format!("{e:#}"));
                JobPhase::Failed
            }
        };

        let (summary, error) = {
            let mut state = self.state.lock().await;
            state.phase = phase;
            state.touch(Utc::now());
            (JobSummary::from(&*state), state.error.clone())
        };
        log.log(EventKind::JobFinished { phase, error });
        info!(%run_id, "{summary}");

        if let Some(dir) = &self.deps.data_dir {
            if let Err(e) = log.save(dir, &summary) {
                warn!(%run_id, error = %e, "Failed to save run log");
            }
        }
    }

    /// Setup phase: list and filter targets, then check both engines.
    /// Any error here is job-fatal.
    async fn prepare(&self, filter: Option<&[String]>) -> Result<Vec<ScrapeTarget>> {
        let mut targets = self
            .deps
            .store
            .list_pending_targets()
            .await
            .context("Target store unreachable")?;

        if let Some(names) = filter {
            targets.retain(|t| names.iter().any(|n| n == &t.display_name));
            for name in names {
                if !targets.iter().any(|t| &t.display_name == name) {
                    warn!(name = name.as_str(), "Requested target is not pending");
                }
            }
        }

        {
            let mut state = self.state.lock().await;
            state.total = targets.len() as u32;
            state.touch(Utc::now());
        }
        info!(total = targets.len(), "Pending targets selected");

        if !targets.is_empty() {
            self.deps
                .fetch
                .preflight()
                .await
                .context("Fetch strategy unavailable")?;
            self.deps
                .rendered
                .preflight()
                .await
                .context("Browser engine unavailable")?;
        }
        Ok(targets)
    }

    /// Walk the targets in order. Returns the phase the job ends in.
    async fn process(&self, targets: Vec<ScrapeTarget>, log: &mut RunLog) -> JobPhase {
        let total = targets.len();
        let mut pending = WriteBatch::new(self.deps.batch_size);

        for (index, target) in targets.into_iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                info!(processed = index, total, "Scrape job stopped");
                self.flush(&mut pending, log).await;
                self.state.lock().await.current_target = None;
                return JobPhase::Idle;
            }

            {
                let mut state = self.state.lock().await;
                state.current_target = Some(target.label());
                state.touch(Utc::now());
            }

            let outcome = self.scrape_target(&target).await;
            log.log(EventKind::TargetScraped {
                row: target.row,
                display_name: target.display_name.clone(),
                url: target.profile_url.clone(),
                strategy: outcome.strategy,
                success: outcome.succeeded(),
                followers: outcome.counts.followers,
                failure: outcome.failure.clone(),
            });
            self.state.lock().await.record(outcome.succeeded(), Utc::now());

            let strategy = outcome.strategy;
            if outcome.succeeded() {
                pending.push(target.row, outcome);
            }

            let last = index + 1 == total;
            if pending.is_full() || last {
                self.flush(&mut pending, log).await;
            }
            if !last {
                tokio::time::sleep(self.delay_after(strategy)).await;
            }
        }

        self.state.lock().await.current_target = Some(CURRENT_TARGET_DONE.to_string());
        JobPhase::Completed
    }

    /// Fetch first; on any failure the rendered browser decides the outcome.
    async fn scrape_target(&self, target: &ScrapeTarget) -> ScrapeOutcome {
        let fetch = &self.deps.fetch;
        let reason = match fetch.extract(&target.profile_url).await {
            Ok(counts) => return self.succeeded(target, fetch.strategy(), counts),
            Err(reason) => reason,
        };
        info!(
            row = %target.row,
            url = target.profile_url.as_str(),
            reason = %reason,
            "Fetch failed, falling back to rendered browser"
        );

        let rendered = &self.deps.rendered;
        match rendered.extract(&target.profile_url).await {
            Ok(counts) => self.succeeded(target, rendered.strategy(), counts),
            Err(reason) => {
                warn!(
                    row = %target.row,
                    url = target.profile_url.as_str(),
                    reason = %reason,
                    "Target failed on every strategy"
                );
                ScrapeOutcome::failure(target.clone(), rendered.strategy(), reason)
            }
        }
    }

    fn succeeded(
        &self,
        target: &ScrapeTarget,
        strategy: Strategy,
        counts: ProfileCounts,
    ) -> ScrapeOutcome {
        info!(
            row = %target.row,
            name = target.display_name.as_str(),
            strategy = %strategy,
            followers = counts.followers,
            following = counts.following,
            posts = counts.posts,
            tier = %counts.tier(),
            "Scraped profile"
        );
        ScrapeOutcome::success(target.clone(), strategy, counts)
    }

    fn delay_after(&self, strategy: Strategy) -> Duration {
        match strategy {
            Strategy::Fetch => self.deps.fetch_delay,
            Strategy::Browser => self.deps.browser_delay,
        }
    }

    async fn flush(&self, pending: &mut WriteBatch, log: &mut RunLog) {
        if pending.is_empty() {
            return;
        }
        let report = batch::flush(self.deps.store.as_ref(), pending).await;
        log.log(EventKind::BatchFlushed {
            rows: report.rows,
            batched: report.batched,
        });
        for row in &report.written_singly {
            log.log(EventKind::RowWritten { row: *row, success: true });
        }
        for row in &report.unwritten {
            log.log(EventKind::RowWritten { row: *row, success: false });
        }
    }
}
