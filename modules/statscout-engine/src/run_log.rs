//! Scrape run log: a persisted JSON timeline of one job.
//!
//! Each job produces `{DATA_DIR}/scrape-runs/{run_id}.json` with an ordered
//! list of timestamped events. Saving is best effort.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use statscout_common::{FailureReason, JobPhase, JobState, RowRef, Strategy};

pub struct RunLog {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    events: Vec<RunEvent>,
    seq: u32,
}

#[derive(Debug, Serialize)]
struct RunEvent {
    seq: u32,
    ts: DateTime<Utc>,
    #[serde(flatten)]
    kind: EventKind,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    JobStarted {
        total: u32,
        filter: Option<Vec<String>>,
    },
    TargetScraped {
        row: RowRef,
        display_name: String,
        url: String,
        strategy: Strategy,
        success: bool,
        followers: u64,
        failure: Option<FailureReason>,
    },
    BatchFlushed {
        rows: usize,
        batched: bool,
    },
    RowWritten {
        row: RowRef,
        success: bool,
    },
    JobFinished {
        phase: JobPhase,
        error: Option<String>,
    },
}

impl RunLog {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            events: Vec::new(),
            seq: 0,
        }
    }

    pub fn log(&mut self, kind: EventKind) {
        self.events.push(RunEvent {
            seq: self.seq,
            ts: Utc::now(),
            kind,
        });
        self.seq += 1;
    }

    /// Serialize the run log to JSON under `data_dir` and return the file path.
    pub fn save(&self, data_dir: &Path, summary: &JobSummary) -> Result<PathBuf> {
        let dir = data_dir.join("scrape-runs");
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("{}.json", self.run_id));
        let output = SerializedRunLog {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: Utc::now(),
            summary,
            events: &self.events,
        };

        std::fs::write(&path, serde_json::to_string_pretty(&output)?)?;
        info!(path = %path.display(), events = self.events.len(), "Scrape run log saved");

        Ok(path)
    }
}

#[derive(Serialize)]
struct SerializedRunLog<'a> {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
    summary: &'a JobSummary,
    events: &'a [RunEvent],
}

// ---------------------------------------------------------------------------
// JobSummary
// ---------------------------------------------------------------------------

/// End-of-job counters, logged and persisted with the run log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub phase: JobPhase,
    pub total: u32,
    pub processed: u32,
    pub success_count: u32,
    pub fail_count: u32,
}

impl JobSummary {
    /// Percentage of processed targets that succeeded, 0 when nothing ran.
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            f64::from(self.success_count) * 100.0 / f64::from(self.processed)
        }
    }
}

impl From<&JobState> for JobSummary {
    fn from(state: &JobState) -> Self {
        Self {
            phase: state.phase,
            total: state.total,
            processed: state.processed,
            success_count: state.success_count,
            fail_count: state.fail_count,
        }
    }
}

impl fmt::Display for JobSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Scrape Job Complete ===")?;
        writeln!(f, "Phase:          {:?}", self.phase)?;
        writeln!(f, "Targets:        {} of {}", self.processed, self.total)?;
        writeln!(f, "Succeeded:      {}", self.success_count)?;
        writeln!(f, "Failed:         {}", self.fail_count)?;
        write!(f, "Success rate:   {:.1}%", self.success_rate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(success: u32, fail: u32) -> JobSummary {
        JobSummary {
            phase: JobPhase::Completed,
            total: success + fail,
            processed: success + fail,
            success_count: success,
            fail_count: fail,
        }
    }

    #[test]
    fn success_rate_handles_empty_jobs() {
        assert_eq!(summary(0, 0).success_rate(), 0.0);
        assert_eq!(summary(3, 1).success_rate(), 75.0);
    }

    #[test]
    fn display_reports_counts_and_rate() {
        let text = summary(1, 1).to_string();
        assert!(text.contains("Targets:        2 of 2"));
        assert!(text.contains("50.0%"));
    }

    #[test]
    fn save_writes_ordered_events() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::new(Uuid::new_v4());
        log.log(EventKind::JobStarted { total: 1, filter: None });
        log.log(EventKind::RowWritten { row: RowRef(2), success: true });

        let path = log.save(dir.path(), &summary(1, 0)).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["events"][0]["type"], "job_started");
        assert_eq!(json["events"][1]["seq"], 1);
        assert_eq!(json["events"][1]["row"], 2);
        assert_eq!(json["summary"]["success_count"], 1);
    }
}
