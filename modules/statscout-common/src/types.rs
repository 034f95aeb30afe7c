use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Targets ---

/// 1-based sheet row number. Row 1 is the header and never a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowRef(pub u32);

impl fmt::Display for RowRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One profile to scrape, read from the store for a single job run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub row: RowRef,
    pub display_name: String,
    pub profile_url: String,
}

impl ScrapeTarget {
    /// Human label used for `current_target` and logs.
    pub fn label(&self) -> String {
        format!("{} ({})", self.display_name, self.profile_url)
    }
}

// --- Counts ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileCounts {
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
}

impl ProfileCounts {
    /// All three fields zero. Treated as "no data found", never as success.
    pub fn is_empty(&self) -> bool {
        self.followers == 0 && self.following == 0 && self.posts == 0
    }

    pub fn tier(&self) -> FollowerTier {
        FollowerTier::for_followers(self.followers)
    }
}

/// Audience size bucket derived from the follower count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowerTier {
    Nano,
    Micro,
    Mid,
    Macro,
    Mega,
}

impl FollowerTier {
    pub fn for_followers(followers: u64) -> Self {
        match followers {
            0..=999 => Self::Nano,
            1_000..=9_999 => Self::Micro,
            10_000..=99_999 => Self::Mid,
            100_000..=999_999 => Self::Macro,
            _ => Self::Mega,
        }
    }
}

impl fmt::Display for FollowerTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Nano => "nano",
            Self::Micro => "micro",
            Self::Mid => "mid",
            Self::Macro => "macro",
            Self::Mega => "mega",
        };
        f.write_str(s)
    }
}

// --- Outcomes ---

/// Extraction strategy that produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Plain HTTP GET plus regex scan.
    Fetch,
    /// Headless browser render plus selector scan.
    Browser,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch => f.write_str("fetch"),
            Self::Browser => f.write_str("browser"),
        }
    }
}

/// Why a single extraction attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    LoginRequired,
    Timeout,
    NoDataFound,
    HttpError(u16),
    /// Transport failure before any HTTP status was received.
    Network(String),
    /// The browser session could not be created. Fatal to the target only.
    SetupError(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginRequired => f.write_str("login required"),
            Self::Timeout => f.write_str("timed out"),
            Self::NoDataFound => f.write_str("no data found"),
            Self::HttpError(code) => write!(f, "HTTP {code}"),
            Self::Network(msg) => write!(f, "network error: {msg}"),
            Self::SetupError(msg) => write!(f, "browser setup failed: {msg}"),
        }
    }
}

/// Result of scraping one target. Never mutated; a fallback attempt
/// produces a new outcome that supersedes the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapeOutcome {
    pub target: ScrapeTarget,
    pub counts: ProfileCounts,
    pub strategy: Strategy,
    pub failure: Option<FailureReason>,
}

impl ScrapeOutcome {
    pub fn success(target: ScrapeTarget, strategy: Strategy, counts: ProfileCounts) -> Self {
        Self {
            target,
            counts,
            strategy,
            failure: None,
        }
    }

    pub fn failure(target: ScrapeTarget, strategy: Strategy, reason: FailureReason) -> Self {
        Self {
            target,
            counts: ProfileCounts::default(),
            strategy,
            failure: Some(reason),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

// --- Job state ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Idle,
    Running,
    Stopping,
    Completed,
    Failed,
}

impl JobPhase {
    /// Completed and Failed are resting phases: they stay visible to the
    /// controller but behave like Idle for the next start.
    pub fn accepts_start(self) -> bool {
        matches!(self, Self::Idle | Self::Completed | Self::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, Self::Running | Self::Stopping)
    }
}

/// Marker stored in `current_target` once every target has been processed.
pub const CURRENT_TARGET_DONE: &str = "done";

/// Progress of the single process-wide scrape job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub run_id: Option<Uuid>,
    pub phase: JobPhase,
    pub total: u32,
    pub processed: u32,
    pub success_count: u32,
    pub fail_count: u32,
    pub current_target: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            run_id: None,
            phase: JobPhase::Idle,
            total: 0,
            processed: 0,
            success_count: 0,
            fail_count: 0,
            current_target: None,
            started_at: None,
            last_updated_at: None,
            error: None,
        }
    }
}

impl JobState {
    /// Fresh Running state for a new run. `total` is set once targets are listed.
    pub fn begin(run_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            run_id: Some(run_id),
            phase: JobPhase::Running,
            started_at: Some(now),
            last_updated_at: Some(now),
            ..Self::default()
        }
    }

    /// Count one processed target. Keeps `processed == success_count + fail_count`.
    pub fn record(&mut self, succeeded: bool, now: DateTime<Utc>) {
        if succeeded {
            self.success_count += 1;
        } else {
            self.fail_count += 1;
        }
        self.processed = self.success_count + self.fail_count;
        self.last_updated_at = Some(now);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_updated_at = Some(now);
    }
}

// --- Preview ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRow {
    pub display_name: String,
    pub profile_url: String,
}

/// Read-only view of what the next job would process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPreview {
    pub pending_count: usize,
    pub preview_rows: Vec<PreviewRow>,
}

impl PendingPreview {
    pub fn from_targets(targets: &[ScrapeTarget], limit: usize) -> Self {
        Self {
            pending_count: targets.len(),
            preview_rows: targets
                .iter()
                .take(limit)
                .map(|t| PreviewRow {
                    display_name: t.display_name.clone(),
                    profile_url: t.profile_url.clone(),
                })
                .collect(),
        }
    }
}
