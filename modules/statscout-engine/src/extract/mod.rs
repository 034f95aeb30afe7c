//! Extraction strategies. Each turns a profile URL into counts or a
//! `FailureReason`; the orchestrator tries them in order.

pub mod browserless;
pub mod chromium;
pub mod fetch;
pub mod rendered;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use statscout_common::{FailureReason, ProfileCounts, Strategy};

use crate::counts::parse_count;

pub use fetch::LightweightFetch;
pub use rendered::{RenderBackend, RenderError, RenderedBrowser};

/// Desktop browser user agent sent by both strategies.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    fn strategy(&self) -> Strategy;

    async fn extract(&self, profile_url: &str) -> Result<ProfileCounts, FailureReason>;

    /// Verify the strategy's engine is usable before a job starts.
    /// An error here fails the whole job, not a single target.
    async fn preflight(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

// --- Field patterns ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountField {
    Followers,
    Following,
    Posts,
}

static FOLLOWERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)*[KMB]?)\s*followers?\b").expect("valid regex"));
static FOLLOWING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)*[KMB]?)\s*following\b").expect("valid regex"));
static POSTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)*[KMB]?)\s*posts?\b").expect("valid regex"));

impl CountField {
    pub const ALL: [CountField; 3] = [Self::Followers, Self::Following, Self::Posts];

    /// `<count><unit> <noun>` pattern for this field.
    pub fn pattern(self) -> &'static Regex {
        match self {
            Self::Followers => &FOLLOWERS_RE,
            Self::Following => &FOLLOWING_RE,
            Self::Posts => &POSTS_RE,
        }
    }

    /// First `<count> <noun>` occurrence in `text`, if any.
    pub fn find_in(self, text: &str) -> Option<u64> {
        self.pattern()
            .captures(text)
            .map(|caps| parse_count(&caps[1]))
    }

    pub fn set(self, counts: &mut ProfileCounts, value: u64) {
        match self {
            Self::Followers => counts.followers = value,
            Self::Following => counts.following = value,
            Self::Posts => counts.posts = value,
        }
    }
}

/// Scan free text for all three fields independently. Missing fields read as zero.
pub fn scan_text_counts(text: &str) -> ProfileCounts {
    let mut counts = ProfileCounts::default();
    for field in CountField::ALL {
        if let Some(value) = field.find_in(text) {
            field.set(&mut counts, value);
        }
    }
    counts
}

/// All-zero counts are reported as `NoDataFound`, never as success.
pub fn require_data(counts: ProfileCounts) -> Result<ProfileCounts, FailureReason> {
    if counts.is_empty() {
        Err(FailureReason::NoDataFound)
    } else {
        Ok(counts)
    }
}

// --- Login walls ---

const LOGIN_URL_MARKERS: &[&str] = &["accounts/login", "/login/?next", "/challenge/"];
const LOGIN_BODY_MARKERS: &[&str] = &["Login • Instagram", "<title>Log in", "loginForm"];

/// The source redirected to, or rendered, a sign-in page instead of the profile.
pub fn looks_like_login_wall(final_url: &str, body: &str) -> bool {
    LOGIN_URL_MARKERS.iter().any(|m| final_url.contains(m))
        || LOGIN_BODY_MARKERS.iter().any(|m| body.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_meta_description_style_text() {
        let text = "1,234 Followers, 567 Following, 89 Posts - See Instagram photos and videos";
        let counts = scan_text_counts(text);
        assert_eq!(counts.followers, 1234);
        assert_eq!(counts.following, 567);
        assert_eq!(counts.posts, 89);
    }

    #[test]
    fn fields_are_found_independently_and_unit_aware() {
        let counts = scan_text_counts("12.3K followers and 4 posts");
        assert_eq!(counts.followers, 12_300);
        assert_eq!(counts.following, 0);
        assert_eq!(counts.posts, 4);
    }

    #[test]
    fn following_does_not_satisfy_followers() {
        assert_eq!(CountField::Followers.find_in("300 following"), None);
        assert_eq!(CountField::Following.find_in("300 following"), Some(300));
    }

    #[test]
    fn empty_counts_are_no_data() {
        assert_eq!(
            require_data(ProfileCounts::default()),
            Err(FailureReason::NoDataFound)
        );
    }

    #[test]
    fn login_walls_are_detected_by_url_or_body() {
        assert!(looks_like_login_wall(
            "https://www.instagram.com/accounts/login/?next=/someone/",
            ""
        ));
        assert!(looks_like_login_wall(
            "https://www.instagram.com/someone/",
            "<title>Login • Instagram</title>"
        ));
        assert!(!looks_like_login_wall(
            "https://www.instagram.com/someone/",
            "<title>someone • Instagram photos</title>"
        ));
    }
}
