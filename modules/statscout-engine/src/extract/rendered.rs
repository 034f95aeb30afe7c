//! Rendered-browser fallback strategy.
//!
//! A `RenderBackend` loads the page in a real browser and waits for a generic
//! content landmark. The rendered HTML is then scanned with an ordered list of
//! selector probes per field; the first well-formed, in-range number wins.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, info, warn};

use statscout_common::{FailureReason, ProfileCounts, Strategy};

use super::{looks_like_login_wall, require_data, CountField, ProfileExtractor};
use crate::counts::parse_count;

/// Landmarks that mean "the app shell rendered". Deliberately generic.
pub const CONTENT_LANDMARKS: &[&str] = &["main", "article"];

/// Largest count accepted from a probe.
const MAX_SANE_COUNT: u64 = 10_000_000_000;

#[derive(Debug, Clone)]
pub struct LandmarkWait {
    pub selectors: &'static [&'static str],
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub final_url: String,
    pub html: String,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("browser session could not be created: {0}")]
    Setup(String),

    #[error("no content landmark appeared in time")]
    Timeout,

    #[error("render service returned status {0}")]
    Http(u16),

    #[error("render failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait RenderBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Load `url` in a fresh, isolated session and return the rendered DOM once
    /// a landmark appears. The session must be torn down before returning.
    async fn render(&self, url: &str, wait: &LandmarkWait) -> Result<RenderedPage, RenderError>;

    async fn preflight(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct RenderedBrowser {
    backend: Box<dyn RenderBackend>,
    wait: LandmarkWait,
}

impl RenderedBrowser {
    pub fn new(backend: Box<dyn RenderBackend>, landmark_timeout: Duration) -> Self {
        info!(
            backend = backend.name(),
            landmark_timeout_secs = landmark_timeout.as_secs(),
            "Using RenderedBrowser"
        );
        Self {
            backend,
            wait: LandmarkWait {
                selectors: CONTENT_LANDMARKS,
                timeout: landmark_timeout,
            },
        }
    }
}

#[async_trait]
impl ProfileExtractor for RenderedBrowser {
    fn strategy(&self) -> Strategy {
        Strategy::Browser
    }

    async fn extract(&self, profile_url: &str) -> Result<ProfileCounts, FailureReason> {
        debug!(url = profile_url, scraper = self.backend.name(), "Rendering profile");

        let page = self
            .backend
            .render(profile_url, &self.wait)
            .await
            .map_err(|e| match e {
                RenderError::Setup(msg) => {
                    warn!(url = profile_url, error = msg.as_str(), "Browser setup failed");
                    FailureReason::SetupError(msg)
                }
                RenderError::Timeout => FailureReason::Timeout,
                RenderError::Http(status) => FailureReason::HttpError(status),
                RenderError::Other(msg) => FailureReason::Network(msg),
            })?;

        if looks_like_login_wall(&page.final_url, &page.html) {
            return Err(FailureReason::LoginRequired);
        }
        require_data(scan_rendered(&page.html))
    }

    async fn preflight(&self) -> anyhow::Result<()> {
        self.backend.preflight().await
    }
}

// --- Selector probes ---

/// One place a count might live in the rendered DOM.
#[derive(Debug, Clone, Copy)]
enum Probe {
    /// Element text is the bare number.
    Text(&'static str),
    /// Attribute value is the bare number.
    Attr(&'static str, &'static str),
    /// Element text contains `<count> <noun>` for the field.
    LabeledText(&'static str),
    /// Attribute contains `<count> <noun>` for the field.
    LabeledAttr(&'static str, &'static str),
}

const OG_DESCRIPTION: &str = r#"meta[property="og:description"]"#;
const META_DESCRIPTION: &str = r#"meta[name="description"]"#;

const FOLLOWER_PROBES: &[Probe] = &[
    Probe::Attr(r#"a[href*="/followers/"] span[title]"#, "title"),
    Probe::Text(r#"a[href*="/followers/"] span"#),
    Probe::LabeledAttr(OG_DESCRIPTION, "content"),
    Probe::LabeledAttr(META_DESCRIPTION, "content"),
    Probe::LabeledText("header section ul li"),
    Probe::LabeledText("ul li"),
];

const FOLLOWING_PROBES: &[Probe] = &[
    Probe::Text(r#"a[href*="/following/"] span"#),
    Probe::LabeledAttr(OG_DESCRIPTION, "content"),
    Probe::LabeledAttr(META_DESCRIPTION, "content"),
    Probe::LabeledText("header section ul li"),
    Probe::LabeledText("ul li"),
];

const POST_PROBES: &[Probe] = &[
    Probe::LabeledAttr(OG_DESCRIPTION, "content"),
    Probe::LabeledAttr(META_DESCRIPTION, "content"),
    Probe::LabeledText("header section ul li"),
    Probe::LabeledText("ul li"),
    Probe::Text("header section ul li:first-child span"),
];

fn probes_for(field: CountField) -> &'static [Probe] {
    match field {
        CountField::Followers => FOLLOWER_PROBES,
        CountField::Following => FOLLOWING_PROBES,
        CountField::Posts => POST_PROBES,
    }
}

/// Scan rendered HTML for the three counts. Missing fields read as zero.
pub fn scan_rendered(html: &str) -> ProfileCounts {
    let document = Html::parse_document(html);
    let mut counts = ProfileCounts::default();
    for field in CountField::ALL {
        if let Some(value) = probes_for(field)
            .iter()
            .find_map(|probe| run_probe(&document, *probe, field))
        {
            field.set(&mut counts, value);
        }
    }
    counts
}

fn run_probe(document: &Html, probe: Probe, field: CountField) -> Option<u64> {
    let selector_src = match probe {
        Probe::Text(s) | Probe::Attr(s, _) | Probe::LabeledText(s) | Probe::LabeledAttr(s, _) => s,
    };
    let selector = match Selector::parse(selector_src) {
        Ok(selector) => selector,
        Err(e) => {
            warn!(selector = selector_src, error = %e, "Invalid probe selector");
            return None;
        }
    };

    document.select(&selector).find_map(|el| match probe {
        Probe::Text(_) => bare_number(&element_text(&el)),
        Probe::Attr(_, attr) => el.value().attr(attr).and_then(bare_number),
        Probe::LabeledText(_) => field.find_in(&element_text(&el)).filter(|v| in_range(*v)),
        Probe::LabeledAttr(_, attr) => el
            .value()
            .attr(attr)
            .and_then(|text| field.find_in(text))
            .filter(|v| in_range(*v)),
    })
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ")
}

/// Accept only a lone count token ("1,204", "12.3K") within range.
fn bare_number(text: &str) -> Option<u64> {
    let token = text.trim();
    let well_formed = !token.is_empty()
        && token.starts_with(|c: char| c.is_ascii_digit())
        && token.chars().enumerate().all(|(i, c)| {
            c.is_ascii_digit()
                || c == ','
                || c == '.'
                || (i == token.len() - 1 && matches!(c.to_ascii_uppercase(), 'K' | 'M' | 'B'))
        });
    if !well_formed {
        return None;
    }
    Some(parse_count(token)).filter(|v| in_range(*v))
}

fn in_range(value: u64) -> bool {
    value <= MAX_SANE_COUNT
}
