use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::Page;
use futures::StreamExt;
use tracing::{debug, info, warn};

use super::rendered::{LandmarkWait, RenderBackend, RenderError, RenderedPage};
use super::BROWSER_USER_AGENT;

/// Upper bound on opening the tab and committing navigation.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(20);
const LANDMARK_POLL: Duration = Duration::from_millis(250);

/// Stylesheets, images and fonts never load; counts come from markup alone.
const BLOCKED_URL_PATTERNS: &[&str] = &[
    "*.css", "*.png", "*.jpg", "*.jpeg", "*.gif", "*.webp", "*.avif", "*.svg", "*.ico", "*.woff",
    "*.woff2", "*.ttf",
];

fn blocked_urls() -> SetBlockedUrLsParams {
    SetBlockedUrLsParams::new(BLOCKED_URL_PATTERNS.iter().map(|p| p.to_string()).collect::<Vec<_>>())
}

/// Local headless Chromium. Every render launches a fresh browser with a
/// throwaway profile directory and always shuts it down afterwards.
pub struct ChromiumBackend {
    chrome_bin: Option<PathBuf>,
}

impl ChromiumBackend {
    pub fn new(chrome_bin: Option<PathBuf>) -> Self {
        match &chrome_bin {
            Some(bin) => info!(chrome_bin = %bin.display(), "Using ChromiumBackend"),
            None => info!(chrome_bin = "auto", "Using ChromiumBackend"),
        }
        Self { chrome_bin }
    }

    fn browser_config(&self, profile_dir: &Path) -> Result<BrowserConfig, String> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile_dir)
            .window_size(1280, 900)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg("--disable-extensions")
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--blink-settings=imagesEnabled=false")
            .arg(format!("--user-agent={BROWSER_USER_AGENT}"));
        if let Some(bin) = &self.chrome_bin {
            builder = builder.chrome_executable(bin);
        }
        builder.build()
    }

    async fn visit(&self, browser: &Browser, url: &str, wait: &LandmarkWait) -> Result<RenderedPage, RenderError> {
        let open = async {
            let page = browser.new_page("about:blank").await?;
            page.execute(EnableParams::default()).await?;
            page.execute(blocked_urls()).await?;
            page.goto(url).await?;
            Ok::<_, chromiumoxide::error::CdpError>(page)
        };
        let page = tokio::time::timeout(NAVIGATION_TIMEOUT, open)
            .await
            .map_err(|_| RenderError::Timeout)?
            .map_err(|e| RenderError::Other(format!("Failed to open page: {e}")))?;

        wait_for_landmark(&page, wait).await?;

        let html = page
            .content()
            .await
            .map_err(|e| RenderError::Other(format!("Failed to get content: {e}")))?;
        let final_url = page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        if let Err(e) = page.close().await {
            debug!(url, error = %e, "Page close error");
        }
        Ok(RenderedPage { final_url, html })
    }
}

async fn wait_for_landmark(page: &Page, wait: &LandmarkWait) -> Result<(), RenderError> {
    let poll = async {
        loop {
            for selector in wait.selectors {
                if page.find_element(*selector).await.is_ok() {
                    return;
                }
            }
            tokio::time::sleep(LANDMARK_POLL).await;
        }
    };
    tokio::time::timeout(wait.timeout, poll)
        .await
        .map_err(|_| RenderError::Timeout)
}

#[async_trait]
impl RenderBackend for ChromiumBackend {
    fn name(&self) -> &str {
        "chromium"
    }

    async fn render(&self, url: &str, wait: &LandmarkWait) -> Result<RenderedPage, RenderError> {
        let profile = tempfile::Builder::new()
            .prefix("statscout-profile-")
            .tempdir()
            .map_err(|e| RenderError::Setup(format!("Failed to create profile dir: {e}")))?;
        let config = self
            .browser_config(profile.path())
            .map_err(|e| RenderError::Setup(format!("Browser config error: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Setup(format!("Browser launch failed: {e}")))?;
        let events = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let result = self.visit(&browser, url, wait).await;

        if let Err(e) = browser.close().await {
            warn!(url, error = %e, "Browser close error");
        }
        if let Err(e) = browser.wait().await {
            debug!(url, error = %e, "Browser process wait error");
        }
        events.abort();
        drop(profile);

        result
    }

    async fn preflight(&self) -> anyhow::Result<()> {
        match &self.chrome_bin {
            Some(bin) if !bin.exists() => bail!("CHROME_BIN {} does not exist", bin.display()),
            _ => {}
        }
        let profile = tempfile::tempdir().context("Failed to create profile dir")?;
        self.browser_config(profile.path())
            .map_err(|e| anyhow::anyhow!("No usable Chromium executable: {e}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn preflight_rejects_missing_explicit_binary() {
        let backend = ChromiumBackend::new(Some(PathBuf::from("/nonexistent/statscout/chrome")));
        let err = backend.preflight().await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn stylesheets_and_images_are_blocked() {
        let urls = blocked_urls().urls;
        assert!(urls.iter().any(|u| u == "*.css"));
        assert!(urls.iter().any(|u| u == "*.png"));
        assert!(urls.iter().any(|u| u == "*.jpg"));
        assert!(urls.iter().all(|u| u.starts_with("*.")));
    }
}
