use std::time::Duration;

use async_trait::async_trait;
use browserless_client::{BrowserlessClient, BrowserlessError, ContentRequest};
use tracing::info;

use super::rendered::{LandmarkWait, RenderBackend, RenderError, RenderedPage};

const REJECTED_RESOURCES: &[&str] = &["image", "stylesheet", "font", "media"];
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(20);

/// Remote rendering through a Browserless `/content` endpoint. Each request
/// is its own isolated browser session on the service side.
pub struct BrowserlessBackend {
    client: BrowserlessClient,
}

impl BrowserlessBackend {
    pub fn new(client: BrowserlessClient) -> Self {
        info!("Using BrowserlessBackend");
        Self { client }
    }
}

pub(crate) fn content_request(url: &str, wait: &LandmarkWait) -> ContentRequest {
    ContentRequest::new(url)
        .wait_for(&wait.selectors.join(", "), wait.timeout)
        .reject(REJECTED_RESOURCES)
        .navigation_timeout(NAVIGATION_TIMEOUT)
}

fn render_error(err: BrowserlessError) -> RenderError {
    match err {
        BrowserlessError::Timeout => RenderError::Timeout,
        BrowserlessError::Connect(msg) => RenderError::Setup(msg),
        BrowserlessError::Api { status, .. } => RenderError::Http(status),
        BrowserlessError::Network(msg) => RenderError::Other(msg),
    }
}

#[async_trait]
impl RenderBackend for BrowserlessBackend {
    fn name(&self) -> &str {
        "browserless"
    }

    async fn render(&self, url: &str, wait: &LandmarkWait) -> Result<RenderedPage, RenderError> {
        let html = self
            .client
            .render(&content_request(url, wait))
            .await
            .map_err(render_error)?;
        // The service does not report redirects; login walls are caught by body markers.
        Ok(RenderedPage {
            final_url: url.to_string(),
            html,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::rendered::CONTENT_LANDMARKS;

    #[test]
    fn request_waits_for_landmarks_and_skips_heavy_resources() {
        let wait = LandmarkWait {
            selectors: CONTENT_LANDMARKS,
            timeout: Duration::from_secs(10),
        };
        let req = content_request("https://www.instagram.com/someone/", &wait);
        let selector = req.wait_for_selector.as_ref().unwrap();
        assert_eq!(selector.selector, "main, article");
        assert_eq!(selector.timeout, 10_000);
        assert!(req.reject_resource_types.iter().any(|t| t == "image"));
    }

    #[test]
    fn connection_failures_are_setup_errors() {
        assert!(matches!(
            render_error(BrowserlessError::Connect("refused".into())),
            RenderError::Setup(_)
        ));
        assert!(matches!(render_error(BrowserlessError::Timeout), RenderError::Timeout));
        assert!(matches!(
            render_error(BrowserlessError::Api { status: 429, message: String::new() }),
            RenderError::Http(429)
        ));
    }
}
