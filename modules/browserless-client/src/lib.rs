pub mod error;

pub use error::{BrowserlessError, Result};

use std::time::Duration;

use serde::Serialize;

pub struct BrowserlessClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

/// Options for a `/content` render.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRequest {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wait_for_selector: Option<WaitForSelector>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reject_resource_types: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goto_options: Option<GotoOptions>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WaitForSelector {
    pub selector: String,
    /// Milliseconds.
    pub timeout: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GotoOptions {
    pub wait_until: String,
    /// Milliseconds.
    pub timeout: u64,
}

impl ContentRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            wait_for_selector: None,
            reject_resource_types: Vec::new(),
            goto_options: None,
        }
    }

    /// Fail with a timeout unless `selector` appears within `timeout`.
    pub fn wait_for(mut self, selector: &str, timeout: Duration) -> Self {
        self.wait_for_selector = Some(WaitForSelector {
            selector: selector.to_string(),
            timeout: timeout.as_millis() as u64,
        });
        self
    }

    /// Skip loading these resource types (`image`, `stylesheet`, `font`, ...).
    pub fn reject(mut self, types: &[&str]) -> Self {
        self.reject_resource_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.goto_options = Some(GotoOptions {
            wait_until: "domcontentloaded".to_string(),
            timeout: timeout.as_millis() as u64,
        });
        self
    }
}

impl BrowserlessClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    /// Render with explicit wait and resource options.
    pub async fn render(&self, request: &ContentRequest) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint("content"))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            if status.as_u16() == 408 || message.contains("TimeoutError") {
                tracing::debug!(url = request.url.as_str(), "Browserless render timed out");
                return Err(BrowserlessError::Timeout);
            }
            return Err(BrowserlessError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(resp.text().await?)
    }

    fn endpoint(&self, path: &str) -> String {
        let mut endpoint = format!("{}/{path}", self.base_url);
        if let Some(ref token) = self.token {
            endpoint.push_str(&format!("?token={token}"));
        }
        endpoint
    }
}
