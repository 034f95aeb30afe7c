use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tracing::{debug, info, warn};

use statscout_common::{FailureReason, ProfileCounts, Strategy};

use super::{looks_like_login_wall, require_data, scan_text_counts, ProfileExtractor, BROWSER_USER_AGENT};

/// Cheap first strategy: one GET with browser-like headers, then a regex
/// scan of the returned markup.
pub struct LightweightFetch {
    client: reqwest::Client,
}

impl LightweightFetch {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .default_headers(browser_headers())
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        info!(timeout_secs = timeout.as_secs(), "Using LightweightFetch");
        Ok(Self { client })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8"),
    );
    headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.5"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers.insert(header::UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));
    headers.insert("sec-fetch-dest", HeaderValue::from_static("document"));
    headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
    headers.insert("sec-fetch-site", HeaderValue::from_static("none"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("max-age=0"));
    headers
}

/// Decide the outcome of a fetched page. Checks, in order: status,
/// login redirect, then the three count patterns.
pub fn classify_response(
    status: u16,
    final_url: &str,
    body: &str,
) -> Result<ProfileCounts, FailureReason> {
    if status != 200 {
        return Err(FailureReason::HttpError(status));
    }
    if looks_like_login_wall(final_url, body) {
        return Err(FailureReason::LoginRequired);
    }
    require_data(scan_text_counts(body))
}

#[async_trait]
impl ProfileExtractor for LightweightFetch {
    fn strategy(&self) -> Strategy {
        Strategy::Fetch
    }

    async fn extract(&self, profile_url: &str) -> Result<ProfileCounts, FailureReason> {
        debug!(url = profile_url, scraper = "fetch", "Fetching profile");

        let resp = match self.client.get(profile_url).send().await {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => return Err(FailureReason::Timeout),
            Err(e) => {
                warn!(url = profile_url, scraper = "fetch", error = %e, "Request failed");
                return Err(FailureReason::Network(e.to_string()));
            }
        };

        let status = resp.status().as_u16();
        let final_url = resp.url().to_string();
        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Err(FailureReason::Timeout),
            Err(e) => return Err(FailureReason::Network(e.to_string())),
        };

        let result = classify_response(status, &final_url, &body);
        if let Err(ref reason) = result {
            debug!(url = profile_url, scraper = "fetch", %reason, "Fetch did not yield counts");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROFILE_HTML: &str = r#"<html><head>
        <meta property="og:description" content="12.3K Followers, 410 Following, 1,024 Posts - See Instagram photos and videos from Someone (@someone)">
        </head><body></body></html>"#;

    #[test]
    fn non_200_is_http_error_even_with_counts_in_body() {
        assert_eq!(
            classify_response(429, "https://www.instagram.com/someone/", PROFILE_HTML),
            Err(FailureReason::HttpError(429))
        );
    }

    #[test]
    fn login_redirect_beats_pattern_scan() {
        assert_eq!(
            classify_response(
                200,
                "https://www.instagram.com/accounts/login/?next=%2Fsomeone%2F",
                PROFILE_HTML
            ),
            Err(FailureReason::LoginRequired)
        );
    }

    #[test]
    fn counts_are_read_from_markup() {
        let counts =
            classify_response(200, "https://www.instagram.com/someone/", PROFILE_HTML).unwrap();
        assert_eq!(counts.followers, 12_300);
        assert_eq!(counts.following, 410);
        assert_eq!(counts.posts, 1024);
    }

    #[test]
    fn boilerplate_without_counts_is_no_data() {
        assert_eq!(
            classify_response(200, "https://www.instagram.com/someone/", "<html>Page not found</html>"),
            Err(FailureReason::NoDataFound)
        );
    }

    #[test]
    fn explicit_zero_profile_is_still_no_data() {
        let body = "0 Followers, 0 Following, 0 Posts";
        assert_eq!(
            classify_response(200, "https://www.instagram.com/empty/", body),
            Err(FailureReason::NoDataFound)
        );
    }

    #[test]
    fn headers_look_like_a_browser() {
        let headers = browser_headers();
        assert!(headers.get(header::ACCEPT).is_some());
        assert_eq!(headers.get("sec-fetch-mode").unwrap(), "navigate");
    }
}
