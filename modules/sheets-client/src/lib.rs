pub mod a1;
pub mod auth;
pub mod error;
pub mod types;

pub use auth::TokenSource;
pub use error::{Result, SheetsError};
pub use types::{
    AppendValuesResponse, BatchUpdateValuesResponse, ServiceAccountKey, UpdateValuesResponse,
    ValueRange,
};

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;
use types::BatchUpdateValuesRequest;

const BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Values written exactly as given, never parsed as formulas or dates.
const RAW_INPUT: &str = "RAW";

pub struct SheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    tokens: TokenSource,
}

impl SheetsClient {
    pub fn new(spreadsheet_id: &str, tokens: TokenSource) -> Result<Self> {
        Self::with_base_url(BASE_URL, spreadsheet_id, tokens)
    }

    /// Point the client at an alternative API root (emulators, proxies).
    pub fn with_base_url(base_url: &str, spreadsheet_id: &str, tokens: TokenSource) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            tokens,
        })
    }

    /// Read all cells in `range` (A1 notation, sheet-qualified).
    pub async fn get_values(&self, range: &str) -> Result<ValueRange> {
        let url = self.values_url(range, None)?;
        let token = self.tokens.token(&self.client).await?;
        let resp = self.client.get(url).bearer_auth(token).send().await?;
        read_json(resp).await
    }

    /// Write several ranges in one request.
    pub async fn batch_update_values(&self, data: &[ValueRange]) -> Result<BatchUpdateValuesResponse> {
        let url = self.values_url("", Some(":batchUpdate"))?;
        let body = BatchUpdateValuesRequest {
            value_input_option: RAW_INPUT,
            data,
        };
        tracing::debug!(ranges = data.len(), "Sheets batch update");

        let token = self.tokens.token(&self.client).await?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Overwrite a single range.
    pub async fn update_values(
        &self,
        range: &str,
        values: Vec<Vec<serde_json::Value>>,
    ) -> Result<UpdateValuesResponse> {
        let mut url = self.values_url(range, None)?;
        url.query_pairs_mut().append_pair("valueInputOption", RAW_INPUT);
        let body = ValueRange::new(range, values);

        let token = self.tokens.token(&self.client).await?;
        let resp = self
            .client
            .put(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        read_json(resp).await
    }

    /// Append rows after the last non-empty row of the table at `range`.
    pub async fn append_values(
        &self,
        range: &str,
        values: Vec<Vec<serde_json::Value>>,
    ) -> Result<AppendValuesResponse> {
        let mut url = self.values_url(range, Some(":append"))?;
        url.query_pairs_mut().append_pair("valueInputOption", RAW_INPUT);
        let body = ValueRange::new(range, values);

        let token = self.tokens.token(&self.client).await?;
        let resp = self
            .client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        read_json(resp).await
    }

    /// `{base}/{id}/values/{range}{suffix}` with the range percent-encoded.
    /// An empty range yields `{base}/{id}/values{suffix}` for collection calls.
    fn values_url(&self, range: &str, suffix: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| SheetsError::Range(format!("bad base url {}: {e}", self.base_url)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| SheetsError::Range(format!("base url cannot be a base: {}", self.base_url)))?;
            segments.push(&self.spreadsheet_id);
            if range.is_empty() {
                segments.push(&format!("values{}", suffix.unwrap_or_default()));
            } else {
                segments.push("values");
                segments.push(&format!("{range}{}", suffix.unwrap_or_default()));
            }
        }
        Ok(url)
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        });
    }
    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SheetsClient {
        SheetsClient::new("sheet-123", TokenSource::from_static("t")).unwrap()
    }

    #[test]
    fn range_urls_are_percent_encoded() {
        let url = client().values_url("'Sheet 1'!A1:P", None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values/'Sheet%201'!A1:P"
        );
    }

    #[test]
    fn collection_calls_put_the_suffix_on_values() {
        let url = client().values_url("", Some(":batchUpdate")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.googleapis.com/v4/spreadsheets/sheet-123/values:batchUpdate"
        );
    }

    #[test]
    fn append_suffix_follows_the_range() {
        let url = client().values_url("'Sheet1'!A1", Some(":append")).unwrap();
        assert!(url.as_str().ends_with("/values/'Sheet1'!A1:append"));
    }

    #[test]
    fn value_range_reads_missing_cells_as_empty() {
        let vr: ValueRange = serde_json::from_str(
            r#"{"range":"'Sheet1'!A1:I3","majorDimension":"ROWS","values":[["h1","h2"],["a","b","c"]]}"#,
        )
        .unwrap();
        assert_eq!(vr.cell_text(1, 2), "c");
        assert_eq!(vr.cell_text(0, 5), "");
        assert_eq!(vr.cell_text(9, 0), "");
    }

    #[test]
    fn batch_request_uses_raw_input() {
        let data = vec![ValueRange::new("'Sheet1'!G2:I2", vec![vec![1.into(), 2.into(), 3.into()]])];
        let body = serde_json::to_value(BatchUpdateValuesRequest {
            value_input_option: RAW_INPUT,
            data: &data,
        })
        .unwrap();
        assert_eq!(body["valueInputOption"], "RAW");
        assert_eq!(body["data"][0]["range"], "'Sheet1'!G2:I2");
        assert_eq!(body["data"][0]["values"][0][2], 3);
    }
}
