// Target repository: where pending targets come from and where counts go.
//
// TargetStore is the seam the orchestrator depends on. SheetsTargetStore is
// the production backend; MemoryStore in `testing` backs the tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use sheets_client::{a1, SheetsClient, TokenSource, ValueRange};
use statscout_common::{Config, RowRef, ScrapeOutcome, ScrapeTarget, StoreAuth};

/// Result columns written per row: followers, following, posts.
pub const RESULT_WIDTH: usize = 3;

#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Rows with a profile URL and an empty followers cell, in store order.
    async fn list_pending_targets(&self) -> Result<Vec<ScrapeTarget>>;

    /// Write every row in one request. Not transactional.
    async fn write_batch(&self, batch: &[(RowRef, ScrapeOutcome)]) -> Result<()>;

    /// Write the result cells of one row.
    async fn write_single(&self, row: RowRef, outcome: &ScrapeOutcome) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Column layout
// ---------------------------------------------------------------------------

/// 0-based column indices of the fields the engine reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLayout {
    pub name: usize,
    pub url: usize,
    /// First of `RESULT_WIDTH` adjacent result columns.
    pub followers: usize,
}

impl ColumnLayout {
    pub fn from_letters(name: &str, url: &str, followers: &str) -> Result<Self> {
        Ok(Self {
            name: a1::column_index(name).context("NAME_COLUMN")?,
            url: a1::column_index(url).context("URL_COLUMN")?,
            followers: a1::column_index(followers).context("FOLLOWERS_COLUMN")?,
        })
    }

    /// Last column any read or write touches.
    pub fn last_column(&self) -> usize {
        self.name.max(self.url).max(self.followers + RESULT_WIDTH - 1)
    }
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            name: 1,
            url: 3,
            followers: 6,
        }
    }
}

/// Select pending rows from a full-sheet read. Index 0 is the header row.
pub fn pending_targets_from(values: &ValueRange, layout: &ColumnLayout) -> Vec<ScrapeTarget> {
    let mut targets = Vec::new();
    for index in 1..values.values.len() {
        let sheet_row = RowRef(index as u32 + 1);
        let profile_url = values.cell_text(index, layout.url).trim().to_string();
        if profile_url.is_empty() {
            continue;
        }
        if !values.cell_text(index, layout.followers).trim().is_empty() {
            continue;
        }
        if !is_web_url(&profile_url) {
            warn!(row = %sheet_row, url = profile_url.as_str(), "Skipping row with malformed profile URL");
            continue;
        }
        targets.push(ScrapeTarget {
            row: sheet_row,
            display_name: values.cell_text(index, layout.name).trim().to_string(),
            profile_url,
        });
    }
    targets
}

fn is_web_url(raw: &str) -> bool {
    match url::Url::parse(raw) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host_str().is_some(),
        Err(_) => false,
    }
}

fn result_cells(outcome: &ScrapeOutcome) -> Vec<Vec<Value>> {
    let c = &outcome.counts;
    vec![vec![c.followers.into(), c.following.into(), c.posts.into()]]
}

// ---------------------------------------------------------------------------
// SheetsTargetStore
// ---------------------------------------------------------------------------

pub struct SheetsTargetStore {
    client: SheetsClient,
    sheet_name: String,
    layout: ColumnLayout,
}

impl SheetsTargetStore {
    pub fn new(client: SheetsClient, sheet_name: impl Into<String>, layout: ColumnLayout) -> Self {
        Self {
            client,
            sheet_name: sheet_name.into(),
            layout,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let tokens = match &config.store_auth {
            StoreAuth::AccessToken(token) => TokenSource::from_static(token.clone()),
            StoreAuth::ServiceAccountFile(path) => TokenSource::from_service_account_file(path)
                .with_context(|| format!("Failed to load service account key {}", path.display()))?,
        };
        let client = SheetsClient::new(&config.spreadsheet_id, tokens)
            .context("Failed to build spreadsheet client")?;
        let layout = ColumnLayout::from_letters(
            &config.name_column,
            &config.url_column,
            &config.followers_column,
        )?;
        Ok(Self::new(client, config.sheet_name.clone(), layout))
    }

    fn table_range(&self) -> String {
        let last = a1::column_letter(self.layout.last_column());
        a1::qualified(&self.sheet_name, &format!("A1:{last}"))
    }

    fn result_range(&self, row: RowRef) -> String {
        a1::qualified(
            &self.sheet_name,
            &a1::row_span(self.layout.followers, RESULT_WIDTH, row.0),
        )
    }
}

#[async_trait]
impl TargetStore for SheetsTargetStore {
    async fn list_pending_targets(&self) -> Result<Vec<ScrapeTarget>> {
        let range = self.table_range();
        let values = self
            .client
            .get_values(&range)
            .await
            .with_context(|| format!("Failed to read {range}"))?;
        let targets = pending_targets_from(&values, &self.layout);
        info!(
            rows = values.values.len().saturating_sub(1),
            pending = targets.len(),
            "Listed pending targets"
        );
        Ok(targets)
    }

    async fn write_batch(&self, batch: &[(RowRef, ScrapeOutcome)]) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let data: Vec<ValueRange> = batch
            .iter()
            .map(|(row, outcome)| ValueRange::new(self.result_range(*row), result_cells(outcome)))
            .collect();
        let resp = self
            .client
            .batch_update_values(&data)
            .await
            .with_context(|| format!("Batch write of {} rows failed", batch.len()))?;
        debug!(rows = batch.len(), updated_cells = resp.total_updated_cells, "Batch written");
        Ok(())
    }

    async fn write_single(&self, row: RowRef, outcome: &ScrapeOutcome) -> Result<()> {
        let range = self.result_range(row);
        self.client
            .update_values(&range, result_cells(outcome))
            .await
            .with_context(|| format!("Write of row {row} failed"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet(rows: Value) -> ValueRange {
        serde_json::from_value(json!({ "range": "'Sheet1'!A1:I10", "values": rows })).unwrap()
    }

    #[test]
    fn pending_rows_need_url_and_empty_followers() {
        let values = sheet(json!([
            ["#", "Name", "Handle", "Profile", "", "", "Followers", "Following", "Posts"],
            ["1", "Ada", "", "https://www.instagram.com/ada/"],
            ["2", "Bo", "", "https://www.instagram.com/bo/", "", "", "1200", "3", "4"],
            ["3", "Cy", "", ""],
            ["4", "Di", "", "  https://www.instagram.com/di/  ", "", "", ""]
        ]));
        let targets = pending_targets_from(&values, &ColumnLayout::default());
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].row, RowRef(2));
        assert_eq!(targets[0].display_name, "Ada");
        assert_eq!(targets[1].row, RowRef(5));
        assert_eq!(targets[1].profile_url, "https://www.instagram.com/di/");
    }

    #[test]
    fn malformed_urls_never_become_targets() {
        let values = sheet(json!([
            ["header"],
            ["1", "Ada", "", "instagram.com/ada"],
            ["2", "Bo", "", "ftp://example.com/bo"],
            ["3", "Cy", "", "@cy"]
        ]));
        assert!(pending_targets_from(&values, &ColumnLayout::default()).is_empty());
    }

    #[test]
    fn header_only_sheet_has_no_targets() {
        let values = sheet(json!([["Name", "Profile"]]));
        assert!(pending_targets_from(&values, &ColumnLayout::default()).is_empty());
    }

    #[test]
    fn layout_covers_result_columns() {
        let layout = ColumnLayout::from_letters("B", "D", "G").unwrap();
        assert_eq!(layout, ColumnLayout::default());
        assert_eq!(a1::column_letter(layout.last_column()), "I");
        assert!(ColumnLayout::from_letters("B", "4", "G").is_err());
    }

    #[test]
    fn ranges_are_sheet_qualified() {
        let store = SheetsTargetStore::new(
            SheetsClient::new("id", TokenSource::from_static("t")).unwrap(),
            "Influencers",
            ColumnLayout::default(),
        );
        assert_eq!(store.table_range(), "'Influencers'!A1:I");
        assert_eq!(store.result_range(RowRef(7)), "'Influencers'!G7:I7");
    }
}
