use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

/// How the spreadsheet client authenticates.
#[derive(Debug, Clone)]
pub enum StoreAuth {
    /// Path to a service-account JSON key; tokens are minted on demand.
    ServiceAccountFile(PathBuf),
    /// Pre-minted bearer token, used as-is.
    AccessToken(String),
}

/// Which engine renders pages for the fallback strategy.
#[derive(Debug, Clone)]
pub enum BrowserBackendConfig {
    /// Local headless Chromium. `None` auto-detects the executable.
    Chromium { chrome_bin: Option<PathBuf> },
    /// Remote Browserless-compatible `/content` service.
    Browserless { base_url: String, token: Option<String> },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Target store
    pub spreadsheet_id: String,
    pub sheet_name: String,
    pub store_auth: StoreAuth,
    pub name_column: String,
    pub url_column: String,
    pub followers_column: String,

    // Scraping
    pub write_batch_size: usize,
    pub fetch_delay: Duration,
    pub browser_delay: Duration,
    pub fetch_timeout: Duration,
    pub browser_timeout: Duration,
    pub browser: BrowserBackendConfig,

    // Run logs
    pub data_dir: PathBuf,

    // Control server
    pub api_host: String,
    pub api_port: u16,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing or malformed.
    pub fn from_env() -> Self {
        let store_auth = match (
            env::var("GOOGLE_ACCESS_TOKEN").ok().filter(|v| !v.is_empty()),
            env::var("GOOGLE_SERVICE_ACCOUNT_FILE").ok().filter(|v| !v.is_empty()),
        ) {
            (Some(token), _) => StoreAuth::AccessToken(token),
            (None, Some(path)) => StoreAuth::ServiceAccountFile(PathBuf::from(path)),
            (None, None) => panic!(
                "GOOGLE_SERVICE_ACCOUNT_FILE or GOOGLE_ACCESS_TOKEN environment variable is required"
            ),
        };

        let browser = match env::var("BROWSERLESS_URL").ok().filter(|v| !v.is_empty()) {
            Some(base_url) => BrowserBackendConfig::Browserless {
                base_url,
                token: env::var("BROWSERLESS_TOKEN").ok().filter(|v| !v.is_empty()),
            },
            None => BrowserBackendConfig::Chromium {
                chrome_bin: env::var("CHROME_BIN").ok().filter(|v| !v.is_empty()).map(PathBuf::from),
            },
        };

        Self {
            spreadsheet_id: required_env("SPREADSHEET_ID"),
            sheet_name: env_or("SHEET_NAME", "Sheet1"),
            store_auth,
            name_column: column_env("NAME_COLUMN", "B"),
            url_column: column_env("URL_COLUMN", "D"),
            followers_column: column_env("FOLLOWERS_COLUMN", "G"),
            write_batch_size: parsed_env("WRITE_BATCH_SIZE", 5usize).max(1),
            fetch_delay: Duration::from_millis(parsed_env("FETCH_DELAY_MS", 500)),
            browser_delay: Duration::from_millis(parsed_env("BROWSER_DELAY_MS", 2000)),
            fetch_timeout: Duration::from_secs(parsed_env("FETCH_TIMEOUT_SECS", 10)),
            browser_timeout: Duration::from_secs(parsed_env("BROWSER_TIMEOUT_SECS", 10)),
            browser,
            data_dir: PathBuf::from(env_or("DATA_DIR", "data")),
            api_host: env_or("API_HOST", "0.0.0.0"),
            api_port: parsed_env("API_PORT", 5555),
        }
    }

    /// Log every setting with credentials masked.
    pub fn log_redacted(&self) {
        let auth = match &self.store_auth {
            StoreAuth::ServiceAccountFile(path) => format!("service_account({})", path.display()),
            StoreAuth::AccessToken(token) => format!("access_token({})", redact(token)),
        };
        let browser = match &self.browser {
            BrowserBackendConfig::Chromium { chrome_bin } => format!(
                "chromium({})",
                chrome_bin
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "auto".to_string())
            ),
            BrowserBackendConfig::Browserless { base_url, token } => format!(
                "browserless({base_url}, token={})",
                token.as_deref().map(redact).unwrap_or_else(|| "none".to_string())
            ),
        };
        info!(
            spreadsheet_id = self.spreadsheet_id.as_str(),
            sheet = self.sheet_name.as_str(),
            auth = auth.as_str(),
            name_column = self.name_column.as_str(),
            url_column = self.url_column.as_str(),
            followers_column = self.followers_column.as_str(),
            batch_size = self.write_batch_size,
            fetch_delay_ms = self.fetch_delay.as_millis() as u64,
            browser_delay_ms = self.browser_delay.as_millis() as u64,
            fetch_timeout_secs = self.fetch_timeout.as_secs(),
            browser_timeout_secs = self.browser_timeout.as_secs(),
            browser = browser.as_str(),
            data_dir = %self.data_dir.display(),
            "Loaded configuration"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number, got {raw:?}")),
        Err(_) => default,
    }
}

fn column_env(key: &str, default: &str) -> String {
    let value = env_or(key, default).trim().to_ascii_uppercase();
    if !is_column_letter(&value) {
        panic!("{key} must be a column letter like \"G\", got {value:?}");
    }
    value
}

fn is_column_letter(value: &str) -> bool {
    !value.is_empty() && value.len() <= 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

fn redact(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{visible}***")
}
