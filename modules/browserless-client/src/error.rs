use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserlessError>;

#[derive(Debug, Error)]
pub enum BrowserlessError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not reach browser service: {0}")]
    Connect(String),

    #[error("Timed out waiting for page content")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

impl From<reqwest::Error> for BrowserlessError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BrowserlessError::Timeout
        } else if err.is_connect() {
            BrowserlessError::Connect(err.to_string())
        } else {
            BrowserlessError::Network(err.to_string())
        }
    }
}
