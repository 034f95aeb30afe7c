use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatScoutError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Job conflict: a scrape job is already running")]
    AlreadyRunning,
}
