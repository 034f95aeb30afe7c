pub mod config;
pub mod error;
pub mod types;

pub use config::{BrowserBackendConfig, Config, StoreAuth};
pub use error::StatScoutError;
pub use types::*;
