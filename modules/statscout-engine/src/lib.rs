pub mod batch;
pub mod counts;
pub mod extract;
pub mod orchestrator;
pub mod run_log;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use orchestrator::{Orchestrator, OrchestratorDeps};
pub use store::{SheetsTargetStore, TargetStore};

use std::sync::Arc;

use anyhow::{Context, Result};
use browserless_client::BrowserlessClient;
use statscout_common::{BrowserBackendConfig, Config};

use extract::browserless::BrowserlessBackend;
use extract::chromium::ChromiumBackend;
use extract::{LightweightFetch, RenderBackend, RenderedBrowser};

/// Wire the production store and strategies from configuration.
pub fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let store = SheetsTargetStore::from_config(config)?;
    let fetch = LightweightFetch::new(config.fetch_timeout)?;

    let backend: Box<dyn RenderBackend> = match &config.browser {
        BrowserBackendConfig::Chromium { chrome_bin } => {
            Box::new(ChromiumBackend::new(chrome_bin.clone()))
        }
        BrowserBackendConfig::Browserless { base_url, token } => {
            let client = BrowserlessClient::new(base_url, token.as_deref())
                .context("Failed to build Browserless client")?;
            Box::new(BrowserlessBackend::new(client))
        }
    };
    let rendered = RenderedBrowser::new(backend, config.browser_timeout);

    let deps = OrchestratorDeps::builder()
        .store(Arc::new(store) as Arc<dyn TargetStore>)
        .fetch(Arc::new(fetch) as Arc<dyn extract::ProfileExtractor>)
        .rendered(Arc::new(rendered) as Arc<dyn extract::ProfileExtractor>)
        .batch_size(config.write_batch_size)
        .fetch_delay(config.fetch_delay)
        .browser_delay(config.browser_delay)
        .data_dir(config.data_dir.clone())
        .build();
    Ok(Orchestrator::new(deps))
}
