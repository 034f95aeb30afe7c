use anyhow::{bail, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use statscout_common::{Config, JobPhase};
use statscout_engine::build_orchestrator;
use statscout_engine::orchestrator::PREVIEW_ROWS;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Scrape follower counts for every pending row, in the foreground")]
struct Cli {
    /// Only scrape targets with this display name (repeatable)
    #[arg(long = "only", value_name = "NAME")]
    only: Vec<String>,

    /// Print the pending count and first rows, then exit
    #[arg(long)]
    preview: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("statscout=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env();
    config.log_redacted();

    let orchestrator = build_orchestrator(&config)?;

    if cli.preview {
        let preview = orchestrator.preview(PREVIEW_ROWS).await?;
        println!("{} pending rows", preview.pending_count);
        for row in &preview.preview_rows {
            println!("  {} ({})", row.display_name, row.profile_url);
        }
        return Ok(());
    }

    let filter = (!cli.only.is_empty()).then_some(cli.only);
    let job = orchestrator.start(filter).await?;

    let stopper = orchestrator.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, stopping after the current target");
            stopper.stop().await;
        }
    });

    job.await?;

    let state = orchestrator.status().await;
    info!(
        phase = ?state.phase,
        processed = state.processed,
        total = state.total,
        "Scout finished"
    );
    if state.phase == JobPhase::Failed {
        bail!(
            "scrape job failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
