//! AIS Recorder - aisstream.io position reports to hourly gzip CSV
//!
//! Subscribes to the worldwide position report feed, fingerprints every
//! report and appends one artifact per hour under `data/<y>/<m>/<d>/<h>.csv.gz`.
//! Runs until the stream closes or an error ends the ingestion run.

use ais_recorder::{
    config::Config,
    recorder::{Ingestor, PartitionedWriter},
    scrapers::AisStreamClient,
};
use anyhow::{Context, Result};
use dotenv::dotenv;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    info!("🚢 AIS recorder starting");

    let config = Config::from_env().context("Invalid configuration")?;
    info!("💾 Writing hourly artifacts under: {}", config.data_dir.display());

    let client = AisStreamClient::new(config.stream_url.clone(), config.api_key.clone());
    let mut session = client
        .connect()
        .await
        .context("Failed to subscribe to AIS stream")?;

    let mut ingestor = Ingestor::new(PartitionedWriter::new(&config.data_dir));
    let summary = ingestor.run(&mut session).await?;

    info!(
        records = summary.records,
        flushes = summary.flushes,
        discarded = summary.discarded,
        "🏁 AIS recorder finished"
    );

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ais_recorder=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate root .env when running with --manifest-path from elsewhere
    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
