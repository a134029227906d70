use anyhow::{Context, Result};
use listing_watch::config::Config;
use listing_watch::engine::Worker;
use listing_watch::notify::{LogSink, NotificationSink, PushoverSink};
use listing_watch::scrapers::{HeadlessChromeRenderer, PageRenderer};
use listing_watch::store::{JsonFileStore, SubscriberStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚗 Listing Watch");
    info!("================");

    let config = Config::from_env().context("Invalid configuration")?;
    info!("State file: {}", config.state_path.display());
    info!("Site: {}", config.site_origin);

    let store: Arc<dyn SubscriberStore> = Arc::new(
        JsonFileStore::open(&config.state_path)
            .await
            .with_context(|| format!("Failed to open state at {}", config.state_path.display()))?,
    );

    let sink: Arc<dyn NotificationSink> = if config.notify_dry_run {
        info!("Dry run: notifications are logged, not sent");
        Arc::new(LogSink)
    } else {
        Arc::new(PushoverSink::new(config.pushover_url.clone())?)
    };

    let renderer: Arc<dyn PageRenderer> = Arc::new(HeadlessChromeRenderer::new(&config));
    let worker = Worker::new(&config, renderer, store, sink)?;

    let stop = CancellationToken::new();
    let on_signal = stop.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested, finishing current subscriber...");
                on_signal.cancel();
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    worker.run(stop).await;
    Ok(())
}
