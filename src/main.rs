use anyhow::{Context, Result};
use std::sync::Arc;

use wf_market_watcher::api::{MarketClient, RateLimiter, RateLimiterConfig};
use wf_market_watcher::core::{logging, Config};
use wf_market_watcher::notification::NotificationDispatcher;
use wf_market_watcher::scanner::{PollLoop, SeenSet};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref()).context("Failed to load configuration")?;

    // Initialize logging
    logging::init_logging(&config.monitoring.log_level);

    tracing::info!("🚀 warframe.market watcher starting...");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    for item in &config.items {
        tracing::info!("   • {} at or under {}p", item.slug, item.threshold);
    }

    let rate_limiter = Arc::new(RateLimiter::new(RateLimiterConfig::from(&config)));
    let market = MarketClient::new(&config.market, rate_limiter)
        .context("Failed to build marketplace HTTP client")?;
    let dispatcher =
        NotificationDispatcher::from_config(&config).context("Failed to build notifiers")?;

    let seen = match config.monitoring.seen_capacity {
        Some(capacity) => SeenSet::bounded(capacity),
        None => SeenSet::new(),
    };

    let mut poll_loop = PollLoop::new(
        market,
        dispatcher,
        config.items.clone(),
        config.check_interval(),
    )
    .with_seen_set(seen)
    .with_ping_ids(config.ping_discord_ids.clone());

    let stats = poll_loop.run(shutdown_signal()).await;

    tracing::info!(
        "✅ Stopped after {} cycles: {} listings checked, {} notifications sent",
        stats.cycles,
        stats.listings_fetched,
        stats.notifications
    );

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
