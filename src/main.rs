//! Coinpulse - market-data backend for the crypto dashboard
//!
//! Serves market listings, global stats, trending coins, exchanges, news,
//! sentiment, spot prices and an in-memory portfolio over HTTP. Responses come
//! from a short-lived cache, the upstream providers, a last-known-good archive
//! or compiled-in seed data, in that order.

use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use coinpulse::cache::{KeyValueStore, MemoryStore, RedisStore};
use coinpulse::cli::{Cli, ServiceConfig};
use coinpulse::data::{ResilientFetcher, UpstreamClient};
use coinpulse::portfolio::PortfolioBook;
use coinpulse::server::{self, AppState};

/// Sets up the global tracing subscriber; `RUST_LOG` overrides the default `info`
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Connects to Redis when configured, otherwise (or on failure) keeps data in memory
async fn open_store(redis_url: Option<&str>) -> Arc<dyn KeyValueStore> {
    let Some(url) = redis_url else {
        info!("REDIS_URL not set, using in-memory store");
        return Arc::new(MemoryStore::new());
    };

    match RedisStore::connect(url).await {
        Ok(store) => Arc::new(store),
        Err(e) => {
            warn!(error = %e, "redis unreachable, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Missing .env is fine; the process environment still applies
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = match ServiceConfig::from_cli(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing();

    let store = open_store(config.redis_url.as_deref()).await;
    info!(backend = store.backend(), "store ready");

    let upstream = UpstreamClient::new(config.upstream.clone())?;
    let fetcher = Arc::new(ResilientFetcher::new(
        store,
        Arc::new(upstream),
        config.fetcher.clone(),
    ));

    if config.warm_cache {
        let report = fetcher.prefetch_all().await;
        for (category, source) in report {
            info!(%category, source = source.as_str(), "warmed");
        }
    }

    let state = AppState::new(fetcher, Arc::new(PortfolioBook::new()));
    let router = server::router(state, &config.server)?;

    server::serve(router, config.server.addr).await?;

    Ok(())
}
