//! Resilient fetch pipeline
//!
//! Every category goes through the same four steps:
//!
//! 1. fresh cache entry → return it (and copy it into the archive)
//! 2. one upstream call → on success write cache and archive, return
//! 3. upstream rate limited or failed → last archived payload
//! 4. nothing archived → compiled-in default, or for prices an estimate
//!
//! Nothing here returns an error for a data problem. The worst case is stale
//! or seed data, and for prices the sentinel `0.0`.

use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::category::{Category, CategoryError, CoinId};
use super::single_flight::{FlightGuard, SingleFlight};
use super::upstream::{MarketSource, Outcome, UpstreamError};
use super::{defaults, normalize};
use super::{Exchange, GlobalStats, MarketCoin, MarketSentiment, NewsItem, TrendingCoin};
use crate::cache::{CacheManager, FallbackArchive, KeyValueStore};

/// Default freshness window for cached payloads
pub const DEFAULT_TTL_SECS: u64 = 600;

/// Which step of the pipeline produced a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Cache,
    Upstream,
    Archive,
    Default,
    /// Price derived from archived listing and global snapshots
    Estimate,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Cache => "cache",
            DataSource::Upstream => "upstream",
            DataSource::Archive => "archive",
            DataSource::Default => "default",
            DataSource::Estimate => "estimate",
        }
    }
}

/// A payload and the step that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub data: T,
    pub source: DataSource,
}

impl<T> Sourced<T> {
    fn new(data: T, source: DataSource) -> Self {
        Self { data, source }
    }

    fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Sourced<U>, E> {
        Ok(Sourced {
            data: f(self.data)?,
            source: self.source,
        })
    }
}

/// Errors the fetcher can return
///
/// Only input validation and re-encoding can fail; data problems never do.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The requested category or coin id is invalid
    #[error(transparent)]
    InvalidCategory(#[from] CategoryError),

    /// A payload could not be re-encoded as JSON
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Fetcher tuning
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// Cache TTL applied by the typed accessors
    pub ttl_secs: u64,
    /// Collapse concurrent misses for the same category into one upstream call
    pub single_flight: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            ttl_secs: DEFAULT_TTL_SECS,
            single_flight: true,
        }
    }
}

/// Cache → upstream → archive → default, shared by every category
pub struct ResilientFetcher {
    cache: CacheManager,
    archive: FallbackArchive,
    upstream: Arc<dyn MarketSource>,
    flights: Option<SingleFlight>,
    config: FetcherConfig,
}

impl std::fmt::Debug for ResilientFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientFetcher")
            .field("cache", &self.cache)
            .field("archive", &self.archive)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResilientFetcher {
    /// Creates a fetcher whose cache and archive share `store`
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        upstream: Arc<dyn MarketSource>,
        config: FetcherConfig,
    ) -> Self {
        Self {
            cache: CacheManager::new(Arc::clone(&store)),
            archive: FallbackArchive::new(store),
            upstream,
            flights: config.single_flight.then(SingleFlight::new),
            config,
        }
    }

    /// Market listing, top 100 by market cap
    pub async fn market_data(&self) -> Sourced<Vec<MarketCoin>> {
        self.fetch_or_default(
            &Category::MarketData,
            self.config.ttl_secs,
            normalize::market_data,
            defaults::market_data,
        )
        .await
    }

    /// Whole-market statistics
    pub async fn global_data(&self) -> Sourced<GlobalStats> {
        self.fetch_or_default(
            &Category::GlobalData,
            self.config.ttl_secs,
            normalize::global_data,
            defaults::global_data,
        )
        .await
    }

    /// Trending coins, already flattened
    pub async fn trending_coins(&self) -> Sourced<Vec<TrendingCoin>> {
        self.fetch_or_default(
            &Category::TrendingCoins,
            self.config.ttl_secs,
            normalize::trending_coins,
            defaults::trending_coins,
        )
        .await
    }

    /// Top exchanges
    pub async fn exchanges(&self) -> Sourced<Vec<Exchange>> {
        self.fetch_or_default(
            &Category::Exchanges,
            self.config.ttl_secs,
            normalize::exchanges,
            defaults::exchanges,
        )
        .await
    }

    /// News headlines
    pub async fn news(&self) -> Sourced<Vec<NewsItem>> {
        self.fetch_or_default(
            &Category::News,
            self.config.ttl_secs,
            normalize::news,
            defaults::news,
        )
        .await
    }

    /// Latest sentiment reading from the secondary provider
    pub async fn market_sentiment(&self) -> Sourced<MarketSentiment> {
        self.fetch_or_default(
            &Category::MarketSentiment,
            self.config.ttl_secs,
            normalize::market_sentiment,
            defaults::market_sentiment,
        )
        .await
    }

    /// Spot USD price of one coin
    ///
    /// Fails only for an invalid coin id. `0.0` means the price is unknown.
    pub async fn coin_price(&self, id: &str) -> Result<Sourced<f64>, FetchError> {
        let category = Category::coin_price(id)?;
        Ok(self.price_for(&category, self.config.ttl_secs).await)
    }

    /// Generic entry point: the payload of any category as JSON
    pub async fn fetch(
        &self,
        category: &Category,
        ttl_secs: u64,
    ) -> Result<Sourced<Value>, FetchError> {
        let fetched = match category {
            Category::MarketData => self
                .fetch_or_default(category, ttl_secs, normalize::market_data, defaults::market_data)
                .await
                .try_map(serde_json::to_value)?,
            Category::GlobalData => self
                .fetch_or_default(category, ttl_secs, normalize::global_data, defaults::global_data)
                .await
                .try_map(serde_json::to_value)?,
            Category::TrendingCoins => self
                .fetch_or_default(
                    category,
                    ttl_secs,
                    normalize::trending_coins,
                    defaults::trending_coins,
                )
                .await
                .try_map(serde_json::to_value)?,
            Category::Exchanges => self
                .fetch_or_default(category, ttl_secs, normalize::exchanges, defaults::exchanges)
                .await
                .try_map(serde_json::to_value)?,
            Category::News => self
                .fetch_or_default(category, ttl_secs, normalize::news, defaults::news)
                .await
                .try_map(serde_json::to_value)?,
            Category::MarketSentiment => self
                .fetch_or_default(
                    category,
                    ttl_secs,
                    normalize::market_sentiment,
                    defaults::market_sentiment,
                )
                .await
                .try_map(serde_json::to_value)?,
            Category::CoinPrice(_) => self
                .price_for(category, ttl_secs)
                .await
                .try_map(serde_json::to_value)?,
        };
        Ok(fetched)
    }

    /// Fetches every list category once, concurrently
    ///
    /// Used to warm the cache and archive at startup.
    pub async fn prefetch_all(&self) -> Vec<(Category, DataSource)> {
        let ttl_secs = self.config.ttl_secs;
        let categories = Category::LISTS;
        let fetches = categories.iter().map(|category| async move {
            let source = match self.fetch(category, ttl_secs).await {
                Ok(fetched) => fetched.source,
                Err(e) => {
                    warn!(%category, error = %e, "prefetch failed");
                    DataSource::Default
                }
            };
            (category.clone(), source)
        });
        futures::future::join_all(fetches).await
    }

    async fn fetch_or_default<T, N, D>(
        &self,
        category: &Category,
        ttl_secs: u64,
        normalize: N,
        default: D,
    ) -> Sourced<T>
    where
        T: Serialize + DeserializeOwned,
        N: FnOnce(Value) -> Result<T, UpstreamError>,
        D: FnOnce() -> T,
    {
        match self.fetch_with_fallback(category, ttl_secs, normalize).await {
            Some(fetched) => fetched,
            None => {
                warn!(%category, "no archived data, serving static default");
                Sourced::new(default(), DataSource::Default)
            }
        }
    }

    async fn price_for(&self, category: &Category, ttl_secs: u64) -> Sourced<f64> {
        let Category::CoinPrice(id) = category else {
            return Sourced::new(0.0, DataSource::Default);
        };

        let fetched = self
            .fetch_with_fallback(category, ttl_secs, |raw| normalize::coin_price(id.as_str(), &raw))
            .await;
        match fetched {
            Some(fetched) => fetched,
            None => self.estimate_price(id).await,
        }
    }

    /// Steps 1-3 of the pipeline; `None` means the caller's step 4 applies
    async fn fetch_with_fallback<T, N>(
        &self,
        category: &Category,
        ttl_secs: u64,
        normalize: N,
    ) -> Option<Sourced<T>>
    where
        T: Serialize + DeserializeOwned,
        N: FnOnce(Value) -> Result<T, UpstreamError>,
    {
        let key = category.cache_key();

        if let Some(hit) = self.probe_cache(category, &key).await {
            return Some(hit);
        }

        let mut flight = match &self.flights {
            Some(flights) => {
                let guard = flights.acquire(&key).await;
                // Another request may have refreshed it while we waited
                if let Some(hit) = self.probe_cache(category, &key).await {
                    return Some(hit);
                }
                Some(guard)
            }
            None => None,
        };

        let failure = if flight.as_ref().is_some_and(FlightGuard::leader_failed) {
            // The refresh we queued behind failed; take its fallback path
            "refresh already failed for this key".to_string()
        } else {
            let failure = match self.upstream.call(&category.endpoint()).await {
                Outcome::Success(raw) => match normalize(raw) {
                    Ok(data) => {
                        if let Err(e) = self.cache.write(&key, &data, ttl_secs).await {
                            warn!(%category, error = %e, "cache write failed");
                        }
                        self.archive.set(category, &data).await;
                        info!(%category, "refreshed from upstream");
                        return Some(Sourced::new(data, DataSource::Upstream));
                    }
                    Err(e) => format!("unexpected payload: {}", e),
                },
                Outcome::RateLimited => "rate limited".to_string(),
                Outcome::Failed(e) => e.to_string(),
            };
            if let Some(flight) = flight.as_mut() {
                flight.mark_failed();
            }
            failure
        };

        match self.archive.get::<T>(category).await {
            Some(data) => {
                warn!(%category, reason = %failure, "upstream unavailable, serving archive");
                Some(Sourced::new(data, DataSource::Archive))
            }
            None => {
                warn!(%category, reason = %failure, "upstream unavailable and archive empty");
                None
            }
        }
    }

    async fn probe_cache<T>(&self, category: &Category, key: &str) -> Option<Sourced<T>>
    where
        T: Serialize + DeserializeOwned,
    {
        let hit = self.cache.read::<T>(key).await?;
        debug!(%category, cached_at = %hit.cached_at, "serving from cache");
        self.archive.set(category, &hit.data).await;
        Some(Sourced::new(hit.data, DataSource::Cache))
    }

    /// Price fallback when neither the price cache nor its archive can help
    async fn estimate_price(&self, id: &CoinId) -> Sourced<f64> {
        let id = id.as_str();
        let listing: Option<Vec<MarketCoin>> = self.archive.get(&Category::MarketData).await;
        let coin = listing
            .as_ref()
            .and_then(|coins| coins.iter().find(|coin| coin.id == id));

        if let Some(price) = coin.and_then(|coin| coin.current_price).filter(|p| *p > 0.0) {
            info!(coin = id, price, "price taken from archived market listing");
            return Sourced::new(price, DataSource::Archive);
        }

        let global: Option<GlobalStats> = self.archive.get(&Category::GlobalData).await;
        if let Some(price) = global
            .as_ref()
            .and_then(|global| estimate_from_global(id, coin, global))
        {
            info!(coin = id, price, "price estimated from archived global snapshot");
            return Sourced::new(price, DataSource::Estimate);
        }

        warn!(coin = id, "no price available, reporting 0");
        Sourced::new(0.0, DataSource::Default)
    }
}

/// Estimates a price from market-cap dominance and circulating supply
///
/// `total_market_cap.usd * market_cap_percentage[k] / 100 / circulating_supply`,
/// where `k` is the coin id or, failing that, its symbol.
pub fn estimate_from_global(
    id: &str,
    coin: Option<&MarketCoin>,
    global: &GlobalStats,
) -> Option<f64> {
    let total_market_cap = *global.total_market_cap.get("usd")?;
    let percentage = global.market_cap_percentage.get(id).or_else(|| {
        coin.and_then(|coin| {
            global
                .market_cap_percentage
                .get(&coin.symbol.to_lowercase())
        })
    })?;
    let supply = coin?.circulating_supply.filter(|supply| *supply > 0.0)?;

    let estimated_market_cap = total_market_cap * percentage / 100.0;
    let price = estimated_market_cap / supply;
    (price.is_finite() && price > 0.0).then_some(price)
}
