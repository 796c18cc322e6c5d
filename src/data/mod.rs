//! Market data models and the resilient fetch pipeline
//!
//! This module contains the payload types served to the dashboard, the
//! category catalogue, the compiled-in seed data, the upstream client and the
//! fetcher that ties cache, upstream, archive and defaults together.

pub mod category;
pub mod defaults;
pub mod fetcher;
pub mod normalize;
pub mod single_flight;
pub mod upstream;

pub use category::{Category, CategoryError, CoinId, Endpoint};
pub use fetcher::{DataSource, FetchError, FetcherConfig, ResilientFetcher, Sourced};
pub use upstream::{MarketSource, Outcome, UpstreamClient, UpstreamConfig, UpstreamError};

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// One row of the market listing
///
/// Every numeric field is optional because the provider sends `null` for
/// coins it has no figure for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub total_volume: Option<f64>,
    #[serde(default)]
    pub high_24h: Option<f64>,
    #[serde(default)]
    pub low_24h: Option<f64>,
    #[serde(default)]
    pub price_change_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_7d_in_currency: Option<f64>,
    #[serde(default)]
    pub price_change_percentage_1h_in_currency: Option<f64>,
    #[serde(default)]
    pub market_cap_change_24h: Option<f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h: Option<f64>,
    #[serde(default)]
    pub circulating_supply: Option<f64>,
    #[serde(default)]
    pub total_supply: Option<f64>,
    #[serde(default)]
    pub max_supply: Option<f64>,
    #[serde(default)]
    pub ath: Option<f64>,
    #[serde(default)]
    pub ath_change_percentage: Option<f64>,
    #[serde(default)]
    pub ath_date: Option<String>,
    #[serde(default)]
    pub atl: Option<f64>,
    #[serde(default)]
    pub atl_change_percentage: Option<f64>,
    #[serde(default)]
    pub atl_date: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    /// Provider fields without a typed counterpart, kept as received
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Whole-market statistics, with the provider's `data` envelope removed
///
/// Maps are ordered so that re-serialising a cached value is byte-stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    #[serde(default)]
    pub active_cryptocurrencies: Option<u64>,
    #[serde(default)]
    pub upcoming_icos: Option<u64>,
    #[serde(default)]
    pub ongoing_icos: Option<u64>,
    #[serde(default)]
    pub ended_icos: Option<u64>,
    #[serde(default)]
    pub markets: Option<u64>,
    /// Keyed by quote currency ("usd", "eur", ...)
    #[serde(default)]
    pub total_market_cap: BTreeMap<String, f64>,
    #[serde(default)]
    pub total_volume: BTreeMap<String, f64>,
    /// Dominance percentages keyed by coin symbol ("btc", "eth", ...)
    #[serde(default)]
    pub market_cap_percentage: BTreeMap<String, f64>,
    #[serde(default)]
    pub market_cap_change_percentage_24h_usd: Option<f64>,
    #[serde(default)]
    pub updated_at: Option<i64>,
    /// Provider fields without a typed counterpart, kept as received
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A trending coin, flattened out of the provider's `{item: {...}}` wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendingCoin {
    pub id: String,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub market_cap_rank: Option<u32>,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default)]
    pub small: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub price_btc: Option<f64>,
    #[serde(default)]
    pub score: Option<u32>,
    /// Provider fields without a typed counterpart, kept as received
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A spot exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub year_established: Option<u32>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub trust_score: Option<u32>,
    #[serde(default)]
    pub trust_score_rank: Option<u32>,
    #[serde(default)]
    pub trade_volume_24h_btc: Option<f64>,
    /// Provider fields without a typed counterpart, kept as received
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A news headline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub url: String,
    #[serde(default, alias = "news_site")]
    pub source: String,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub description: String,
}

/// Fear & Greed style market sentiment reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSentiment {
    pub value: String,
    pub value_classification: String,
    pub timestamp: String,
    #[serde(default)]
    pub time_until_update: String,
}

/// Accepts either a JSON string or a JSON number and keeps it as a string
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(text) => text,
        Raw::Number(number) => number.to_string(),
    })
}
