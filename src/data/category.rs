//! Data categories and the keys and endpoints derived from them

use std::fmt;

use thiserror::Error;

/// Prefix separating archive entries from cache entries in the shared store
pub const ARCHIVE_PREFIX: &str = "fallback:";

const COIN_PRICE_PREFIX: &str = "coin-price:";

/// Errors raised when a coin id is unusable
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryError {
    /// A coin-price category was given without a coin id
    #[error("Coin id must not be empty")]
    EmptyCoinId,

    /// Coin ids are limited to what the provider uses: `[a-z0-9._-]`
    #[error("Invalid coin id: '{0}'")]
    InvalidCoinId(String),
}

/// One logical kind of market data
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Category {
    MarketData,
    GlobalData,
    TrendingCoins,
    Exchanges,
    News,
    MarketSentiment,
    /// Spot USD price of a single coin, by provider id (e.g. "bitcoin")
    CoinPrice(CoinId),
}

/// A provider coin id that is safe to put in a key and a query string
///
/// Only [`CoinId::parse`] builds one, so every `CoinPrice` has been checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoinId(String);

impl CoinId {
    /// Lowercases and trims `raw`, then checks it against `[a-z0-9._-]+`
    pub fn parse(raw: &str) -> Result<Self, CategoryError> {
        let id = raw.trim().to_lowercase();
        if id.is_empty() {
            return Err(CategoryError::EmptyCoinId);
        }
        let valid = id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(CategoryError::InvalidCoinId(id));
        }
        Ok(CoinId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a category is fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Path and query on the market-data provider
    Market(String),
    /// The sentiment provider's latest reading
    Sentiment,
}

impl Category {
    /// Every category that does not take a parameter
    pub const LISTS: [Category; 6] = [
        Category::MarketData,
        Category::GlobalData,
        Category::TrendingCoins,
        Category::Exchanges,
        Category::News,
        Category::MarketSentiment,
    ];

    /// Builds a coin-price category, normalising the id
    pub fn coin_price(id: &str) -> Result<Self, CategoryError> {
        CoinId::parse(id).map(Category::CoinPrice)
    }

    /// Canonical name; doubles as the cache key
    pub fn name(&self) -> String {
        match self {
            Category::MarketData => "market-data".to_string(),
            Category::GlobalData => "global-data".to_string(),
            Category::TrendingCoins => "trending-coins".to_string(),
            Category::Exchanges => "exchanges".to_string(),
            Category::News => "news".to_string(),
            Category::MarketSentiment => "market-sentiment".to_string(),
            Category::CoinPrice(id) => format!("{}{}", COIN_PRICE_PREFIX, id),
        }
    }

    /// Key of the short-lived cache entry
    pub fn cache_key(&self) -> String {
        self.name()
    }

    /// Key of the TTL-less archive entry
    pub fn archive_key(&self) -> String {
        format!("{}{}", ARCHIVE_PREFIX, self.name())
    }

    /// Upstream endpoint serving this category
    pub fn endpoint(&self) -> Endpoint {
        match self {
            Category::MarketData => Endpoint::Market(
                "/coins/markets?vs_currency=usd&order=market_cap_desc&per_page=100&page=1&sparkline=false"
                    .to_string(),
            ),
            Category::GlobalData => Endpoint::Market("/global".to_string()),
            Category::TrendingCoins => Endpoint::Market("/search/trending".to_string()),
            Category::Exchanges => Endpoint::Market("/exchanges?per_page=10".to_string()),
            Category::News => Endpoint::Market("/news".to_string()),
            Category::MarketSentiment => Endpoint::Sentiment,
            Category::CoinPrice(id) => {
                Endpoint::Market(format!("/simple/price?ids={}&vs_currencies=usd", id))
            }
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn all_categories() -> Vec<Category> {
        let mut all = Category::LISTS.to_vec();
        all.push(Category::coin_price("bitcoin").unwrap());
        all.push(Category::coin_price("ethereum").unwrap());
        all
    }

    #[test]
    fn test_names_are_distinct() {
        let names: HashSet<String> = all_categories().iter().map(Category::name).collect();
        assert_eq!(names.len(), all_categories().len());
    }

    #[test]
    fn test_coin_price_normalises_and_rejects_empty_id() {
        let category = Category::coin_price("  Bitcoin ").unwrap();
        assert_eq!(category.name(), "coin-price:bitcoin");
        assert_eq!(Category::coin_price("   "), Err(CategoryError::EmptyCoinId));
        assert_eq!(CoinId::parse(""), Err(CategoryError::EmptyCoinId));
    }

    #[test]
    fn test_coin_id_is_only_built_from_checked_input() {
        let id = CoinId::parse("Wrapped-Bitcoin").unwrap();
        assert_eq!(id.as_str(), "wrapped-bitcoin");
        assert_eq!(id.to_string(), "wrapped-bitcoin");

        for bad in ["a&b", "btc usd", "eth/..", "x?y=1"] {
            assert!(CoinId::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_coin_price_rejects_query_injection() {
        assert_eq!(
            Category::coin_price("bitcoin&vs_currencies=eur"),
            Err(CategoryError::InvalidCoinId("bitcoin&vs_currencies=eur".to_string()))
        );
        assert!(Category::coin_price("usd-coin").is_ok());
    }

    #[test]
    fn test_keys_never_collide_across_categories_or_namespaces() {
        let mut seen = HashSet::new();
        for category in all_categories() {
            assert!(seen.insert(category.cache_key()), "duplicate cache key for {}", category);
            assert!(seen.insert(category.archive_key()), "duplicate archive key for {}", category);
        }
    }

    #[test]
    fn test_archive_key_is_prefixed_cache_key() {
        let category = Category::coin_price("solana").unwrap();
        assert_eq!(category.cache_key(), "coin-price:solana");
        assert_eq!(category.archive_key(), "fallback:coin-price:solana");
    }

    #[test]
    fn test_sentiment_uses_secondary_endpoint() {
        assert_eq!(Category::MarketSentiment.endpoint(), Endpoint::Sentiment);
        assert_eq!(
            Category::coin_price("bitcoin").unwrap().endpoint(),
            Endpoint::Market("/simple/price?ids=bitcoin&vs_currencies=usd".to_string())
        );
    }
}
