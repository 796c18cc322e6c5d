//! Compiled-in seed payloads
//!
//! Served only when a category has never been archived and the upstream call
//! failed. Values are fixed so repeated fallbacks are identical.

use std::collections::BTreeMap;

use super::{Exchange, GlobalStats, MarketCoin, MarketSentiment, NewsItem, TrendingCoin};

/// Timestamp stamped on every seed record
const SEED_TIMESTAMP: &str = "2025-01-01T00:00:00.000Z";

/// Two seed coins: Bitcoin and Ethereum
pub fn market_data() -> Vec<MarketCoin> {
    vec![
        MarketCoin {
            id: "bitcoin".to_string(),
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            image: Some("https://assets.coingecko.com/coins/images/1/large/bitcoin.png".to_string()),
            current_price: Some(50_000.0),
            market_cap: Some(1_000_000_000_000.0),
            market_cap_rank: Some(1),
            total_volume: Some(50_000_000_000.0),
            high_24h: Some(51_000.0),
            low_24h: Some(49_000.0),
            price_change_24h: Some(1_250.0),
            price_change_percentage_24h: Some(2.5),
            price_change_percentage_7d_in_currency: Some(5.0),
            price_change_percentage_1h_in_currency: Some(0.5),
            market_cap_change_24h: Some(25_000_000_000.0),
            market_cap_change_percentage_24h: Some(2.5),
            circulating_supply: Some(19_500_000.0),
            total_supply: Some(21_000_000.0),
            max_supply: Some(21_000_000.0),
            ath: Some(69_000.0),
            ath_change_percentage: Some(-27.5),
            ath_date: Some("2021-11-10T14:24:11.849Z".to_string()),
            atl: Some(67.81),
            atl_change_percentage: Some(73_630.0),
            atl_date: Some("2013-07-06T00:00:00.000Z".to_string()),
            last_updated: Some(SEED_TIMESTAMP.to_string()),
            extra: BTreeMap::new(),
        },
        MarketCoin {
            id: "ethereum".to_string(),
            symbol: "eth".to_string(),
            name: "Ethereum".to_string(),
            image: Some("https://assets.coingecko.com/coins/images/279/large/ethereum.png".to_string()),
            current_price: Some(3_000.0),
            market_cap: Some(350_000_000_000.0),
            market_cap_rank: Some(2),
            total_volume: Some(30_000_000_000.0),
            high_24h: Some(3_100.0),
            low_24h: Some(2_900.0),
            price_change_24h: Some(90.0),
            price_change_percentage_24h: Some(3.0),
            price_change_percentage_7d_in_currency: Some(7.0),
            price_change_percentage_1h_in_currency: Some(0.8),
            market_cap_change_24h: Some(10_500_000_000.0),
            market_cap_change_percentage_24h: Some(3.0),
            circulating_supply: Some(120_000_000.0),
            total_supply: Some(120_000_000.0),
            max_supply: None,
            ath: Some(4_865.0),
            ath_change_percentage: Some(-38.3),
            ath_date: Some("2021-11-10T14:24:19.604Z".to_string()),
            atl: Some(0.432979),
            atl_change_percentage: Some(692_900.0),
            atl_date: Some("2015-10-20T00:00:00.000Z".to_string()),
            last_updated: Some(SEED_TIMESTAMP.to_string()),
            extra: BTreeMap::new(),
        },
    ]
}

/// Flat global figures matching the two seed coins
pub fn global_data() -> GlobalStats {
    let usd = |v: f64| BTreeMap::from([("usd".to_string(), v)]);
    GlobalStats {
        active_cryptocurrencies: Some(10_000),
        upcoming_icos: Some(50),
        ongoing_icos: Some(100),
        ended_icos: Some(500),
        markets: Some(500),
        total_market_cap: usd(2_000_000_000_000.0),
        total_volume: usd(100_000_000_000.0),
        market_cap_percentage: BTreeMap::from([
            ("btc".to_string(), 40.0),
            ("eth".to_string(), 20.0),
        ]),
        market_cap_change_percentage_24h_usd: Some(2.5),
        updated_at: Some(1_735_689_600),
        extra: BTreeMap::new(),
    }
}

/// Bitcoin and Ethereum as the trending pair
pub fn trending_coins() -> Vec<TrendingCoin> {
    let coin = |id: &str, name: &str, symbol: &str, image: u32, rank: u32, price_btc: f64| {
        let asset = |size: &str| {
            Some(format!(
                "https://assets.coingecko.com/coins/images/{}/{}/{}.png",
                image, size, id
            ))
        };
        TrendingCoin {
            id: id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            market_cap_rank: Some(rank),
            thumb: asset("thumb"),
            small: asset("small"),
            large: asset("large"),
            slug: Some(id.to_string()),
            price_btc: Some(price_btc),
            score: Some(rank - 1),
            extra: BTreeMap::new(),
        }
    };
    vec![
        coin("bitcoin", "Bitcoin", "btc", 1, 1, 1.0),
        coin("ethereum", "Ethereum", "eth", 279, 2, 0.06),
    ]
}

/// The two largest spot venues
pub fn exchanges() -> Vec<Exchange> {
    vec![
        Exchange {
            id: "binance".to_string(),
            name: "Binance".to_string(),
            country: Some("Cayman Islands".to_string()),
            year_established: Some(2017),
            url: Some("https://www.binance.com/".to_string()),
            image: None,
            trust_score: Some(10),
            trust_score_rank: Some(1),
            trade_volume_24h_btc: Some(1_000_000.0),
            extra: BTreeMap::new(),
        },
        Exchange {
            id: "okx".to_string(),
            name: "OKX".to_string(),
            country: Some("Malta".to_string()),
            year_established: Some(2017),
            url: Some("https://www.okx.com".to_string()),
            image: None,
            trust_score: Some(9),
            trust_score_rank: Some(2),
            trade_volume_24h_btc: Some(500_000.0),
            extra: BTreeMap::new(),
        },
    ]
}

/// Pointers to the provider's own news and market pages
pub fn news() -> Vec<NewsItem> {
    vec![
        NewsItem {
            id: "1".to_string(),
            title: "Latest Crypto News from CoinGecko".to_string(),
            url: "https://www.coingecko.com/en/news".to_string(),
            source: "CoinGecko".to_string(),
            published_at: SEED_TIMESTAMP.to_string(),
            description: "Visit CoinGecko News for the latest updates on cryptocurrency markets, trends, and developments.".to_string(),
        },
        NewsItem {
            id: "2".to_string(),
            title: "Crypto Market Analysis".to_string(),
            url: "https://www.coingecko.com/en/markets".to_string(),
            source: "CoinGecko".to_string(),
            published_at: SEED_TIMESTAMP.to_string(),
            description: "Check out CoinGecko Markets for real-time cryptocurrency prices, market caps, and trading volumes.".to_string(),
        },
    ]
}

/// Neutral reading
pub fn market_sentiment() -> MarketSentiment {
    MarketSentiment {
        value: "50".to_string(),
        value_classification: "Neutral".to_string(),
        timestamp: SEED_TIMESTAMP.to_string(),
        time_until_update: "1 hour".to_string(),
    }
}
