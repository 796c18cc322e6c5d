//! Conversion of raw provider payloads into the shapes served to the dashboard
//!
//! A payload that does not fit is an error, which sends the fetcher down the
//! fallback path exactly like a failed request would.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::upstream::UpstreamError;
use super::{Exchange, GlobalStats, MarketCoin, MarketSentiment, NewsItem, TrendingCoin};

/// Market listing: a bare array of coins
pub fn market_data(raw: Value) -> Result<Vec<MarketCoin>, UpstreamError> {
    decode(raw)
}

/// Global stats: unwraps the provider's `{data: {...}}` envelope
pub fn global_data(raw: Value) -> Result<GlobalStats, UpstreamError> {
    decode(unwrap_data(raw))
}

/// Trending: flattens `{coins: [{item: {...}}]}` into the list of items
pub fn trending_coins(raw: Value) -> Result<Vec<TrendingCoin>, UpstreamError> {
    let coins = match raw {
        Value::Object(mut map) => map
            .remove("coins")
            .ok_or_else(|| UpstreamError::MissingField("coins".to_string()))?,
        other => other,
    };

    let Value::Array(entries) = coins else {
        return Err(UpstreamError::MissingField("coins[]".to_string()));
    };

    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Object(mut map) => match map.remove("item") {
                Some(item) => decode(item),
                None => decode(Value::Object(map)),
            },
            other => decode(other),
        })
        .collect()
}

/// Exchange listing: a bare array
pub fn exchanges(raw: Value) -> Result<Vec<Exchange>, UpstreamError> {
    decode(raw)
}

/// News: a bare array or a `{data: [...]}` envelope
pub fn news(raw: Value) -> Result<Vec<NewsItem>, UpstreamError> {
    decode(unwrap_data(raw))
}

/// Sentiment: first element of the secondary provider's `{data: [...]}` list
pub fn market_sentiment(raw: Value) -> Result<MarketSentiment, UpstreamError> {
    let first = match unwrap_data(raw) {
        Value::Array(entries) => entries
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::MissingField("data[0]".to_string()))?,
        other => other,
    };

    // The provider sends numbers as strings today; accept real numbers too
    let first = match first {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| match value {
                    Value::Number(number) => (key, Value::String(number.to_string())),
                    value => (key, value),
                })
                .collect(),
        ),
        other => other,
    };

    decode(first)
}

/// Simple price: `{"<id>": {"usd": n}}`
///
/// A zero quote means the provider has no price; it is treated as missing.
pub fn coin_price(id: &str, raw: &Value) -> Result<f64, UpstreamError> {
    raw.get(id)
        .and_then(|quote| quote.get("usd"))
        .and_then(Value::as_f64)
        .filter(|price| *price > 0.0)
        .ok_or_else(|| UpstreamError::MissingField(format!("{}.usd", id)))
}

fn unwrap_data(raw: Value) -> Value {
    match raw {
        Value::Object(mut map) if map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode<T: DeserializeOwned>(raw: Value) -> Result<T, UpstreamError> {
    Ok(serde_json::from_value(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trending_envelope_is_flattened() {
        let raw = json!({
            "coins": [
                {"item": {"id": "bitcoin", "name": "Bitcoin", "symbol": "BTC", "market_cap_rank": 1, "score": 0}},
                {"item": {"id": "pepe", "name": "Pepe", "symbol": "PEPE", "market_cap_rank": null, "score": 1}}
            ],
            "nfts": []
        });

        let coins = trending_coins(raw).expect("Failed to normalise trending");

        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].id, "bitcoin");
        assert_eq!(coins[1].market_cap_rank, None);

        let serialized = serde_json::to_value(&coins).unwrap();
        assert!(serialized[0].get("item").is_none());
        assert_eq!(serialized[0]["id"], "bitcoin");
    }

    #[test]
    fn test_trending_accepts_already_flat_list() {
        let raw = json!([{"id": "solana", "name": "Solana", "symbol": "SOL"}]);
        let coins = trending_coins(raw).unwrap();
        assert_eq!(coins[0].id, "solana");
    }

    #[test]
    fn test_trending_without_coins_is_error() {
        assert!(matches!(
            trending_coins(json!({"nfts": []})),
            Err(UpstreamError::MissingField(_))
        ));
    }

    #[test]
    fn test_global_envelope_is_unwrapped() {
        let raw = json!({"data": {
            "active_cryptocurrencies": 12000,
            "total_market_cap": {"usd": 2.5e12},
            "market_cap_percentage": {"btc": 51.2},
            "market_cap_change_percentage_24h_usd": -1.2,
            "updated_at": 1700000000
        }});

        let global = global_data(raw).unwrap();

        assert_eq!(global.active_cryptocurrencies, Some(12000));
        assert_eq!(global.total_market_cap["usd"], 2.5e12);
        assert_eq!(global.market_cap_percentage["btc"], 51.2);
    }

    #[test]
    fn test_sentiment_takes_first_reading() {
        let raw = json!({
            "name": "Fear and Greed Index",
            "data": [
                {"value": "25", "value_classification": "Extreme Fear", "timestamp": "1700000000", "time_until_update": "1234"},
                {"value": "30", "value_classification": "Fear", "timestamp": "1699913600"}
            ]
        });

        let sentiment = market_sentiment(raw).unwrap();

        assert_eq!(sentiment.value, "25");
        assert_eq!(sentiment.value_classification, "Extreme Fear");
        assert_eq!(sentiment.time_until_update, "1234");
    }

    #[test]
    fn test_sentiment_accepts_numeric_fields() {
        let raw = json!({"data": [{"value": 61, "value_classification": "Greed", "timestamp": 1700000000}]});

        let sentiment = market_sentiment(raw).unwrap();

        assert_eq!(sentiment.value, "61");
        assert_eq!(sentiment.timestamp, "1700000000");
        assert_eq!(sentiment.time_until_update, "");
    }

    #[test]
    fn test_sentiment_empty_list_is_error() {
        assert!(market_sentiment(json!({"data": []})).is_err());
    }

    #[test]
    fn test_coin_price_reads_usd_quote() {
        let raw = json!({"bitcoin": {"usd": 64123.5}});
        assert_eq!(coin_price("bitcoin", &raw).unwrap(), 64123.5);
    }

    #[test]
    fn test_coin_price_missing_id_is_error() {
        let raw = json!({});
        assert!(matches!(
            coin_price("bitcoin", &raw),
            Err(UpstreamError::MissingField(field)) if field == "bitcoin.usd"
        ));
    }

    #[test]
    fn test_coin_price_zero_is_missing() {
        let raw = json!({"deadcoin": {"usd": 0}});
        assert!(coin_price("deadcoin", &raw).is_err());
    }

    #[test]
    fn test_market_data_rejects_wrong_shape() {
        assert!(market_data(json!({"error": "coin not found"})).is_err());
    }

    #[test]
    fn test_news_accepts_both_shapes() {
        let item = json!({"id": "a", "title": "t", "url": "u"});
        assert_eq!(news(json!([item.clone()])).unwrap().len(), 1);
        assert_eq!(news(json!({"data": [item]})).unwrap().len(), 1);
    }

    #[test]
    fn test_market_data_keeps_untyped_provider_fields() {
        let raw = json!([{
            "id": "bitcoin", "symbol": "btc", "name": "Bitcoin",
            "current_price": 64000.0,
            "fully_diluted_valuation": 1.3e12,
            "roi": null
        }]);

        let coins = market_data(raw).unwrap();
        let served = serde_json::to_value(&coins).unwrap();

        assert_eq!(served[0]["fully_diluted_valuation"], json!(1.3e12));
        assert!(served[0].as_object().unwrap().contains_key("roi"));
        assert_eq!(served[0]["current_price"], json!(64000.0));
    }

    #[test]
    fn test_trending_keeps_nested_item_data() {
        let raw = json!({"coins": [{"item": {
            "id": "bitcoin", "coin_id": 1, "name": "Bitcoin", "symbol": "BTC",
            "data": {"price": 64000.0, "market_cap": "$1,260,000,000,000"}
        }}]});

        let coins = trending_coins(raw).unwrap();
        let served = serde_json::to_value(&coins).unwrap();

        assert_eq!(served[0]["coin_id"], 1);
        assert_eq!(served[0]["data"]["market_cap"], "$1,260,000,000,000");
    }

    #[test]
    fn test_exchange_and_global_keep_untyped_fields() {
        let listed = exchanges(json!([{
            "id": "kraken", "name": "Kraken", "has_trading_incentive": false, "trade_volume_24h_btc_normalized": 12.5
        }]))
        .unwrap();
        let served = serde_json::to_value(&listed).unwrap();
        assert_eq!(served[0]["has_trading_incentive"], false);
        assert_eq!(served[0]["trade_volume_24h_btc_normalized"], 12.5);

        let global = global_data(json!({"data": {"total_market_cap": {"usd": 1.0}, "volume_change_24h": -3.5}})).unwrap();
        assert_eq!(serde_json::to_value(&global).unwrap()["volume_change_24h"], -3.5);
    }
}
