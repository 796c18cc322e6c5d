//! In-memory portfolio
//!
//! Holdings live for the lifetime of the process. Valuation uses the
//! `current_price` of the matching coin in whatever market listing the caller
//! passes in, so the portfolio view degrades exactly like the listing does.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::data::MarketCoin;

/// Errors returned by portfolio mutations
#[derive(Debug, Error, PartialEq)]
pub enum PortfolioError {
    #[error("Coin id must not be empty")]
    EmptyId,

    #[error("{field} must be a non-negative number, got {value}")]
    InvalidNumber { field: &'static str, value: f64 },

    #[error("Portfolio item not found: {0}")]
    NotFound(String),
}

/// One holding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioItem {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub amount: f64,
    pub purchase_price: f64,
    pub purchase_date: DateTime<Utc>,
}

/// Body of an add request; the purchase date is stamped on insert
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPortfolioItem {
    pub id: String,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub amount: f64,
    pub purchase_price: f64,
}

/// Partial update; absent fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPatch {
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub amount: Option<f64>,
    pub purchase_price: Option<f64>,
}

/// Holdings valued against a market listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub items: Vec<PortfolioItem>,
    pub total_value: f64,
    pub total_profit_loss: f64,
    pub total_profit_loss_percentage: f64,
}

#[derive(Debug)]
pub struct PortfolioBook {
    items: RwLock<Vec<PortfolioItem>>,
}

impl Default for PortfolioBook {
    fn default() -> Self {
        Self::with_items(demo_holdings())
    }
}

impl PortfolioBook {
    /// Book seeded with the demo holdings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_items(items: Vec<PortfolioItem>) -> Self {
        Self {
            items: RwLock::new(items),
        }
    }

    pub async fn items(&self) -> Vec<PortfolioItem> {
        self.items.read().await.clone()
    }

    /// Values every holding at the listing's current price
    ///
    /// Coins missing from the listing, or listed without a price, count as 0.
    pub async fn summary(&self, market: &[MarketCoin]) -> PortfolioSummary {
        let items = self.items().await;

        let total_value: f64 = items
            .iter()
            .map(|item| item.amount * current_price(market, &item.id))
            .sum();
        let total_cost: f64 = items
            .iter()
            .map(|item| item.amount * item.purchase_price)
            .sum();

        let total_profit_loss = total_value - total_cost;
        let total_profit_loss_percentage = if total_cost > 0.0 {
            total_profit_loss / total_cost * 100.0
        } else {
            0.0
        };

        PortfolioSummary {
            items,
            total_value,
            total_profit_loss,
            total_profit_loss_percentage,
        }
    }

    /// Appends a holding stamped with the current time
    pub async fn add(&self, new_item: NewPortfolioItem) -> Result<PortfolioItem, PortfolioError> {
        let id = new_item.id.trim().to_lowercase();
        if id.is_empty() {
            return Err(PortfolioError::EmptyId);
        }
        check_non_negative("amount", new_item.amount)?;
        check_non_negative("purchasePrice", new_item.purchase_price)?;

        let item = PortfolioItem {
            id,
            symbol: new_item.symbol,
            name: new_item.name,
            amount: new_item.amount,
            purchase_price: new_item.purchase_price,
            purchase_date: Utc::now(),
        };

        self.items.write().await.push(item.clone());
        info!(coin = %item.id, amount = item.amount, "portfolio item added");
        Ok(item)
    }

    /// Removes every line for `id`; returns how many were removed
    pub async fn remove(&self, id: &str) -> usize {
        let mut items = self.items.write().await;
        let before = items.len();
        items.retain(|item| item.id != id);
        let removed = before - items.len();
        if removed > 0 {
            info!(coin = id, removed, "portfolio item removed");
        }
        removed
    }

    /// Applies a partial update to the first line for `id`
    pub async fn update(
        &self,
        id: &str,
        patch: PortfolioPatch,
    ) -> Result<PortfolioItem, PortfolioError> {
        if let Some(amount) = patch.amount {
            check_non_negative("amount", amount)?;
        }
        if let Some(price) = patch.purchase_price {
            check_non_negative("purchasePrice", price)?;
        }

        let mut items = self.items.write().await;
        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| PortfolioError::NotFound(id.to_string()))?;

        if let Some(symbol) = patch.symbol {
            item.symbol = symbol;
        }
        if let Some(name) = patch.name {
            item.name = name;
        }
        if let Some(amount) = patch.amount {
            item.amount = amount;
        }
        if let Some(price) = patch.purchase_price {
            item.purchase_price = price;
        }

        info!(coin = id, "portfolio item updated");
        Ok(item.clone())
    }
}

fn current_price(market: &[MarketCoin], id: &str) -> f64 {
    market
        .iter()
        .find(|coin| coin.id == id)
        .and_then(|coin| coin.current_price)
        .unwrap_or(0.0)
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), PortfolioError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PortfolioError::InvalidNumber { field, value })
    }
}

/// 0.5 BTC bought at 45 000 and 2 ETH bought at 2 800
fn demo_holdings() -> Vec<PortfolioItem> {
    let date = |month| {
        Utc.with_ymd_and_hms(2025, month, 1, 0, 0, 0)
            .single()
            .unwrap_or_default()
    };

    vec![
        PortfolioItem {
            id: "bitcoin".to_string(),
            symbol: "btc".to_string(),
            name: "Bitcoin".to_string(),
            amount: 0.5,
            purchase_price: 45_000.0,
            purchase_date: date(1),
        },
        PortfolioItem {
            id: "ethereum".to_string(),
            symbol: "eth".to_string(),
            name: "Ethereum".to_string(),
            amount: 2.0,
            purchase_price: 2_800.0,
            purchase_date: date(2),
        },
    ]
}
