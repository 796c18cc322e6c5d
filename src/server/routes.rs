//! Request handlers
//!
//! Each data handler runs one fetch and serialises the payload as-is. The
//! `x-data-source` header says which step of the pipeline answered.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use super::error::ApiError;
use super::AppState;
use crate::data::Sourced;
use crate::portfolio::{NewPortfolioItem, PortfolioPatch};

/// Response header naming the pipeline step that produced the body
pub const DATA_SOURCE_HEADER: &str = "x-data-source";

fn sourced<T: Serialize>(fetched: Sourced<T>) -> Response {
    (
        [(DATA_SOURCE_HEADER, fetched.source.as_str())],
        Json(fetched.data),
    )
        .into_response()
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub async fn market_data(State(state): State<AppState>) -> Response {
    sourced(state.fetcher.market_data().await)
}

pub async fn global_data(State(state): State<AppState>) -> Response {
    sourced(state.fetcher.global_data().await)
}

pub async fn trending_coins(State(state): State<AppState>) -> Response {
    sourced(state.fetcher.trending_coins().await)
}

pub async fn exchanges(State(state): State<AppState>) -> Response {
    sourced(state.fetcher.exchanges().await)
}

pub async fn news(State(state): State<AppState>) -> Response {
    sourced(state.fetcher.news().await)
}

pub async fn market_sentiment(State(state): State<AppState>) -> Response {
    sourced(state.fetcher.market_sentiment().await)
}

pub async fn coin_price(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let fetched = state.fetcher.coin_price(&id).await?;
    Ok(sourced(Sourced {
        data: json!({"price": fetched.data}),
        source: fetched.source,
    }))
}

/// Holdings valued against the market listing
pub async fn portfolio(State(state): State<AppState>) -> Response {
    let market = state.fetcher.market_data().await;
    let summary = state.portfolio.summary(&market.data).await;
    sourced(Sourced {
        data: summary,
        source: market.source,
    })
}

pub async fn add_portfolio_item(
    State(state): State<AppState>,
    body: Result<Json<NewPortfolioItem>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(new_item) = body?;
    let item = state.portfolio.add(new_item).await?;
    Ok((StatusCode::CREATED, Json(item)).into_response())
}

pub async fn update_portfolio_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<PortfolioPatch>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(patch) = body?;
    let item = state.portfolio.update(&id, patch).await?;
    Ok(Json(item).into_response())
}

pub async fn remove_portfolio_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    state.portfolio.remove(&id).await;
    StatusCode::NO_CONTENT
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not Found".to_string())
}
