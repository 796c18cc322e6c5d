//! HTTP API
//!
//! One read route per data category plus the portfolio sub-resource, served
//! by axum with CORS for the dashboard origin, per-client rate limiting,
//! browser security headers and per-request tracing.

pub mod error;
pub mod rate_limit;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use std::time::Duration;

use axum::http::header::{self, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, patch};
use axum::{middleware, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::data::ResilientFetcher;
use crate::portfolio::PortfolioBook;

pub use error::ApiError;
pub use rate_limit::{ClientLimiter, RateLimitConfig};
pub use routes::DATA_SOURCE_HEADER;

/// Default listen port
pub const DEFAULT_PORT: u16 = 5000;

/// Default browser origin allowed by CORS
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";

/// Errors raised while starting or running the server
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid frontend origin: {0}")]
    InvalidOrigin(String),

    #[error("Rate limit window {0:?} is too short for the request budget")]
    InvalidRateLimit(Duration),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Listener and browser-facing settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Origin allowed to call the API from a browser
    pub frontend_url: String,
    pub rate_limit: RateLimitConfig,
}

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub fetcher: Arc<ResilientFetcher>,
    pub portfolio: Arc<PortfolioBook>,
}

impl AppState {
    pub fn new(fetcher: Arc<ResilientFetcher>, portfolio: Arc<PortfolioBook>) -> Self {
        Self { fetcher, portfolio }
    }
}

/// CORS policy for the dashboard origin
pub fn cors_layer(frontend_url: &str) -> Result<CorsLayer, ServerError> {
    let origin = HeaderValue::from_str(frontend_url.trim_end_matches('/'))
        .map_err(|_| ServerError::InvalidOrigin(frontend_url.to_string()))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true))
}

/// Headers set on every response unless a handler already set them
fn security_headers() -> [(HeaderName, HeaderValue); 11] {
    [
        (
            header::CONTENT_SECURITY_POLICY,
            HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
        ),
        (
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("same-origin"),
        ),
        (
            HeaderName::from_static("origin-agent-cluster"),
            HeaderValue::from_static("?1"),
        ),
        (header::REFERRER_POLICY, HeaderValue::from_static("no-referrer")),
        (
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static("max-age=15552000; includeSubDomains"),
        ),
        (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
        (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
        (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
        (
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ),
        (header::X_XSS_PROTECTION, HeaderValue::from_static("0")),
    ]
}

/// Builds the full router
///
/// Layers, outermost first: security headers, tracing, CORS, rate limit.
/// Preflight requests are answered by CORS and do not count against the limit.
pub fn router(state: AppState, config: &ServerConfig) -> Result<Router, ServerError> {
    let cors = cors_layer(&config.frontend_url)?;
    let limiter = ClientLimiter::new(&config.rate_limit)?;

    let api = Router::new()
        .route("/market-data", get(routes::market_data))
        .route("/global-data", get(routes::global_data))
        .route("/trending-coins", get(routes::trending_coins))
        .route("/exchanges", get(routes::exchanges))
        .route("/news", get(routes::news))
        .route("/market-sentiment", get(routes::market_sentiment))
        .route("/coin-price/:id", get(routes::coin_price))
        .route(
            "/portfolio",
            get(routes::portfolio).post(routes::add_portfolio_item),
        )
        .route(
            "/portfolio/:id",
            patch(routes::update_portfolio_item).delete(routes::remove_portfolio_item),
        );

    let router = Router::new()
        .route("/health", get(routes::health))
        .nest("/api", api)
        .fallback(routes::not_found)
        .with_state(state)
        .layer(middleware::from_fn_with_state(limiter, rate_limit::limit_requests))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(security_headers()
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(name, value))
        }))
}

/// Serves `router` on `addr` until Ctrl-C
pub async fn serve(router: Router, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(addr = %addr, "listening");

    // Peer addresses key the rate limiter
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
            std::future::pending::<()>().await;
        }
    }
}
