//! Command-line and environment configuration
//!
//! Every option can be given as a flag or through the environment variable
//! named next to it (a `.env` file is loaded first by `main`). The parsed
//! arguments are validated into a [`ServiceConfig`] before anything starts.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use clap::Parser;
use reqwest::Url;
use thiserror::Error;

use crate::data::fetcher::DEFAULT_TTL_SECS;
use crate::data::upstream::{DEFAULT_MARKET_BASE_URL, DEFAULT_SENTIMENT_URL};
use crate::data::{FetcherConfig, UpstreamConfig};
use crate::server::rate_limit::{DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW_MS};
use crate::server::{RateLimitConfig, ServerConfig, DEFAULT_FRONTEND_URL, DEFAULT_PORT};

/// Longest accepted cache TTL: one year
pub const MAX_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Error types for configuration validation
#[derive(Debug, Error, PartialEq)]
pub enum CliError {
    /// Host is not an IP address
    #[error("Invalid host: '{0}'. Expected an IP address such as 0.0.0.0 or 127.0.0.1")]
    InvalidHost(String),

    /// A URL option is not an http(s) URL
    #[error("Invalid {name}: '{value}'. Expected an http:// or https:// URL")]
    InvalidUrl { name: &'static str, value: String },

    /// Zero is not a usable value for this option
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Coinpulse - market-data backend for the crypto dashboard
#[derive(Parser, Debug)]
#[command(name = "coinpulse")]
#[command(about = "Crypto market-data API with cache, last-known-good archive and seed fallbacks")]
#[command(version)]
pub struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Redis connection URL; an in-memory store is used when unset or unreachable
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Browser origin allowed by CORS
    #[arg(long, env = "FRONTEND_URL", default_value = DEFAULT_FRONTEND_URL)]
    pub frontend_url: String,

    /// Base URL of the market-data provider
    #[arg(long, env = "COINGECKO_API_URL", default_value = DEFAULT_MARKET_BASE_URL)]
    pub coingecko_api_url: String,

    /// URL of the Fear & Greed sentiment endpoint
    #[arg(long, env = "SENTIMENT_API_URL", default_value = DEFAULT_SENTIMENT_URL)]
    pub sentiment_api_url: String,

    /// Seconds a cached response stays fresh (1 to one year)
    #[arg(
        long,
        env = "CACHE_TTL_SECS",
        default_value_t = DEFAULT_TTL_SECS,
        value_parser = clap::value_parser!(u64).range(1..=MAX_CACHE_TTL_SECS)
    )]
    pub cache_ttl_secs: u64,

    /// Seconds before an upstream request is abandoned
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 10)]
    pub upstream_timeout_secs: u64,

    /// Length of the per-client rate-limit window, in milliseconds
    #[arg(long, env = "RATE_LIMIT_WINDOW_MS", default_value_t = DEFAULT_WINDOW_MS)]
    pub rate_limit_window_ms: u64,

    /// Requests each client may make per window
    #[arg(long, env = "RATE_LIMIT_MAX_REQUESTS", default_value_t = DEFAULT_MAX_REQUESTS)]
    pub rate_limit_max_requests: u32,

    /// Fetch every category once at startup
    #[arg(long, env = "WARM_CACHE")]
    pub warm_cache: bool,

    /// Let concurrent cache misses each call upstream
    #[arg(long)]
    pub no_single_flight: bool,
}

/// Validated configuration for the whole service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub fetcher: FetcherConfig,
    pub redis_url: Option<String>,
    pub warm_cache: bool,
}

impl ServiceConfig {
    /// Creates a ServiceConfig from parsed CLI arguments.
    ///
    /// # Returns
    /// * `Ok(ServiceConfig)` when every option is usable
    /// * `Err(CliError)` naming the first option that is not
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let ip: IpAddr = cli
            .host
            .parse()
            .map_err(|_| CliError::InvalidHost(cli.host.clone()))?;

        let frontend_url = check_url("FRONTEND_URL", &cli.frontend_url)?;
        let market_base_url = check_url("COINGECKO_API_URL", &cli.coingecko_api_url)?;
        let sentiment_url = check_url("SENTIMENT_API_URL", &cli.sentiment_api_url)?;

        // Also range-checked by clap; this covers configs built in code
        if cli.cache_ttl_secs == 0 {
            return Err(CliError::Zero("CACHE_TTL_SECS"));
        }
        if cli.upstream_timeout_secs == 0 {
            return Err(CliError::Zero("UPSTREAM_TIMEOUT_SECS"));
        }
        if cli.rate_limit_window_ms == 0 {
            return Err(CliError::Zero("RATE_LIMIT_WINDOW_MS"));
        }
        let max_requests = NonZeroU32::new(cli.rate_limit_max_requests)
            .ok_or(CliError::Zero("RATE_LIMIT_MAX_REQUESTS"))?;

        // An empty REDIS_URL in a .env file means "not configured"
        let redis_url = cli
            .redis_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(str::to_string);

        Ok(ServiceConfig {
            server: ServerConfig {
                addr: SocketAddr::new(ip, cli.port),
                frontend_url,
                rate_limit: RateLimitConfig {
                    window: Duration::from_millis(cli.rate_limit_window_ms),
                    max_requests,
                },
            },
            upstream: UpstreamConfig {
                market_base_url,
                sentiment_url,
                timeout: Duration::from_secs(cli.upstream_timeout_secs),
            },
            fetcher: FetcherConfig {
                ttl_secs: cli.cache_ttl_secs,
                single_flight: !cli.no_single_flight,
            },
            redis_url,
            warm_cache: cli.warm_cache,
        })
    }
}

/// Accepts an absolute http(s) URL with a host, returned trimmed
fn check_url(name: &'static str, value: &str) -> Result<String, CliError> {
    let value = value.trim();
    let invalid = || CliError::InvalidUrl {
        name,
        value: value.to_string(),
    };

    let url = Url::parse(value).map_err(|_| invalid())?;
    let has_host = url.host_str().is_some_and(|host| !host.is_empty());
    if !matches!(url.scheme(), "http" | "https") || !has_host {
        return Err(invalid());
    }
    Ok(value.to_string())
}
