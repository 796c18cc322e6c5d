//! Per-client request limiting
//!
//! Each client IP gets `max_requests` per `window`, refilled evenly across the
//! window (GCRA via governor). Requests over the limit get a JSON 429 with a
//! `Retry-After` header and never reach a handler.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use tracing::debug;

use super::error::ApiError;
use super::ServerError;

/// Default length of the limiting window
pub const DEFAULT_WINDOW_MS: u64 = 60_000;

/// Default number of requests a client may make per window
pub const DEFAULT_MAX_REQUESTS: u32 = 50;

/// Above this many tracked clients, idle ones are dropped on the next check
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Request budget per client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub window: Duration,
    pub max_requests: NonZeroU32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(DEFAULT_WINDOW_MS),
            max_requests: NonZeroU32::new(DEFAULT_MAX_REQUESTS).unwrap_or(NonZeroU32::MIN),
        }
    }
}

/// Keyed limiter shared by every connection
#[derive(Clone)]
pub struct ClientLimiter {
    limiter: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    clock: DefaultClock,
}

impl std::fmt::Debug for ClientLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientLimiter")
            .field("tracked", &self.limiter.len())
            .finish()
    }
}

impl ClientLimiter {
    /// Builds a limiter allowing a full window's budget as an initial burst
    pub fn new(config: &RateLimitConfig) -> Result<Self, ServerError> {
        let period = config.window / config.max_requests.get();
        let quota = Quota::with_period(period)
            .ok_or(ServerError::InvalidRateLimit(config.window))?
            .allow_burst(config.max_requests);

        Ok(Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
            clock: DefaultClock::default(),
        })
    }

    /// Takes one request from `client`'s budget, or says how long to wait
    pub fn check(&self, client: IpAddr) -> Result<(), Duration> {
        if self.limiter.len() > MAX_TRACKED_CLIENTS {
            self.limiter.retain_recent();
            debug!(tracked = self.limiter.len(), "pruned idle rate-limit entries");
        }

        self.limiter
            .check_key(&client)
            .map_err(|not_until| not_until.wait_time_from(self.clock.now()))
    }
}

/// Middleware rejecting clients that are over their budget
///
/// Requests without connection info (in-process callers) share one bucket.
pub async fn limit_requests(
    State(limiter): State<ClientLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    match limiter.check(client) {
        Ok(()) => next.run(request).await,
        Err(wait) => {
            debug!(%client, path = %request.uri().path(), ?wait, "rate limit exceeded");
            let mut response = ApiError::TooManyRequests.into_response();
            // Round up so a client honouring the header is let through
            let secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs.max(1)));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use serde_json::Value;
    use tower::ServiceExt;

    fn config(window_ms: u64, max_requests: u32) -> RateLimitConfig {
        RateLimitConfig {
            window: Duration::from_millis(window_ms),
            max_requests: NonZeroU32::new(max_requests).unwrap(),
        }
    }

    fn app(limiter: ClientLimiter) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(limiter, limit_requests))
    }

    fn from(ip: [u8; 4]) -> Request {
        axum::http::Request::builder()
            .uri("/")
            .extension(ConnectInfo(SocketAddr::from((ip, 40000))))
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_default_budget() {
        let config = RateLimitConfig::default();
        assert_eq!(config.window, Duration::from_secs(60));
        assert_eq!(config.max_requests.get(), 50);
    }

    #[test]
    fn test_budget_is_per_client() {
        let limiter = ClientLimiter::new(&config(60_000, 3)).unwrap();
        let alice: IpAddr = "10.0.0.1".parse().unwrap();
        let bob: IpAddr = "10.0.0.2".parse().unwrap();

        for _ in 0..3 {
            assert!(limiter.check(alice).is_ok());
        }
        let wait = limiter.check(alice).unwrap_err();

        assert!(wait <= Duration::from_secs(20), "wait was {:?}", wait);
        assert!(limiter.check(bob).is_ok(), "Other clients keep their own budget");
    }

    #[test]
    fn test_budget_refills_over_the_window() {
        let limiter = ClientLimiter::new(&config(100, 2)).unwrap();
        let client: IpAddr = "10.0.0.3".parse().unwrap();

        assert!(limiter.check(client).is_ok());
        assert!(limiter.check(client).is_ok());
        assert!(limiter.check(client).is_err());

        std::thread::sleep(Duration::from_millis(120));
        assert!(limiter.check(client).is_ok());
    }

    #[test]
    fn test_window_too_short_for_budget_is_rejected() {
        let result = ClientLimiter::new(&RateLimitConfig {
            window: Duration::from_nanos(10),
            max_requests: NonZeroU32::new(100).unwrap(),
        });
        assert!(matches!(result, Err(ServerError::InvalidRateLimit(_))));
    }

    #[tokio::test]
    async fn test_over_budget_requests_get_json_429() {
        let app = app(ClientLimiter::new(&config(60_000, 2)).unwrap());

        for _ in 0..2 {
            let response = app.clone().oneshot(from([192, 168, 1, 5])).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(from([192, 168, 1, 5])).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let retry_after: u64 = response.headers()[RETRY_AFTER].to_str().unwrap().parse().unwrap();
        assert!((1..=30).contains(&retry_after));

        let body: Value =
            serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
        assert_eq!(body["status"], 429);
        assert_eq!(body["error"], "Too many requests from this IP, please try again later.");

        let other = app.oneshot(from([192, 168, 1, 6])).await.unwrap();
        assert_eq!(other.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_requests_without_peer_address_share_a_bucket() {
        let app = app(ClientLimiter::new(&config(60_000, 1)).unwrap());
        let anonymous = || axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();

        assert_eq!(app.clone().oneshot(anonymous()).await.unwrap().status(), StatusCode::OK);
        assert_eq!(
            app.oneshot(anonymous()).await.unwrap().status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
