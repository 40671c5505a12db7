// Copyright 2024 Aegis Network Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Fixed-window rate limiting middleware, keyed by client IP.
//!
//! Protects only the request/response query surface: the counter budget is
//! `max-requests` per `window-seconds`, the counter resets at the window
//! boundary, and the push-based event path is not behind this layer.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use prometheus::core::{AtomicF64, GenericCounter};
use tower::{Layer, Service};

use aegis_relayer_config::RateLimitConfig;

/// One client's fixed window.
struct FixedWindow {
    window_start: Instant,
    count: u32,
}

/// Rate limiter state shared across requests.
pub struct RateLimitState {
    /// Per-IP window counters.
    windows: DashMap<IpAddr, FixedWindow>,
    /// Configuration.
    config: RateLimitConfig,
}

impl RateLimitState {
    /// Creates a fresh state with no tracked clients.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    fn window(&self) -> Duration {
        Duration::from_secs(self.config.window_seconds)
    }

    /// Check if a request from `ip` fits the current window budget.
    ///
    /// On rejection, returns how long until the window resets.
    pub fn check(&self, ip: IpAddr) -> Result<(), Duration> {
        let now = Instant::now();
        let window = self.window();
        let mut entry = self.windows.entry(ip).or_insert_with(|| {
            tracing::debug!(ip = %ip, "tracking new client window");
            FixedWindow {
                window_start: now,
                count: 0,
            }
        });
        let elapsed = now.duration_since(entry.window_start);
        if elapsed >= window {
            // the window boundary passed; the counter starts over
            entry.window_start = now;
            entry.count = 0;
        }
        if entry.count < self.config.max_requests {
            entry.count += 1;
            Ok(())
        } else {
            Err(window.saturating_sub(now.duration_since(entry.window_start)))
        }
    }

    /// Drop windows whose budget reset long ago (call periodically).
    pub fn cleanup(&self) {
        let now = Instant::now();
        let window = self.window();
        self.windows.retain(|ip, entry| {
            let stale = now.duration_since(entry.window_start) > window * 2;
            if stale {
                tracing::debug!(ip = %ip, "dropping stale client window");
            }
            !stale
        });
    }

    /// Number of tracked client IPs.
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// Rate limit layer for the query surface.
#[derive(Clone)]
pub struct RateLimitLayer {
    state: Arc<RateLimitState>,
    rejected: GenericCounter<AtomicF64>,
}

impl RateLimitLayer {
    /// Creates a new layer with the given budget; `rejected` counts the
    /// requests this layer turns away.
    pub fn new(
        config: RateLimitConfig,
        rejected: GenericCounter<AtomicF64>,
    ) -> Self {
        Self {
            state: Arc::new(RateLimitState::new(config)),
            rejected,
        }
    }

    /// The shared state, for the cleanup task.
    pub fn state(&self) -> Arc<RateLimitState> {
        Arc::clone(&self.state)
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            state: Arc::clone(&self.state),
            rejected: self.rejected.clone(),
        }
    }
}

/// Rate limit service wrapping the query routes.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    state: Arc<RateLimitState>,
    rejected: GenericCounter<AtomicF64>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<
            dyn std::future::Future<
                    Output = Result<Self::Response, Self::Error>,
                > + Send,
        >,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = Arc::clone(&self.state);
        let rejected = self.rejected.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let ip = extract_client_ip(&req);
            match state.check(ip) {
                Ok(()) => inner.call(req).await,
                Err(retry_after) => {
                    rejected.inc();
                    tracing::warn!(
                        ip = %ip,
                        retry_after_secs = retry_after.as_secs(),
                        "Rate limit exceeded"
                    );
                    Ok(rate_limit_response(retry_after))
                }
            }
        })
    }
}

/// Extract the client IP from a request.
fn extract_client_ip<B>(req: &Request<B>) -> IpAddr {
    // Try X-Forwarded-For header first (for proxied requests).
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // Take the first IP (original client).
            if let Some(first_ip) = forwarded_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    // Try X-Real-IP header.
    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(real_ip_str) = real_ip.to_str() {
            if let Ok(ip) = real_ip_str.parse::<IpAddr>() {
                return ip;
            }
        }
    }

    // Fall back to connection info.
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<SocketAddr>>()
    {
        return connect_info.0.ip();
    }

    IpAddr::from([127, 0, 0, 1])
}

/// Build the rejection response: HTTP 429 with a Retry-After hint.
fn rate_limit_response(retry_after: Duration) -> Response {
    let body = serde_json::json!({
        "error": "Too many requests, please try again later."
    });
    let mut response =
        (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(value) = retry_after.as_secs().max(1).to_string().parse() {
        response.headers_mut().insert("Retry-After", value);
    }
    response
}

/// Background task to clean up stale client windows.
pub async fn cleanup_task(state: Arc<RateLimitState>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval
        .set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        state.cleanup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn test_config(max_requests: u32, window_seconds: u64) -> RateLimitConfig {
        RateLimitConfig {
            max_requests,
            window_seconds,
        }
    }

    #[test]
    fn allows_the_full_budget_and_rejects_the_next() {
        let state = RateLimitState::new(test_config(100, 900));
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));

        for _ in 0..100 {
            assert!(state.check(ip).is_ok());
        }
        // the 101st request within the window is rejected
        let rejection = state.check(ip);
        assert!(rejection.is_err());
        assert!(rejection.unwrap_err() <= Duration::from_secs(900));
    }

    #[test]
    fn budgets_are_per_ip() {
        let state = RateLimitState::new(test_config(1, 900));
        let first = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2));
        let second = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 3));

        assert!(state.check(first).is_ok());
        assert!(state.check(first).is_err());
        assert!(state.check(second).is_ok());
    }

    #[test]
    fn window_boundary_resets_the_counter() {
        let state = RateLimitState::new(test_config(2, 1));
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 4));

        assert!(state.check(ip).is_ok());
        assert!(state.check(ip).is_ok());
        assert!(state.check(ip).is_err());

        std::thread::sleep(Duration::from_millis(1_100));
        assert!(state.check(ip).is_ok());
    }

    #[test]
    fn cleanup_drops_stale_windows() {
        let state = RateLimitState::new(test_config(10, 0));
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let _ = state.check(ip);
        assert_eq!(state.tracked_clients(), 1);

        std::thread::sleep(Duration::from_millis(10));
        state.cleanup();
        assert_eq!(state.tracked_clients(), 0);
    }

    #[test]
    fn forwarded_for_wins_over_connect_info() {
        let req = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            extract_client_ip(&req),
            "203.0.113.9".parse::<IpAddr>().unwrap()
        );
    }
}
