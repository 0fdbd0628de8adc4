//! Per-client rate limiting middleware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::config::RateLimitConfig;
use crate::http::response::ApiError;
use crate::lifecycle::shutdown;
use crate::observability::metrics;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, now: Instant) -> Self {
        Self {
            tokens: capacity,
            last_update: now,
        }
    }

    /// Whether the bucket would be back at `capacity` by `now`.
    fn is_full(&self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens + elapsed * refill_rate >= capacity
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Token buckets keyed by client.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<String, TokenBucket>,
    rps: f64,
    burst: f64,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            rps: f64::from(config.requests_per_second),
            burst: f64::from(config.burst_size),
        }
    }

    /// Take one token for `key`; false when the bucket is empty.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> bool {
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.burst, now));
        bucket.try_acquire(self.burst, self.rps, now)
    }

    /// Drop buckets that have refilled completely.
    ///
    /// A full bucket behaves exactly like a fresh one, so forgetting it
    /// changes no client's allowance.
    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    fn prune_at(&self, now: Instant) -> usize {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| !bucket.is_full(self.burst, self.rps, now));
        before.saturating_sub(self.buckets.len())
    }

    /// Prune every `every` until `shutdown_rx` fires.
    pub async fn prune_periodically(
        self: Arc<Self>,
        every: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let stop = shutdown::wait(shutdown_rx);
        tokio::pin!(stop);

        loop {
            tokio::select! {
                _ = &mut stop => break,
                _ = ticker.tick() => {
                    let evicted = self.prune();
                    if evicted > 0 {
                        tracing::debug!(evicted, tracked = self.tracked_clients(), "Pruned idle rate-limit buckets");
                    }
                }
            }
        }
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Middleware rejecting clients that exceed their bucket with 429.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if limiter.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::record_rate_limited();
        ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            "Rate limit exceeded",
        )
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn limiter(rps: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst_size: burst,
        })
    }

    #[test]
    fn burst_then_reject() {
        let limiter = limiter(1, 3);
        let now = Instant::now();
        assert!(limiter.check_at("a", now));
        assert!(limiter.check_at("a", now));
        assert!(limiter.check_at("a", now));
        assert!(!limiter.check_at("a", now));
    }

    #[test]
    fn refills_over_time() {
        let limiter = limiter(10, 1);
        let now = Instant::now();
        assert!(limiter.check_at("a", now));
        assert!(!limiter.check_at("a", now));
        assert!(limiter.check_at("a", now + Duration::from_millis(150)));
    }

    #[test]
    fn clients_are_independent() {
        let limiter = limiter(1, 1);
        let now = Instant::now();
        assert!(limiter.check_at("a", now));
        assert!(limiter.check_at("b", now));
        assert!(!limiter.check_at("a", now));
        assert_eq!(limiter.tracked_clients(), 2);
    }

    #[test]
    fn prune_forgets_only_refilled_buckets() {
        let limiter = limiter(10, 2);
        let now = Instant::now();
        assert!(limiter.check_at("idle", now));
        assert!(limiter.check_at("busy", now));
        assert!(limiter.check_at("busy", now));

        // "idle" needs 0.1s to refill one token, "busy" needs 0.2s for two.
        assert_eq!(limiter.prune_at(now + Duration::from_millis(150)), 1);
        assert_eq!(limiter.tracked_clients(), 1);

        // The surviving bucket keeps its partial state.
        let later = now + Duration::from_millis(150);
        assert!(limiter.check_at("busy", later));
        assert!(!limiter.check_at("busy", later));
    }

    #[tokio::test]
    async fn periodic_pruning_stops_on_shutdown() {
        let limiter = Arc::new(limiter(1000, 1));
        assert!(limiter.check("a"));

        let shutdown = crate::lifecycle::Shutdown::new();
        let task = tokio::spawn(Arc::clone(&limiter).prune_periodically(
            Duration::from_millis(10),
            shutdown.subscribe(),
        ));

        let deadline = Instant::now() + Duration::from_secs(5);
        while limiter.tracked_clients() > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(limiter.tracked_clients(), 0);

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
