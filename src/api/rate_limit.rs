//! Per-IP token bucket rate limiting for `/api` routes.

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    requests_per_second: f64,
    burst: u32,
    buckets: Mutex<HashMap<IpAddr, TokenBucket>>,
}

impl RateLimiter {
    pub fn new(requests_per_second: u32, burst: u32) -> Self {
        Self {
            requests_per_second: requests_per_second as f64,
            burst: burst.max(1),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for `ip`. `false` means the request is over the limit.
    pub fn check(&self, ip: IpAddr) -> bool {
        let Ok(mut buckets) = self.buckets.lock() else {
            // poisoned: fail open
            return true;
        };

        let now = Instant::now();
        let bucket = buckets.entry(ip).or_insert(TokenBucket {
            tokens: self.burst as f64,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.requests_per_second).min(self.burst as f64);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Drop buckets idle for longer than `max_idle`. Returns how many remain.
    pub fn prune(&self, max_idle: Duration) -> usize {
        match self.buckets.lock() {
            Ok(mut buckets) => {
                let now = Instant::now();
                buckets.retain(|_, b| now.duration_since(b.last_refill) < max_idle);
                buckets.len()
            }
            Err(_) => 0,
        }
    }
}

pub async fn limit(State(limiter): State<Arc<RateLimiter>>, req: Request, next: Next) -> Response {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    if !limiter.check(ip) {
        warn!("[RATE] {} over limit on {}", ip, req.uri().path());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "success": false,
                "error": "Too many requests, please try again later."
            })),
        )
            .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_then_reject() {
        let limiter = RateLimiter::new(0, 3);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(limiter.check(ip));
        assert!(!limiter.check(ip));

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert!(limiter.check(other), "buckets are per IP");
    }

    #[test]
    fn test_refill() {
        let limiter = RateLimiter::new(1000, 1);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(limiter.check(ip));
        std::thread::sleep(Duration::from_millis(10));
        assert!(limiter.check(ip));
    }

    #[test]
    fn test_prune() {
        let limiter = RateLimiter::new(1, 1);
        limiter.check("10.0.0.1".parse().unwrap());
        assert_eq!(limiter.prune(Duration::from_secs(60)), 1);
        assert_eq!(limiter.prune(Duration::ZERO), 0);
    }
}
