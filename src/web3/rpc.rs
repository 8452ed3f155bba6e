//! RPC Pool - round-robin JSON-RPC endpoints per network with backoff
//!
//!   - Round-robin rotation across the available endpoints of a network
//!   - Exponential backoff on failure (1s → 2s → 4s → 8s → 16s max)
//!   - Five consecutive failures mark an endpoint unhealthy until the next
//!     health check succeeds
//!   - Latency tracked as an exponential moving average

use ethers::prelude::*;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::explorer::Network;

const MAX_BACKOFF_EXP: u32 = 4;
const UNHEALTHY_AFTER: u32 = 5;

// ─── Endpoint ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Endpoint {
    pub url: String,
    pub network: Network,
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub backoff_until: Option<chrono::DateTime<chrono::Utc>>,
    pub avg_latency_ms: u64,
}

impl Endpoint {
    pub fn new(url: &str, network: Network) -> Self {
        Self {
            url: url.to_string(),
            network,
            healthy: true,
            consecutive_failures: 0,
            backoff_until: None,
            avg_latency_ms: 0,
        }
    }

    /// Wait after the latest failure: 1s for the first, doubling to 16s.
    fn backoff_seconds(&self) -> u64 {
        let exp = self.consecutive_failures.saturating_sub(1).min(MAX_BACKOFF_EXP);
        2u64.pow(exp)
    }

    fn mark_failure(&mut self) {
        self.consecutive_failures += 1;
        self.backoff_until =
            Some(chrono::Utc::now() + chrono::Duration::seconds(self.backoff_seconds() as i64));
        if self.consecutive_failures >= UNHEALTHY_AFTER {
            self.healthy = false;
        }
    }

    fn mark_success(&mut self, latency_ms: u64) {
        self.consecutive_failures = 0;
        self.healthy = true;
        self.backoff_until = None;
        self.avg_latency_ms = if self.avg_latency_ms == 0 {
            latency_ms
        } else {
            (self.avg_latency_ms * 7 + latency_ms * 3) / 10
        };
    }

    fn is_available(&self) -> bool {
        self.healthy
            && self
                .backoff_until
                .map_or(true, |until| chrono::Utc::now() > until)
    }
}

/// Free public endpoints, two per network.
pub fn default_endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::new("https://ethereum-rpc.publicnode.com", Network::Ethereum),
        Endpoint::new("https://1rpc.io/eth", Network::Ethereum),
        Endpoint::new("https://bsc-rpc.publicnode.com", Network::Bsc),
        Endpoint::new("https://1rpc.io/bnb", Network::Bsc),
        Endpoint::new("https://polygon-bor-rpc.publicnode.com", Network::Polygon),
        Endpoint::new("https://polygon-rpc.com", Network::Polygon),
        Endpoint::new("https://arb1.arbitrum.io/rpc", Network::Arbitrum),
        Endpoint::new("https://arbitrum-one-rpc.publicnode.com", Network::Arbitrum),
        Endpoint::new("https://mainnet.optimism.io", Network::Optimism),
        Endpoint::new("https://optimism-rpc.publicnode.com", Network::Optimism),
        Endpoint::new("https://mainnet.base.org", Network::Base),
        Endpoint::new("https://base-rpc.publicnode.com", Network::Base),
        Endpoint::new("https://api.avax.network/ext/bc/C/rpc", Network::Avalanche),
        Endpoint::new("https://avalanche-c-chain-rpc.publicnode.com", Network::Avalanche),
        Endpoint::new("https://rpc.ftm.tools", Network::Fantom),
        Endpoint::new("https://fantom-rpc.publicnode.com", Network::Fantom),
    ]
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("no available RPC endpoint for {0}")]
    NoEndpoint(Network),
    #[error("invalid address {0}")]
    InvalidAddress(String),
    #[error("all {attempts} RPC attempts failed on {network}: {last_error}")]
    Exhausted {
        network: Network,
        attempts: usize,
        last_error: String,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

// ─── Pool ────────────────────────────────────────────────────────────────────

pub struct RpcPool {
    endpoints: RwLock<Vec<Endpoint>>,
    cursors: HashMap<Network, AtomicUsize>,
    http_client: Client,
}

impl RpcPool {
    pub fn new(timeout: Duration) -> Result<Self, RpcError> {
        Self::with_endpoints(default_endpoints(), timeout)
    }

    pub fn with_endpoints(endpoints: Vec<Endpoint>, timeout: Duration) -> Result<Self, RpcError> {
        let mut cursors = HashMap::new();
        for ep in &endpoints {
            cursors.entry(ep.network).or_insert_with(|| AtomicUsize::new(0));
        }
        Ok(Self {
            endpoints: RwLock::new(endpoints),
            cursors,
            http_client: Client::builder().timeout(timeout).build()?,
        })
    }

    pub async fn health_summary(&self) -> (usize, usize) {
        let eps = self.endpoints.read().await;
        let healthy = eps.iter().filter(|e| e.is_available()).count();
        (healthy, eps.len())
    }

    /// Next available URL for a network, round-robin.
    pub async fn next_url(&self, network: Network) -> Result<String, RpcError> {
        let eps = self.endpoints.read().await;
        let available: Vec<&Endpoint> = eps
            .iter()
            .filter(|ep| ep.network == network && ep.is_available())
            .collect();

        let cursor = self
            .cursors
            .get(&network)
            .ok_or(RpcError::NoEndpoint(network))?;
        if available.is_empty() {
            return Err(RpcError::NoEndpoint(network));
        }

        let idx = cursor.fetch_add(1, Ordering::Relaxed) % available.len();
        Ok(available[idx].url.clone())
    }

    /// Deployed bytecode at `address`, rotating endpoints on failure.
    pub async fn fetch_code(&self, network: Network, address: &str) -> Result<Vec<u8>, RpcError> {
        let addr: Address = address
            .trim()
            .parse()
            .map_err(|_| RpcError::InvalidAddress(address.to_string()))?;

        let attempts = {
            let eps = self.endpoints.read().await;
            eps.iter().filter(|ep| ep.network == network).count().max(1)
        };
        let mut last_error = String::from("no endpoint tried");

        for attempt in 0..attempts {
            let url = match self.next_url(network).await {
                Ok(url) => url,
                Err(e) => {
                    last_error = e.to_string();
                    break;
                }
            };

            let start = std::time::Instant::now();
            let result = match Provider::<Http>::try_from(url.as_str()) {
                Ok(provider) => provider.get_code(addr, None).await.map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            };

            match result {
                Ok(code) => {
                    self.mark_success(&url, start.elapsed().as_millis() as u64).await;
                    debug!("[RPC] eth_getCode {} on {} via {}", address, network, url);
                    return Ok(code.to_vec());
                }
                Err(e) => {
                    warn!(
                        "[RPC] eth_getCode failed on {} (attempt {}/{}): {}",
                        url,
                        attempt + 1,
                        attempts,
                        e
                    );
                    self.mark_failure(&url).await;
                    last_error = e;
                }
            }
        }

        Err(RpcError::Exhausted {
            network,
            attempts,
            last_error,
        })
    }

    async fn mark_success(&self, url: &str, latency_ms: u64) {
        let mut eps = self.endpoints.write().await;
        if let Some(ep) = eps.iter_mut().find(|ep| ep.url == url) {
            ep.mark_success(latency_ms);
        }
    }

    async fn mark_failure(&self, url: &str) {
        let mut eps = self.endpoints.write().await;
        if let Some(ep) = eps.iter_mut().find(|ep| ep.url == url) {
            ep.mark_failure();
            warn!(
                "[RPC] {} backing off {}s ({} consecutive failures)",
                url,
                ep.backoff_seconds(),
                ep.consecutive_failures
            );
        }
    }

    /// Ping every endpoint with `eth_blockNumber`; returns the healthy count.
    pub async fn health_check_all(&self) -> usize {
        let urls: Vec<String> = self
            .endpoints
            .read()
            .await
            .iter()
            .map(|ep| ep.url.clone())
            .collect();

        let mut healthy_count = 0;
        for url in urls {
            let start = std::time::Instant::now();
            let healthy = self.ping(&url).await;
            let mut eps = self.endpoints.write().await;
            if let Some(ep) = eps.iter_mut().find(|ep| ep.url == url) {
                if healthy {
                    if !ep.healthy {
                        info!("[RPC] {} recovered", url);
                    }
                    ep.mark_success(start.elapsed().as_millis() as u64);
                    healthy_count += 1;
                } else {
                    ep.healthy = false;
                    warn!("[RPC] {} health check failed", url);
                }
            }
        }
        healthy_count
    }

    async fn ping(&self, url: &str) -> bool {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "eth_blockNumber",
            "params": [],
            "id": 1
        });
        match self.http_client.post(url).json(&body).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_network_has_endpoints() {
        let eps = default_endpoints();
        for network in Network::all() {
            let count = eps.iter().filter(|e| e.network == network).count();
            assert!(count >= 2, "{} should have at least 2 endpoints", network);
        }
    }

    #[test]
    fn test_exponential_backoff_capped() {
        let mut ep = Endpoint::new("http://test", Network::Ethereum);
        for secs in [1, 2, 4, 8, 16, 16] {
            let before = chrono::Utc::now();
            ep.mark_failure();
            assert_eq!(ep.backoff_seconds(), secs);
            let wait = ep.backoff_until.unwrap() - before;
            assert!(wait >= chrono::Duration::seconds(secs as i64));
            assert!(wait < chrono::Duration::seconds(secs as i64 + 1));
        }
        ep.consecutive_failures = 10;
        assert_eq!(ep.backoff_seconds(), 16);
    }

    #[test]
    fn test_five_failures_mark_unhealthy() {
        let mut ep = Endpoint::new("http://test", Network::Ethereum);
        for _ in 0..4 {
            ep.mark_failure();
        }
        assert!(ep.healthy);
        assert!(!ep.is_available(), "backing off endpoint is not available");

        ep.mark_failure();
        assert!(!ep.healthy);
    }

    #[test]
    fn test_success_resets_and_tracks_latency() {
        let mut ep = Endpoint::new("http://test", Network::Base);
        ep.mark_failure();
        ep.mark_success(100);
        assert_eq!(ep.consecutive_failures, 0);
        assert!(ep.is_available());
        assert_eq!(ep.avg_latency_ms, 100);

        ep.mark_success(200);
        assert_eq!(ep.avg_latency_ms, 130);
    }

    #[tokio::test]
    async fn test_round_robin_rotation() {
        let pool = RpcPool::with_endpoints(
            vec![
                Endpoint::new("http://a", Network::Ethereum),
                Endpoint::new("http://b", Network::Ethereum),
                Endpoint::new("http://c", Network::Base),
            ],
            Duration::from_secs(1),
        )
        .unwrap();

        let first = pool.next_url(Network::Ethereum).await.unwrap();
        let second = pool.next_url(Network::Ethereum).await.unwrap();
        let third = pool.next_url(Network::Ethereum).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(first, third);
        assert_eq!(pool.next_url(Network::Base).await.unwrap(), "http://c");
        assert!(matches!(
            pool.next_url(Network::Fantom).await,
            Err(RpcError::NoEndpoint(Network::Fantom))
        ));
    }

    #[tokio::test]
    async fn test_invalid_address_rejected_before_network() {
        let pool = RpcPool::with_endpoints(vec![], Duration::from_secs(1)).unwrap();
        let err = pool.fetch_code(Network::Ethereum, "not-an-address").await.unwrap_err();
        assert!(matches!(err, RpcError::InvalidAddress(_)));
    }
}
