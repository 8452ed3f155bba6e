//! External capability seams
//!
//! Discovery and scanning are provided by outside services. The defaults
//! here make no detection claims: discovery reports nothing and scans are
//! only queued.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::findings::Vulnerability;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{0} engine is unavailable")]
    Unavailable(&'static str),
    #[error("engine failed: {0}")]
    Failed(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VulnerabilityDiscovery: Send + Sync {
    async fn discover(&self, target: &str) -> Result<Vec<Vulnerability>, EngineError>;
}

/// Discovery backend with no detectors.
pub struct NullDiscovery;

#[async_trait]
impl VulnerabilityDiscovery for NullDiscovery {
    async fn discover(&self, target: &str) -> Result<Vec<Vulnerability>, EngineError> {
        info!("[DISCOVERY] {}: no detectors configured", target);
        Ok(Vec::new())
    }
}

// ─── Scanning ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTicket {
    pub scan_id: String,
    pub status: String,
    pub target: String,
    pub scan_type: String,
    pub queued_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TargetScanner: Send + Sync {
    async fn start_scan(&self, target: &str, scan_type: &str) -> Result<ScanTicket, EngineError>;

    /// Scans accepted since start.
    fn queued(&self) -> usize;
}

#[derive(Default)]
pub struct QueuedScanner {
    accepted: AtomicUsize,
}

#[async_trait]
impl TargetScanner for QueuedScanner {
    async fn start_scan(&self, target: &str, scan_type: &str) -> Result<ScanTicket, EngineError> {
        let ticket = ScanTicket {
            scan_id: Uuid::new_v4().to_string(),
            status: "initiated".to_string(),
            target: target.to_string(),
            scan_type: scan_type.to_string(),
            queued_at: Utc::now(),
        };
        self.accepted.fetch_add(1, Ordering::Relaxed);
        info!("[SCAN] {} queued ({}) as {}", target, scan_type, ticket.scan_id);
        Ok(ticket)
    }

    fn queued(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_discovery_is_empty() {
        assert!(NullDiscovery.discover("example.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_queued_scanner_issues_unique_tickets() {
        let scanner = QueuedScanner::default();
        let a = scanner.start_scan("a.com", "full").await.unwrap();
        let b = scanner.start_scan("b.com", "quick").await.unwrap();
        assert_eq!(a.status, "initiated");
        assert_ne!(a.scan_id, b.scan_id);
        assert!(Uuid::parse_str(&a.scan_id).is_ok());
        assert_eq!(scanner.queued(), 2);
    }
}
