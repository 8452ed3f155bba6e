//! Bug bounty platform clients
//!
//! Each platform is a plain authenticated REST endpoint. Submissions are
//! queued in the repository first and dispatched in the background with
//! exponential backoff on transient failures.

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Credentials, PlatformCredential};
use crate::error::StoreError;
use crate::store::submissions::{Submission, SubmissionRepository, SubmissionStatus};
use crate::telemetry::Metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    HackerOne,
    Bugcrowd,
    Intigriti,
    YesWeHack,
}

impl Platform {
    pub fn parse(raw: &str) -> Result<Self, PlatformError> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "hackerone" | "h1" => Ok(Self::HackerOne),
            "bugcrowd" => Ok(Self::Bugcrowd),
            "intigriti" => Ok(Self::Intigriti),
            "yeswehack" | "ywh" => Ok(Self::YesWeHack),
            _ => Err(PlatformError::UnknownPlatform(raw.to_string())),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::HackerOne => "hackerone",
            Self::Bugcrowd => "bugcrowd",
            Self::Intigriti => "intigriti",
            Self::YesWeHack => "yeswehack",
        }
    }

    pub fn api_base(&self) -> &'static str {
        match self {
            Self::HackerOne => "https://api.hackerone.com/v1",
            Self::Bugcrowd => "https://api.bugcrowd.com",
            Self::Intigriti => "https://api.intigriti.com/external/researcher/v1",
            Self::YesWeHack => "https://api.yeswehack.com",
        }
    }

    fn submit_path(&self) -> &'static str {
        match self {
            Self::HackerOne => "/hackers/reports",
            Self::Bugcrowd => "/submissions",
            Self::Intigriti => "/submissions",
            Self::YesWeHack => "/reports",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("unsupported platform: {0}")]
    UnknownPlatform(String),
    #[error("no credentials configured for {0}")]
    MissingCredentials(Platform),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{platform} rejected submission with HTTP {status}: {body}")]
    Rejected {
        platform: Platform,
        status: u16,
        body: String,
    },
}

impl PlatformError {
    /// Timeouts, connection errors, throttling and 5xx are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            Self::UnknownPlatform(_) | Self::MissingCredentials(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub reference: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformClient: Send + Sync {
    async fn submit(
        &self,
        platform: Platform,
        report: &serde_json::Value,
    ) -> Result<SubmissionReceipt, PlatformError>;
}

// ─── HTTP Client ─────────────────────────────────────────────────────────────

pub struct HttpPlatformClient {
    http: Client,
    credentials: Credentials,
}

impl HttpPlatformClient {
    pub fn new(credentials: Credentials, timeout: Duration) -> Result<Self, PlatformError> {
        Ok(Self {
            http: Client::builder()
                .timeout(timeout)
                .user_agent(concat!("bounty-forge/", env!("CARGO_PKG_VERSION")))
                .build()?,
            credentials,
        })
    }

    fn credential(&self, platform: Platform) -> Result<&PlatformCredential, PlatformError> {
        self.credentials
            .get(platform.key())
            .filter(|c| !c.api_token.is_empty())
            .ok_or(PlatformError::MissingCredentials(platform))
    }
}

/// Platform-assigned id, wherever the platform puts it.
fn extract_reference(body: &serde_json::Value) -> Option<String> {
    let id = body
        .get("id")
        .or_else(|| body.get("data").and_then(|d| d.get("id")))
        .or_else(|| body.get("reference"))?;
    match id {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn submit(
        &self,
        platform: Platform,
        report: &serde_json::Value,
    ) -> Result<SubmissionReceipt, PlatformError> {
        let cred = self.credential(platform)?;
        let base = cred.base_url.as_deref().unwrap_or(platform.api_base());
        let url = format!("{}{}", base.trim_end_matches('/'), platform.submit_path());

        let mut request = self.http.post(&url).json(report);
        request = if cred.api_username.is_empty() {
            request.bearer_auth(&cred.api_token)
        } else {
            request.basic_auth(&cred.api_username, Some(&cred.api_token))
        };

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Rejected {
                platform,
                status: status.as_u16(),
                body: body.chars().take(512).collect(),
            });
        }

        let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
        Ok(SubmissionReceipt {
            reference: extract_reference(&body).unwrap_or_else(|| "accepted".to_string()),
        })
    }
}

// ─── Dispatcher ──────────────────────────────────────────────────────────────

pub struct SubmissionDispatcher {
    client: Arc<dyn PlatformClient>,
    repo: Arc<dyn SubmissionRepository>,
    metrics: Arc<Metrics>,
    max_retries: usize,
    min_delay: Duration,
}

impl SubmissionDispatcher {
    pub fn new(
        client: Arc<dyn PlatformClient>,
        repo: Arc<dyn SubmissionRepository>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            client,
            repo,
            metrics,
            max_retries: 3,
            min_delay: Duration::from_secs(1),
        }
    }

    pub fn with_backoff(mut self, max_retries: usize, min_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.min_delay = min_delay;
        self
    }

    /// Queue a submission. Fails on unknown platforms before anything is stored.
    pub async fn enqueue(&self, platform: &str, report_data: serde_json::Value) -> Result<Submission, QueueError> {
        let platform = Platform::parse(platform)?;
        Ok(self.repo.insert(Submission::queued(platform.key(), report_data)).await?)
    }

    /// Send one queued submission and record the outcome on the record.
    /// Platform failures end up in `status`/`last_error`; only repository
    /// failures are returned.
    pub async fn dispatch(&self, id: Uuid) -> Result<Submission, StoreError> {
        let mut submission = self.repo.get(id).await?;
        if submission.status != SubmissionStatus::Queued {
            return Ok(submission);
        }

        let attempts = AtomicU32::new(0);
        let outcome = match Platform::parse(&submission.platform) {
            Ok(platform) => {
                let report = &submission.report_data;
                let client = &self.client;
                let attempts = &attempts;
                (move || async move {
                    attempts.fetch_add(1, Ordering::Relaxed);
                    client.submit(platform, report).await
                })
                .retry(
                    &ExponentialBuilder::default()
                        .with_min_delay(self.min_delay)
                        .with_max_times(self.max_retries),
                )
                .when(|e: &PlatformError| e.is_retryable())
                .notify(|e: &PlatformError, wait: Duration| {
                    warn!("[SUBMIT] {} retrying in {:?}: {}", id, wait, e);
                })
                .await
            }
            Err(e) => Err(e),
        };

        submission.attempts += attempts.load(Ordering::Relaxed);
        match outcome {
            Ok(receipt) => {
                info!(
                    "[SUBMIT] {} accepted by {} as {}",
                    id, submission.platform, receipt.reference
                );
                submission.status = SubmissionStatus::Submitted;
                submission.platform_reference = Some(receipt.reference);
                submission.last_error = None;
            }
            Err(e) => {
                warn!("[SUBMIT] {} to {} failed: {}", id, submission.platform, e);
                submission.status = SubmissionStatus::Failed;
                submission.last_error = Some(e.to_string());
            }
        }
        let outcome_label = match submission.status {
            SubmissionStatus::Submitted => "submitted",
            _ => "failed",
        };
        self.metrics
            .submissions
            .with_label_values(&[submission.platform.as_str(), outcome_label])
            .inc();

        self.repo.update(submission).await
    }
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::submissions::InMemorySubmissions;
    use serde_json::json;

    fn dispatcher(client: MockPlatformClient) -> (SubmissionDispatcher, Arc<InMemorySubmissions>) {
        let repo = Arc::new(InMemorySubmissions::default());
        let d = SubmissionDispatcher::new(Arc::new(client), repo.clone(), Arc::new(Metrics::new().unwrap()))
            .with_backoff(3, Duration::from_millis(1));
        (d, repo)
    }

    #[test]
    fn test_platform_parsing() {
        assert_eq!(Platform::parse("HackerOne").unwrap(), Platform::HackerOne);
        assert_eq!(Platform::parse("yes-we-hack").unwrap(), Platform::YesWeHack);
        assert!(matches!(
            Platform::parse("hackerzero"),
            Err(PlatformError::UnknownPlatform(_))
        ));
    }

    #[test]
    fn test_retryable_classification() {
        let rejected = |status| PlatformError::Rejected {
            platform: Platform::Bugcrowd,
            status,
            body: String::new(),
        };
        assert!(rejected(503).is_retryable());
        assert!(rejected(429).is_retryable());
        assert!(!rejected(422).is_retryable());
        assert!(!PlatformError::MissingCredentials(Platform::Intigriti).is_retryable());
    }

    #[test]
    fn test_extract_reference() {
        assert_eq!(extract_reference(&json!({"id": 42})), Some("42".into()));
        assert_eq!(extract_reference(&json!({"data": {"id": "r-1"}})), Some("r-1".into()));
        assert_eq!(extract_reference(&json!({})), None);
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let mut client = MockPlatformClient::new();
        client
            .expect_submit()
            .times(1)
            .returning(|_, _| Ok(SubmissionReceipt { reference: "H1-77".into() }));
        let (d, _repo) = dispatcher(client);

        let queued = d.enqueue("hackerone", json!({"title": "IDOR"})).await.unwrap();
        let done = d.dispatch(queued.id).await.unwrap();
        assert_eq!(done.status, SubmissionStatus::Submitted);
        assert_eq!(done.platform_reference.as_deref(), Some("H1-77"));
        assert_eq!(done.attempts, 1);
    }

    #[tokio::test]
    async fn test_dispatch_retries_transient_then_succeeds() {
        let mut client = MockPlatformClient::new();
        let mut calls = 0;
        client.expect_submit().times(3).returning(move |platform, _| {
            calls += 1;
            if calls < 3 {
                Err(PlatformError::Rejected {
                    platform,
                    status: 502,
                    body: "bad gateway".into(),
                })
            } else {
                Ok(SubmissionReceipt { reference: "BC-1".into() })
            }
        });
        let (d, _repo) = dispatcher(client);

        let queued = d.enqueue("bugcrowd", json!({})).await.unwrap();
        let done = d.dispatch(queued.id).await.unwrap();
        assert_eq!(done.status, SubmissionStatus::Submitted);
        assert_eq!(done.attempts, 3);
    }

    #[tokio::test]
    async fn test_dispatch_permanent_failure_is_recorded() {
        let mut client = MockPlatformClient::new();
        client
            .expect_submit()
            .times(1)
            .returning(|p, _| Err(PlatformError::MissingCredentials(p)));
        let (d, repo) = dispatcher(client);

        let queued = d.enqueue("intigriti", json!({})).await.unwrap();
        let done = d.dispatch(queued.id).await.unwrap();
        assert_eq!(done.status, SubmissionStatus::Failed);
        assert_eq!(done.attempts, 1);
        assert!(done.last_error.unwrap().contains("no credentials"));
        assert_eq!(repo.get(queued.id).await.unwrap().status, SubmissionStatus::Failed);
    }

    #[tokio::test]
    async fn test_enqueue_unknown_platform() {
        let (d, repo) = dispatcher(MockPlatformClient::new());
        assert!(matches!(
            d.enqueue("myspace", json!({})).await,
            Err(QueueError::Platform(PlatformError::UnknownPlatform(_)))
        ));
        assert_eq!(repo.count().await, 0);
    }

    #[tokio::test]
    async fn test_http_client_requires_credentials() {
        let client = HttpPlatformClient::new(Credentials::new(), Duration::from_secs(1)).unwrap();
        assert!(matches!(
            client.submit(Platform::HackerOne, &json!({})).await,
            Err(PlatformError::MissingCredentials(Platform::HackerOne))
        ));
    }
}
