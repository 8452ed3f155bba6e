//! Submission records and their repository.
//!
//! Status moves QUEUED → SUBMITTED or QUEUED → FAILED; `attempts` counts
//! every platform call made for the record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{FieldError, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Queued,
    Submitted,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: Uuid,
    pub platform: String,
    pub report_data: serde_json::Value,
    pub status: SubmissionStatus,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn queued(platform: impl Into<String>, report_data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            platform: platform.into(),
            report_data,
            status: SubmissionStatus::Queued,
            attempts: 0,
            platform_reference: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let mut errors = BTreeMap::new();
        if self.platform.trim().is_empty() {
            errors.insert("platform".to_string(), FieldError::new("Platform is required"));
        }
        if !self.report_data.is_object() {
            errors.insert("reportData".to_string(), FieldError::new("Report data must be an object"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation { errors })
        }
    }
}

#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    async fn insert(&self, submission: Submission) -> Result<Submission, StoreError>;
    async fn get(&self, id: Uuid) -> Result<Submission, StoreError>;
    async fn update(&self, submission: Submission) -> Result<Submission, StoreError>;
    /// Newest first.
    async fn list(&self) -> Result<Vec<Submission>, StoreError>;
    async fn count(&self) -> usize;
}

#[derive(Default)]
pub struct InMemorySubmissions {
    inner: RwLock<HashMap<Uuid, Submission>>,
}

fn not_found(id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity: "submission",
        id: id.to_string(),
    }
}

#[async_trait]
impl SubmissionRepository for InMemorySubmissions {
    async fn insert(&self, submission: Submission) -> Result<Submission, StoreError> {
        submission.validate()?;
        let mut map = self.inner.write().await;
        if map.contains_key(&submission.id) {
            return Err(StoreError::DuplicateKey { field: "id".into() });
        }
        map.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn get(&self, id: Uuid) -> Result<Submission, StoreError> {
        self.inner.read().await.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn update(&self, mut submission: Submission) -> Result<Submission, StoreError> {
        submission.validate()?;
        submission.updated_at = Utc::now();
        let mut map = self.inner.write().await;
        match map.get_mut(&submission.id) {
            Some(slot) => {
                *slot = submission.clone();
                Ok(submission)
            }
            None => Err(not_found(submission.id)),
        }
    }

    async fn list(&self) -> Result<Vec<Submission>, StoreError> {
        let mut all: Vec<Submission> = self.inner.read().await.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn count(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_queue_and_fetch() {
        let repo = InMemorySubmissions::default();
        let s = repo
            .insert(Submission::queued("hackerone", json!({"title": "XSS"})))
            .await
            .unwrap();
        let fetched = repo.get(s.id).await.unwrap();
        assert_eq!(fetched.status, SubmissionStatus::Queued);
        assert_eq!(fetched.attempts, 0);
    }

    #[tokio::test]
    async fn test_validation_reports_every_field() {
        let repo = InMemorySubmissions::default();
        match repo.insert(Submission::queued(" ", json!("text"))).await {
            Err(StoreError::Validation { errors }) => {
                let keys: Vec<&str> = errors.keys().map(String::as_str).collect();
                assert_eq!(keys, vec!["platform", "reportData"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_and_missing() {
        let repo = InMemorySubmissions::default();
        let s = Submission::queued("bugcrowd", json!({}));
        repo.insert(s.clone()).await.unwrap();
        assert!(matches!(
            repo.insert(s).await,
            Err(StoreError::DuplicateKey { .. })
        ));
        assert!(matches!(
            repo.get(Uuid::new_v4()).await,
            Err(StoreError::NotFound { entity: "submission", .. })
        ));
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let repo = InMemorySubmissions::default();
        let mut older = Submission::queued("intigriti", json!({}));
        older.created_at = Utc::now() - chrono::Duration::minutes(5);
        let older = repo.insert(older).await.unwrap();
        let newer = repo.insert(Submission::queued("yeswehack", json!({}))).await.unwrap();

        let ids: Vec<Uuid> = repo.list().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }
}
