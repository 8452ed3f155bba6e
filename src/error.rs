//! Error taxonomy and the HTTP error envelope.
//!
//! Every failure leaving a handler becomes `{success: false, error, details?}`.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;

use crate::engines::EngineError;
use crate::platforms::{PlatformError, QueueError};
use crate::reporting::poc::PocError;
use crate::reporting::service::ReportError;
use crate::web3::analysis::AnalysisError;
use crate::web3::rpc::RpcError;
use crate::workflow::WorkflowError;

// ─── Store Errors ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub message: String,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("validation failed on {} field(s)", .errors.len())]
    Validation { errors: BTreeMap<String, FieldError> },
    #[error("duplicate key on {field}")]
    DuplicateKey { field: String },
    #[error("invalid {path}: {value}")]
    Cast { path: String, value: String },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
}

/// Record ids are UUIDs; anything else is a cast error on `id`.
pub fn parse_id(raw: &str) -> Result<uuid::Uuid, StoreError> {
    uuid::Uuid::parse_str(raw.trim()).map_err(|_| StoreError::Cast {
        path: "id".to_string(),
        value: raw.to_string(),
    })
}

// ─── Application Errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<Json<T>, AppError>;

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
}

impl AppError {
    fn parts(&self) -> (StatusCode, String, Option<Vec<String>>) {
        match self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            Self::Store(StoreError::Validation { errors }) => (
                StatusCode::BAD_REQUEST,
                "Validation Error".to_string(),
                Some(errors.values().map(|e| e.message.clone()).collect()),
            ),
            Self::Store(StoreError::DuplicateKey { field }) => (
                StatusCode::BAD_REQUEST,
                format!("Duplicate field value: {}", field),
                None,
            ),
            Self::Store(StoreError::Cast { path, value }) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid {}: {}", path, value),
                None,
            ),
            Self::Store(e @ StoreError::NotFound { .. }) => (StatusCode::NOT_FOUND, e.to_string(), None),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone(), None),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, details) = self.parts();
        if status.is_server_error() {
            error!("[API] {}", message);
        }
        let body = ErrorBody {
            success: false,
            error: message,
            details,
        };
        (status, Json(body)).into_response()
    }
}

// ─── Conversions ─────────────────────────────────────────────────────────────

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<ReportError> for AppError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::InvalidId(_) => Self::Validation(e.to_string()),
            ReportError::NotFound(_) => Self::NotFound(e.to_string()),
            ReportError::Io { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl From<AnalysisError> for AppError {
    fn from(e: AnalysisError) -> Self {
        match e {
            AnalysisError::MissingAddress
            | AnalysisError::NotAContract(_)
            | AnalysisError::Rpc(RpcError::InvalidAddress(_)) => Self::Validation(e.to_string()),
            AnalysisError::Rpc(_) => Self::Internal(e.to_string()),
        }
    }
}

impl From<PocError> for AppError {
    fn from(e: PocError) -> Self {
        match e {
            PocError::AlreadyExists(_) | PocError::InvalidField { .. } => Self::Validation(e.to_string()),
            PocError::UnresolvedPlaceholder { .. } | PocError::Io { .. } => Self::Internal(e.to_string()),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<PlatformError> for AppError {
    fn from(e: PlatformError) -> Self {
        match e {
            PlatformError::UnknownPlatform(_) | PlatformError::MissingCredentials(_) => {
                Self::Validation(e.to_string())
            }
            _ => Self::Internal(e.to_string()),
        }
    }
}

impl From<QueueError> for AppError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Platform(p) => p.into(),
            QueueError::Store(s) => Self::Store(s),
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::Store(store) => Self::Store(store),
            WorkflowError::AlreadyCompleted(_) => Self::Validation(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_details_follow_key_order() {
        let mut errors = BTreeMap::new();
        errors.insert("targets".to_string(), FieldError::new("At least one target is required"));
        errors.insert("program".to_string(), FieldError::new("Program is required"));

        let (status, body) = body_of(StoreError::Validation { errors }.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Validation Error");
        assert_eq!(
            body["details"],
            serde_json::json!(["Program is required", "At least one target is required"])
        );
    }

    #[tokio::test]
    async fn test_duplicate_key_names_field() {
        let (status, body) = body_of(StoreError::DuplicateKey { field: "id".into() }.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Duplicate field value: id");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_cast_and_not_found() {
        let (status, body) = body_of(
            StoreError::Cast {
                path: "id".into(),
                value: "abc".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid id: abc");

        let (status, _) = body_of(
            StoreError::NotFound {
                entity: "campaign",
                id: "x".into(),
            }
            .into(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_internal_is_500() {
        let (status, body) = body_of(AppError::Internal("disk full".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "disk full");
    }

    #[test]
    fn test_parse_id() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
        assert_eq!(
            parse_id("42"),
            Err(StoreError::Cast {
                path: "id".into(),
                value: "42".into()
            })
        );
    }

    #[test]
    fn test_report_error_mapping() {
        assert!(matches!(
            AppError::from(ReportError::InvalidId("../x".into())),
            AppError::Validation(_)
        ));
        assert!(matches!(
            AppError::from(ReportError::NotFound("web3_1".into())),
            AppError::NotFound(_)
        ));
    }
}
