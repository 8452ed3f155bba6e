//! Scanning, discovery and platform submission endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::state::SharedState;
use crate::error::{parse_id, ApiResult, AppError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub scan_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DiscoverRequest {
    #[serde(default)]
    pub target: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRequest {
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub report_data: Value,
}

/// A bodiless request is an empty one; malformed JSON is still rejected.
fn body_or_default<T: Default>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    match body {
        Ok(Json(req)) => Ok(req),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(e) => Err(e.into()),
    }
}

fn required_target(target: Option<String>) -> Result<String, AppError> {
    match target.map(|t| t.trim().to_string()) {
        Some(t) if !t.is_empty() => Ok(t),
        _ => Err(AppError::Validation("Target is required".to_string())),
    }
}

pub async fn scan(
    State(state): State<SharedState>,
    body: Result<Json<ScanRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let req = body_or_default(body)?;
    let target = required_target(req.target)?;
    let scan_type = req.scan_type.unwrap_or_else(|| "full".to_string());

    let ticket = state.scanner.start_scan(&target, &scan_type).await?;
    Ok(Json(json!({
        "success": true,
        "scanId": ticket.scan_id,
        "status": ticket.status,
        "target": ticket.target,
    })))
}

pub async fn discover(
    State(state): State<SharedState>,
    body: Result<Json<DiscoverRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let req = body_or_default(body)?;
    let target = required_target(req.target)?;

    let vulnerabilities = state.discovery.discover(&target).await?;
    info!("[DISCOVERY] {} → {} findings", target, vulnerabilities.len());
    Ok(Json(json!({
        "success": true,
        "target": target,
        "count": vulnerabilities.len(),
        "vulnerabilities": vulnerabilities,
        "message": "AI vulnerability discovery completed",
    })))
}

/// Store the submission, answer 202 and send it to the platform in the
/// background.
pub async fn create_submission(
    State(state): State<SharedState>,
    body: Result<Json<SubmissionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(req) = body?;
    let submission = state.dispatcher.enqueue(&req.platform, req.report_data).await?;

    let dispatcher = state.dispatcher.clone();
    let id = submission.id;
    state.supervisor.spawn("submission-dispatch", async move {
        dispatcher.dispatch(id).await.map(|_| ())
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "success": true, "submission": submission })),
    ))
}

pub async fn list_submissions(State(state): State<SharedState>) -> ApiResult<Value> {
    let submissions = state.submissions.list().await?;
    Ok(Json(json!({
        "success": true,
        "count": submissions.len(),
        "submissions": submissions,
    })))
}

pub async fn get_submission(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Value> {
    let submission = state.submissions.get(parse_id(&id)?).await?;
    Ok(Json(json!({ "success": true, "submission": submission })))
}
