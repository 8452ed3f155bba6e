//! Campaign endpoints.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::SharedState;
use crate::error::{ApiResult, AppError};

#[derive(Debug, Deserialize)]
pub struct CreateCampaign {
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub targets: Vec<String>,
}

pub async fn create(
    State(state): State<SharedState>,
    body: Result<Json<CreateCampaign>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(req) = body?;
    let campaign = state.campaigns.create(req.program.trim(), req.targets).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "campaign": campaign })),
    ))
}

pub async fn list(State(state): State<SharedState>) -> ApiResult<Value> {
    let campaigns = state.campaigns.list().await?;
    Ok(Json(json!({
        "success": true,
        "count": campaigns.len(),
        "campaigns": campaigns,
    })))
}

pub async fn get(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Value> {
    let campaign = state.campaigns.get(&id).await?;
    Ok(Json(json!({ "success": true, "campaign": campaign })))
}

pub async fn advance(State(state): State<SharedState>, Path(id): Path<String>) -> ApiResult<Value> {
    let campaign = state.campaigns.advance(&id).await?;
    Ok(Json(json!({
        "success": true,
        "currentPhase": campaign.current_phase().map(|p| p.as_str()),
        "campaign": campaign,
    })))
}
