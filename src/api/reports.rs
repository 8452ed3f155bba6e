//! Report listing and download.

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::{json, Value};

use super::state::SharedState;
use crate::error::{ApiResult, AppError};
use crate::reporting::service::ReportError;

pub async fn list(State(state): State<SharedState>) -> ApiResult<Value> {
    let reports = state.reports.list_reports().await?;
    Ok(Json(json!({
        "success": true,
        "count": reports.len(),
        "reports": reports,
    })))
}

pub async fn download(
    State(state): State<SharedState>,
    Path(report_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let path = state.reports.report_html_path(&report_id)?;
    let html = tokio::fs::read(&path).await.map_err(|source| ReportError::Io {
        path: path.clone(),
        source,
    })?;

    let disposition = format!("attachment; filename=\"security_report_{}.html\"", report_id);
    Ok((
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        html,
    ))
}
