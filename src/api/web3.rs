//! Contract analysis, report generation and PoC scaffolding.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::state::SharedState;
use crate::error::{ApiResult, AppError};
use crate::findings::{AnalysisData, ContractData};
use crate::reporting::poc::{self, PocSpec};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub contract_address: String,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub contract_data: ContractData,
    pub analysis_data: AnalysisData,
}

pub async fn analyze(
    State(state): State<SharedState>,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = body?;
    let contract = ContractData {
        address: req.contract_address.trim().to_string(),
        network: req.network.unwrap_or_else(|| "ethereum".to_string()),
        name: req.name,
    };

    let analysis = state.analyzer.analyze(&contract).await?;
    Ok(Json(json!({ "success": true, "analysis": analysis })))
}

pub async fn report(
    State(state): State<SharedState>,
    body: Result<Json<ReportRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = body?;
    if req.contract_data.address.trim().is_empty() {
        return Err(AppError::Validation("contractData.address is required".to_string()));
    }

    let report = state.reports.generate(&req.contract_data, &req.analysis_data).await?;
    info!(
        "[REPORT] {} generated for {} ({} warnings)",
        report.report_id,
        req.contract_data.address,
        report.warnings.len()
    );
    let download_url = format!("/api/reports/download/{}", report.report_id);
    Ok(Json(json!({
        "success": true,
        "report": report,
        "downloadUrl": download_url,
    })))
}

pub async fn generate_poc(body: Result<Json<PocSpec>, JsonRejection>) -> ApiResult<Value> {
    let Json(spec) = body?;
    if spec.name.trim().is_empty() {
        return Err(AppError::Validation("PoC name is required".to_string()));
    }

    let project = poc::generate(&spec)?;
    Ok(Json(json!({
        "success": true,
        "name": spec.name,
        "paths": project.paths(),
        "files": project.files,
    })))
}
