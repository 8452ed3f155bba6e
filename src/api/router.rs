//! HTTP surface: routes, middleware stack, static client fallback.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::state::SharedState;
use super::{bugbounty, rate_limit, reports, web3, workflows, ws};
use crate::config::Settings;
use crate::telemetry::Metrics;

async fn health() -> &'static str {
    "OK"
}

async fn status(State(state): State<SharedState>) -> Json<Value> {
    let (rpc_healthy, rpc_total) = state.rpc.health_summary().await;
    Json(json!({
        "success": true,
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.settings.app_env,
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "campaigns": state.campaigns.repository().count().await,
        "submissions": state.submissions.count().await,
        "scansQueued": state.scanner.queued(),
        "rpcHealthy": rpc_healthy,
        "rpcTotal": rpc_total,
    }))
}

async fn metrics(State(state): State<SharedState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn count_requests(State(metrics): State<Arc<Metrics>>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;
    metrics
        .http_requests
        .with_label_values(&[method.as_str(), response.status().as_str()])
        .inc();
    response
}

fn cors_layer(settings: &Settings) -> CorsLayer {
    match settings
        .client_url
        .as_deref()
        .and_then(|url| HeaderValue::from_str(url).ok())
    {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(Any)
            .allow_headers(Any),
        None => CorsLayer::permissive(),
    }
}

fn api_routes(state: &SharedState) -> Router<SharedState> {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/bugbounty/scan", post(bugbounty::scan))
        .route("/api/bugbounty/ai/discover", post(bugbounty::discover))
        .route(
            "/api/bugbounty/submissions",
            post(bugbounty::create_submission).get(bugbounty::list_submissions),
        )
        .route("/api/bugbounty/submissions/:id", get(bugbounty::get_submission))
        .route("/api/web3/analyze", post(web3::analyze))
        .route("/api/web3/report", post(web3::report))
        .route("/api/web3/poc", post(web3::generate_poc))
        .route("/api/reports", get(reports::list))
        .route("/api/reports/download/:report_id", get(reports::download))
        .route(
            "/api/workflows/campaigns",
            post(workflows::create).get(workflows::list),
        )
        .route("/api/workflows/campaigns/:id", get(workflows::get))
        .route("/api/workflows/campaigns/:id/advance", post(workflows::advance))
        .route_layer(middleware::from_fn_with_state(
            state.limiter.clone(),
            rate_limit::limit,
        ))
}

pub fn build_router(state: SharedState) -> Router {
    let static_dir = ServeDir::new(&state.settings.client_build_dir);
    let cors = cors_layer(&state.settings);
    let metrics_handle = state.metrics.clone();

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/ws", get(ws::handler))
        .merge(api_routes(&state))
        .with_state(state)
        .fallback_service(static_dir)
        .layer(middleware::from_fn_with_state(metrics_handle, count_requests))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
