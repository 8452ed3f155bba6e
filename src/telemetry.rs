//! Logging and metrics
//!
//! JSON log lines outside development, human-readable ones locally.
//! Metrics live in a private prometheus registry rendered at `/metrics`.

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

pub fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("forge={},tower_http=info", settings.log_level).into()
    });

    if settings.is_development() {
        tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    }
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

pub struct Metrics {
    registry: Registry,
    pub reports_generated: IntCounter,
    pub captures_failed: IntCounter,
    pub task_failures: IntCounterVec,
    pub http_requests: IntCounterVec,
    pub submissions: IntCounterVec,
    pub ws_clients: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("forge".into()), None)?;

        let reports_generated = IntCounter::new("reports_generated_total", "Reports fully written")?;
        let captures_failed =
            IntCounter::new("captures_failed_total", "Screenshot captures that fell back or were skipped")?;
        let task_failures = IntCounterVec::new(
            Opts::new("task_failures_total", "Background task failures by task"),
            &["task"],
        )?;
        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP responses by method and status"),
            &["method", "status"],
        )?;
        let submissions = IntCounterVec::new(
            Opts::new("submissions_total", "Platform submissions by platform and outcome"),
            &["platform", "outcome"],
        )?;
        let ws_clients = IntGauge::new("ws_clients", "Connected WebSocket clients")?;

        registry.register(Box::new(reports_generated.clone()))?;
        registry.register(Box::new(captures_failed.clone()))?;
        registry.register(Box::new(task_failures.clone()))?;
        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(ws_clients.clone()))?;

        Ok(Self {
            registry,
            reports_generated,
            captures_failed,
            task_failures,
            http_requests,
            submissions,
            ws_clients,
        })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            warn!("[METRICS] encode failed: {}", e);
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
