//! Shared handler state, built once in `main`.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

use super::rate_limit::RateLimiter;
use crate::config::Settings;
use crate::engines::{TargetScanner, VulnerabilityDiscovery};
use crate::events::ServerEvent;
use crate::platforms::SubmissionDispatcher;
use crate::reporting::service::ReportService;
use crate::store::submissions::SubmissionRepository;
use crate::tasks::Supervisor;
use crate::telemetry::Metrics;
use crate::web3::analysis::ContractAnalyzer;
use crate::web3::rpc::RpcPool;
use crate::workflow::CampaignOrchestrator;

pub struct AppState {
    pub settings: Settings,
    pub started_at: Instant,
    pub metrics: Arc<Metrics>,
    pub limiter: Arc<RateLimiter>,
    pub reports: Arc<ReportService>,
    pub analyzer: Arc<dyn ContractAnalyzer>,
    pub rpc: Arc<RpcPool>,
    pub discovery: Arc<dyn VulnerabilityDiscovery>,
    pub scanner: Arc<dyn TargetScanner>,
    pub campaigns: Arc<CampaignOrchestrator>,
    pub submissions: Arc<dyn SubmissionRepository>,
    pub dispatcher: Arc<SubmissionDispatcher>,
    pub supervisor: Supervisor,
    pub events: broadcast::Sender<ServerEvent>,
}

pub type SharedState = Arc<AppState>;
