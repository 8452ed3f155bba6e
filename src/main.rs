//! Bounty Forge - bug bounty automation backend
//!
//! `forge serve` (default) runs the HTTP/WebSocket API:
//!   scanning + discovery      → pluggable engines, null by default
//!   Web3 analysis             → bytecode signatures over a rotating RPC pool
//!   reports                   → explorer screenshots, tool evidence, Foundry PoC
//!   campaigns + submissions   → phase orchestration, platform dispatch
//!
//! `forge poc` writes a Foundry PoC scaffold to disk without starting the server.

mod api {
    pub mod bugbounty;
    pub mod rate_limit;
    pub mod reports;
    pub mod router;
    pub mod state;
    pub mod web3;
    pub mod workflows;
    pub mod ws;
}
mod config;
mod engines;
mod error;
mod events;
mod findings;
mod platforms;
mod reporting {
    pub mod capture;
    pub mod evidence;
    pub mod html;
    pub mod poc;
    pub mod service;
}
mod store {
    pub mod campaigns;
    pub mod submissions;
}
mod tasks;
mod telemetry;
mod web3 {
    pub mod analysis;
    pub mod explorer;
    pub mod rpc;
}
mod workflow;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

use api::rate_limit::RateLimiter;
use api::state::AppState;
use config::{Overrides, Settings};
use engines::{NullDiscovery, QueuedScanner};
use findings::{Severity, VulnerabilityKind};
use platforms::{HttpPlatformClient, SubmissionDispatcher};
use reporting::capture::{CaptureOptions, HeadlessCapturer};
use reporting::poc::PocSpec;
use reporting::service::ReportService;
use store::campaigns::InMemoryCampaigns;
use store::submissions::InMemorySubmissions;
use tasks::Supervisor;
use telemetry::Metrics;
use web3::analysis::BytecodeAnalyzer;
use web3::rpc::RpcPool;
use workflow::CampaignOrchestrator;

// ─── Constants ───────────────────────────────────────────────────────────────

const RPC_HEALTH_INTERVAL_SECS: u64 = 60;
const CAMPAIGN_MONITOR_INTERVAL_SECS: u64 = 30;
const LIMITER_PRUNE_INTERVAL_SECS: u64 = 300;
const LIMITER_MAX_IDLE_SECS: u64 = 600;
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ─── CLI ─────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Bug bounty automation backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the API server (default)
    Serve {
        #[arg(long)]
        port: Option<u16>,

        #[arg(long)]
        reports_dir: Option<PathBuf>,

        #[arg(long)]
        client_build_dir: Option<PathBuf>,

        /// Skip the Foundry PoC scaffold in generated reports
        #[arg(long)]
        no_poc: bool,
    },

    /// Write a Foundry PoC project
    Poc {
        #[arg(long)]
        name: String,

        #[arg(long = "type", default_value = "reentrancy")]
        kind: String,

        #[arg(long, default_value = "high")]
        severity: String,

        #[arg(long, default_value = "")]
        target: String,

        #[arg(long, default_value = "ethereum")]
        network: String,

        #[arg(long)]
        out: PathBuf,
    },
}

// ─── Entry Point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve {
        port: None,
        reports_dir: None,
        client_build_dir: None,
        no_poc: false,
    }) {
        Commands::Serve {
            port,
            reports_dir,
            client_build_dir,
            no_poc,
        } => {
            let settings = Settings::from_env()?.apply(Overrides {
                port,
                reports_dir,
                client_build_dir,
                no_poc,
            });
            telemetry::init_tracing(&settings);
            serve(settings).await
        }
        Commands::Poc {
            name,
            kind,
            severity,
            target,
            network,
            out,
        } => {
            let settings = Settings::from_env()?;
            telemetry::init_tracing(&settings);
            let spec = PocSpec {
                name,
                kind: VulnerabilityKind::parse(&kind),
                severity: Severity::from(severity),
                target_contract: target,
                network,
            };
            let project = reporting::poc::generate(&spec)?;
            project.write_to(&out)?;
            info!("[POC] wrote {} files to {}", project.files.len(), out.display());
            Ok(())
        }
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    info!("=== BOUNTY FORGE v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", settings.app_env);
    info!("Reports dir: {}", settings.reports_dir.display());

    if let Some(uri) = &settings.mongodb_uri {
        warn!("[STORE] MONGODB_URI set ({}); using in-memory repositories", uri);
    }

    let metrics = Arc::new(Metrics::new().context("metrics registry")?);
    let (supervisor, failures) = Supervisor::new();
    tokio::spawn(tasks::report_failures(failures, metrics.clone()));

    let rpc = Arc::new(RpcPool::new(settings.rpc_timeout())?);
    let (healthy, total) = rpc.health_summary().await;
    info!("[RPC] {} endpoints configured ({} available)", total, healthy);

    let credentials = config::load_credentials(&settings.platform_credentials)?;
    info!("[SUBMIT] credentials loaded for {} platforms", credentials.len());
    let platform_client = HttpPlatformClient::new(credentials, Duration::from_secs(30))?;

    let capturer = HeadlessCapturer::new(CaptureOptions {
        navigation_timeout: settings.screenshot_timeout(),
        settle: settings.screenshot_settle(),
        ..CaptureOptions::default()
    });
    tokio::fs::create_dir_all(&settings.reports_dir)
        .await
        .with_context(|| format!("creating {}", settings.reports_dir.display()))?;
    let reports = Arc::new(ReportService::new(
        settings.reports_dir.clone(),
        Arc::new(capturer),
        settings.generate_poc,
        metrics.clone(),
    ));

    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let campaigns = Arc::new(CampaignOrchestrator::new(
        Arc::new(InMemoryCampaigns::default()),
        events.clone(),
    ));
    let submissions = Arc::new(InMemorySubmissions::default());
    let dispatcher = Arc::new(SubmissionDispatcher::new(
        Arc::new(platform_client),
        submissions.clone(),
        metrics.clone(),
    ));
    let limiter = Arc::new(RateLimiter::new(settings.rate_limit_rps, settings.rate_limit_burst));

    // ─── Background tasks ────────────────────────────────────────────────────

    let health_rpc = rpc.clone();
    supervisor.spawn_periodic(
        "rpc-health",
        Duration::from_secs(RPC_HEALTH_INTERVAL_SECS),
        move || {
            let rpc = health_rpc.clone();
            async move {
                let healthy = rpc.health_check_all().await;
                let (_, total) = rpc.health_summary().await;
                info!("[RPC] health check: {}/{} healthy", healthy, total);
                if healthy == 0 && total > 0 {
                    return Err(format!("all {} RPC endpoints unhealthy", total));
                }
                Ok(())
            }
        },
    );

    let monitor = campaigns.clone();
    supervisor.spawn_periodic(
        "campaign-monitor",
        Duration::from_secs(CAMPAIGN_MONITOR_INTERVAL_SECS),
        move || {
            let monitor = monitor.clone();
            async move { monitor.monitor_once().await.map(|_| ()) }
        },
    );

    let prune_limiter = limiter.clone();
    supervisor.spawn_periodic(
        "rate-limit-prune",
        Duration::from_secs(LIMITER_PRUNE_INTERVAL_SECS),
        move || {
            let limiter = prune_limiter.clone();
            async move {
                let remaining = limiter.prune(Duration::from_secs(LIMITER_MAX_IDLE_SECS));
                tracing::debug!("[RATE] {} client buckets tracked", remaining);
                Ok::<(), String>(())
            }
        },
    );

    // ─── HTTP ────────────────────────────────────────────────────────────────

    let port = settings.port;
    let state = Arc::new(AppState {
        settings,
        started_at: Instant::now(),
        metrics,
        limiter,
        reports,
        analyzer: Arc::new(BytecodeAnalyzer::new(rpc.clone())),
        rpc,
        discovery: Arc::new(NullDiscovery),
        scanner: Arc::new(QueuedScanner::default()),
        campaigns,
        submissions,
        dispatcher,
        supervisor,
        events,
    });

    let app = api::router::build_router(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("binding port {}", port))?;
    info!("[HTTP] Listening on 0.0.0.0:{}", port);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("[HTTP] shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("[HTTP] failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("[HTTP] ctrl-c received, draining connections");
}
