//! Campaign orchestration
//!
//! A campaign walks five phases in fixed order:
//!   RECONNAISSANCE → DISCOVERY → EXPLOITATION → VALIDATION → REPORTING
//! Exactly one phase is running while the campaign is active. Completing
//! REPORTING completes the campaign.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{parse_id, FieldError, StoreError};
use crate::events::ServerEvent;
use crate::findings::Vulnerability;
use crate::store::campaigns::CampaignRepository;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("campaign {0} is already completed")]
    AlreadyCompleted(Uuid),
}

// ─── Phase State Machine ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Reconnaissance,
    Discovery,
    Exploitation,
    Validation,
    Reporting,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Reconnaissance,
        Phase::Discovery,
        Phase::Exploitation,
        Phase::Validation,
        Phase::Reporting,
    ];

    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Reconnaissance => Some(Phase::Discovery),
            Phase::Discovery => Some(Phase::Exploitation),
            Phase::Exploitation => Some(Phase::Validation),
            Phase::Validation => Some(Phase::Reporting),
            Phase::Reporting => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Reconnaissance => "reconnaissance",
            Phase::Discovery => "discovery",
            Phase::Exploitation => "exploitation",
            Phase::Validation => "validation",
            Phase::Reporting => "reporting",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str().to_ascii_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Pending => "pending",
            PhaseStatus::Running => "running",
            PhaseStatus::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseState {
    pub status: PhaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl PhaseState {
    fn pending() -> Self {
        Self {
            status: PhaseStatus::Pending,
            started_at: None,
            completed_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    Completed,
}

// ─── Campaign ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub program: String,
    pub targets: Vec<String>,
    pub status: CampaignStatus,
    pub phases: BTreeMap<Phase, PhaseState>,
    #[serde(default)]
    pub findings: Vec<Vulnerability>,
    #[serde(default)]
    pub exploits: Vec<String>,
    #[serde(default)]
    pub submissions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// New active campaign with reconnaissance running.
    pub fn new(program: impl Into<String>, targets: Vec<String>) -> Self {
        let now = Utc::now();
        let mut phases: BTreeMap<Phase, PhaseState> =
            Phase::ALL.iter().map(|p| (*p, PhaseState::pending())).collect();
        phases.insert(
            Phase::Reconnaissance,
            PhaseState {
                status: PhaseStatus::Running,
                started_at: Some(now),
                completed_at: None,
            },
        );
        Self {
            id: Uuid::new_v4(),
            program: program.into().trim().to_string(),
            targets: targets
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            status: CampaignStatus::Active,
            phases,
            findings: Vec::new(),
            exploits: Vec::new(),
            submissions: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        let mut errors = BTreeMap::new();
        if self.program.trim().is_empty() {
            errors.insert("program".to_string(), FieldError::new("Program is required"));
        }
        if self.targets.is_empty() {
            errors.insert("targets".to_string(), FieldError::new("At least one target is required"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation { errors })
        }
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.phases
            .iter()
            .find(|(_, state)| state.status == PhaseStatus::Running)
            .map(|(phase, _)| *phase)
    }

    /// Complete the running phase and start the next one.
    /// Returns the phase now running, `None` once the campaign completes.
    pub fn advance(&mut self, now: DateTime<Utc>) -> Result<Option<Phase>, WorkflowError> {
        if self.status == CampaignStatus::Completed {
            return Err(WorkflowError::AlreadyCompleted(self.id));
        }
        let current = self.current_phase().unwrap_or(Phase::Reconnaissance);

        if let Some(state) = self.phases.get_mut(&current) {
            state.status = PhaseStatus::Completed;
            state.started_at.get_or_insert(now);
            state.completed_at = Some(now);
        }
        self.updated_at = now;

        match current.next() {
            Some(next) => {
                if let Some(state) = self.phases.get_mut(&next) {
                    state.status = PhaseStatus::Running;
                    state.started_at = Some(now);
                }
                Ok(Some(next))
            }
            None => {
                self.status = CampaignStatus::Completed;
                Ok(None)
            }
        }
    }

    fn room(&self) -> String {
        self.id.to_string()
    }

    fn variation(&self) -> serde_json::Value {
        serde_json::json!({
            "campaignId": self.id,
            "program": self.program,
            "targets": self.targets.len(),
            "phase": self.current_phase().map(|p| p.as_str()),
            "status": self.status,
        })
    }
}

// ─── Orchestrator ────────────────────────────────────────────────────────────

pub struct CampaignOrchestrator {
    repo: Arc<dyn CampaignRepository>,
    events: broadcast::Sender<ServerEvent>,
}

impl CampaignOrchestrator {
    pub fn new(repo: Arc<dyn CampaignRepository>, events: broadcast::Sender<ServerEvent>) -> Self {
        Self { repo, events }
    }

    pub fn repository(&self) -> &Arc<dyn CampaignRepository> {
        &self.repo
    }

    fn emit(&self, event: ServerEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn emit_phase(&self, campaign: &Campaign, phase: Phase) {
        let status = campaign
            .phases
            .get(&phase)
            .map(|s| s.status.as_str())
            .unwrap_or("pending");
        self.emit(ServerEvent::PhaseUpdate {
            room: campaign.room(),
            campaign_id: campaign.id.to_string(),
            phase: phase.as_str().to_string(),
            status: status.to_string(),
            timestamp: campaign.updated_at,
        });
    }

    pub async fn create(&self, program: &str, targets: Vec<String>) -> Result<Campaign, WorkflowError> {
        let campaign = self.repo.insert(Campaign::new(program, targets)).await?;
        info!(
            "[WORKFLOW] campaign {} created for {} ({} targets)",
            campaign.id,
            campaign.program,
            campaign.targets.len()
        );
        self.emit_phase(&campaign, Phase::Reconnaissance);
        self.emit(ServerEvent::log(
            campaign.room(),
            "info",
            format!("Campaign started for {}", campaign.program),
        ));
        Ok(campaign)
    }

    pub async fn get(&self, raw_id: &str) -> Result<Campaign, WorkflowError> {
        Ok(self.repo.get(parse_id(raw_id)?).await?)
    }

    pub async fn list(&self) -> Result<Vec<Campaign>, WorkflowError> {
        Ok(self.repo.list().await?)
    }

    pub async fn advance(&self, raw_id: &str) -> Result<Campaign, WorkflowError> {
        let mut campaign = self.repo.get(parse_id(raw_id)?).await?;
        let previous = campaign.current_phase();
        let next = campaign.advance(Utc::now())?;
        let campaign = self.repo.update(campaign).await?;

        if let Some(done) = previous {
            self.emit_phase(&campaign, done);
        }
        match next {
            Some(phase) => {
                info!("[WORKFLOW] campaign {} → {}", campaign.id, phase);
                self.emit_phase(&campaign, phase);
            }
            None => {
                info!("[WORKFLOW] campaign {} completed", campaign.id);
                self.emit(ServerEvent::log(campaign.room(), "info", "Campaign completed"));
            }
        }
        Ok(campaign)
    }

    /// One monitoring pass: progress logs per active campaign, then a
    /// variations broadcast. Returns the number of active campaigns.
    pub async fn monitor_once(&self) -> Result<usize, WorkflowError> {
        let campaigns = self.repo.list().await?;
        let active: Vec<&Campaign> = campaigns
            .iter()
            .filter(|c| c.status == CampaignStatus::Active)
            .collect();

        for c in &active {
            let done = c
                .phases
                .values()
                .filter(|s| s.status == PhaseStatus::Completed)
                .count();
            let phase = c.current_phase().map(|p| p.as_str()).unwrap_or("none");
            self.emit(ServerEvent::log(
                c.room(),
                "debug",
                format!("{}: {} ({}/{} phases complete)", c.program, phase, done, Phase::ALL.len()),
            ));
        }
        self.emit(ServerEvent::WorkflowVariations {
            variations: active.iter().map(|c| c.variation()).collect(),
        });

        debug!("[WORKFLOW] monitor pass: {} active", active.len());
        Ok(active.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::campaigns::InMemoryCampaigns;

    fn orchestrator() -> (CampaignOrchestrator, broadcast::Receiver<ServerEvent>) {
        let (tx, rx) = broadcast::channel(64);
        (
            CampaignOrchestrator::new(Arc::new(InMemoryCampaigns::default()), tx),
            rx,
        )
    }

    #[test]
    fn test_new_campaign_starts_in_recon() {
        let c = Campaign::new("Acme", vec!["acme.com".into(), " ".into()]);
        assert_eq!(c.status, CampaignStatus::Active);
        assert_eq!(c.current_phase(), Some(Phase::Reconnaissance));
        assert_eq!(c.targets, vec!["acme.com".to_string()]);
        assert_eq!(c.phases[&Phase::Discovery].status, PhaseStatus::Pending);
    }

    #[test]
    fn test_phases_advance_in_order_then_complete() {
        let mut c = Campaign::new("Acme", vec!["acme.com".into()]);
        let mut seen = vec![c.current_phase().unwrap()];
        while let Some(next) = c.advance(Utc::now()).unwrap() {
            seen.push(next);
        }
        assert_eq!(seen, Phase::ALL.to_vec());
        assert_eq!(c.status, CampaignStatus::Completed);
        assert!(c.phases.values().all(|s| s.status == PhaseStatus::Completed));
        assert!(c.current_phase().is_none());

        assert!(matches!(
            c.advance(Utc::now()),
            Err(WorkflowError::AlreadyCompleted(_))
        ));
    }

    #[test]
    fn test_completed_only_after_reporting() {
        let mut c = Campaign::new("Acme", vec!["acme.com".into()]);
        for _ in 0..4 {
            c.advance(Utc::now()).unwrap();
            assert_eq!(c.status, CampaignStatus::Active);
        }
        assert_eq!(c.current_phase(), Some(Phase::Reporting));
        c.advance(Utc::now()).unwrap();
        assert_eq!(c.status, CampaignStatus::Completed);
    }

    #[test]
    fn test_validation_collects_fields() {
        let c = Campaign::new("  ", vec![]);
        match c.validate() {
            Err(StoreError::Validation { errors }) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.contains_key("program"));
                assert!(errors.contains_key("targets"));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_orchestrator_emits_phase_updates() {
        let (orch, mut rx) = orchestrator();
        let c = orch.create("Acme", vec!["acme.com".into()]).await.unwrap();

        match rx.recv().await.unwrap() {
            ServerEvent::PhaseUpdate { room, phase, status, .. } => {
                assert_eq!(room, c.id.to_string());
                assert_eq!(phase, "reconnaissance");
                assert_eq!(status, "running");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), ServerEvent::Log { .. }));

        let c = orch.advance(&c.id.to_string()).await.unwrap();
        assert_eq!(c.current_phase(), Some(Phase::Discovery));
        let statuses: Vec<(String, String)> = (0..2)
            .map(|_| match rx.try_recv().unwrap() {
                ServerEvent::PhaseUpdate { phase, status, .. } => (phase, status),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("reconnaissance".to_string(), "completed".to_string()),
                ("discovery".to_string(), "running".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_orchestrator_rejects_bad_ids() {
        let (orch, _rx) = orchestrator();
        assert!(matches!(
            orch.advance("not-a-uuid").await,
            Err(WorkflowError::Store(StoreError::Cast { .. }))
        ));
        assert!(matches!(
            orch.get(&Uuid::new_v4().to_string()).await,
            Err(WorkflowError::Store(StoreError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn test_monitor_once_counts_active_and_broadcasts() {
        let (orch, mut rx) = orchestrator();
        let a = orch.create("A", vec!["a.com".into()]).await.unwrap();
        orch.create("B", vec!["b.com".into()]).await.unwrap();
        for _ in 0..5 {
            orch.advance(&a.id.to_string()).await.unwrap();
        }
        while rx.try_recv().is_ok() {}

        assert_eq!(orch.monitor_once().await.unwrap(), 1);
        let mut variations = None;
        while let Ok(ev) = rx.try_recv() {
            if let ServerEvent::WorkflowVariations { variations: v } = ev {
                variations = Some(v);
            }
        }
        let variations = variations.unwrap();
        assert_eq!(variations.len(), 1);
        assert_eq!(variations[0]["program"], "B");
    }
}
