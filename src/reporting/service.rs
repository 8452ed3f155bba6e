//! Report pipeline
//!
//! One report is one directory under the reports root:
//!
//!   <id>/security_report.html
//!   <id>/executive_summary.txt
//!   <id>/manifest.json
//!   <id>/screenshots/<key>.png
//!   <id>/visuals/contract_visualization.{html,png}
//!   <id>/tool_evidence/<nn>_<tool>_<kind>.{html,png}
//!   <id>/immunefi_poc/...
//!
//! Steps run sequentially. Capture, evidence and PoC failures degrade to
//! warnings; only the directory itself, the report and the summary are
//! required. `.incomplete` marks a directory still being written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::capture::PageCapturer;
use super::evidence::{render_evidence, EvidenceArtifact};
use super::html::{
    render_contract_visualization, render_executive_summary, render_placeholder, render_report,
    ReportView, ScreenshotArtifact,
};
use super::poc::{self, PocSpec};
use crate::findings::{AnalysisData, ContractData};
use crate::telemetry::Metrics;
use crate::web3::explorer::explorer_urls;

pub const REPORT_FILE: &str = "security_report.html";
pub const SUMMARY_FILE: &str = "executive_summary.txt";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const INCOMPLETE_MARKER: &str = ".incomplete";

const SCREENSHOTS_DIR: &str = "screenshots";
const VISUALS_DIR: &str = "visuals";
const EVIDENCE_DIR: &str = "tool_evidence";
const POC_DIR: &str = "immunefi_poc";

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid report id: {0}")]
    InvalidId(String),
    #[error("report {0} not found")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub report_id: String,
    pub report_dir: PathBuf,
    pub report_html: PathBuf,
    pub executive_summary: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshots_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visuals_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_evidence_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poc_dir: Option<PathBuf>,
    pub screenshots: BTreeMap<String, PathBuf>,
    pub evidence: Vec<EvidenceArtifact>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub path: String,
    pub sha256: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub report_id: String,
    pub created_at: DateTime<Utc>,
    pub contract: ContractData,
    pub vulnerability_count: usize,
    pub artifacts: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub report_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    pub vulnerability_count: usize,
}

/// `web3_<unix millis>_<8 hex>`
pub fn new_report_id(now: DateTime<Utc>) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("web3_{}_{}", now.timestamp_millis(), &suffix[..8])
}

pub fn is_valid_report_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

// ─── Artifact Writer ─────────────────────────────────────────────────────────

/// Writes files under one report directory and records them for the manifest.
struct Assembly {
    dir: PathBuf,
    artifacts: Vec<ManifestEntry>,
    warnings: Vec<String>,
}

impl Assembly {
    async fn write(&mut self, rel: &str, bytes: &[u8]) -> Result<PathBuf, ReportError> {
        let path = self.dir.join(rel);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| ReportError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|source| ReportError::Io {
                path: path.clone(),
                source,
            })?;
        self.record(rel, bytes);
        Ok(path)
    }

    fn record(&mut self, rel: &str, bytes: &[u8]) {
        self.artifacts.push(ManifestEntry {
            path: rel.to_string(),
            sha256: hex::encode(Sha256::digest(bytes)),
            bytes: bytes.len(),
        });
    }

    fn warn(&mut self, message: String) {
        warn!("[REPORT] {}", message);
        self.warnings.push(message);
    }
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct ReportService {
    root: PathBuf,
    capturer: Arc<dyn PageCapturer>,
    generate_poc: bool,
    metrics: Arc<Metrics>,
}

impl ReportService {
    pub fn new(
        root: impl Into<PathBuf>,
        capturer: Arc<dyn PageCapturer>,
        generate_poc: bool,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            root: root.into(),
            capturer,
            generate_poc,
            metrics,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn generate(
        &self,
        contract: &ContractData,
        analysis: &AnalysisData,
    ) -> Result<GeneratedReport, ReportError> {
        let generated_at = Utc::now();
        let report_id = new_report_id(generated_at);
        let dir = self.root.join(&report_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| ReportError::Io {
                path: dir.clone(),
                source,
            })?;
        let dir = tokio::fs::canonicalize(&dir).await.unwrap_or(dir);
        let marker = dir.join(INCOMPLETE_MARKER);
        tokio::fs::write(&marker, generated_at.to_rfc3339())
            .await
            .map_err(|source| ReportError::Io {
                path: marker.clone(),
                source,
            })?;

        info!(
            "[REPORT] {} started for {} ({}), {} finding(s)",
            report_id,
            contract.address,
            contract.network,
            analysis.vulnerabilities().len()
        );

        let mut asm = Assembly {
            dir: dir.clone(),
            artifacts: Vec::new(),
            warnings: Vec::new(),
        };

        // 1-2. explorer screenshots
        let explorer = explorer_urls(&contract.address, &contract.network);
        let mut shots = Vec::new();
        for (key, url) in explorer.entries() {
            if let Some(shot) = self.capture_explorer_page(&mut asm, key, url).await {
                shots.push(shot);
            }
        }

        // 3. visualization
        let visualization = self.render_visualization(&mut asm, contract, analysis).await;

        // 4. tool evidence
        let mut evidence = Vec::new();
        for (i, vuln) in analysis.vulnerabilities().iter().enumerate() {
            let page = render_evidence(i, vuln, contract);
            let html_rel = format!("{}/{}.html", EVIDENCE_DIR, page.file_stem);
            let html_path = match asm.write(&html_rel, page.html.as_bytes()).await {
                Ok(path) => path,
                Err(e) => {
                    asm.warn(format!("evidence page {} not written: {}", html_rel, e));
                    continue;
                }
            };
            let png_rel = format!("{}/{}.png", EVIDENCE_DIR, page.file_stem);
            let png_rel = match self.capturer.capture_file(&html_path).await {
                Ok(png) => match asm.write(&png_rel, &png).await {
                    Ok(_) => Some(png_rel),
                    Err(e) => {
                        asm.warn(format!("evidence image {} not written: {}", png_rel, e));
                        None
                    }
                },
                Err(e) => {
                    self.metrics.captures_failed.inc();
                    asm.warn(format!("evidence capture {} failed: {}", html_rel, e));
                    None
                }
            };
            evidence.push(EvidenceArtifact {
                title: page.title,
                tool: vuln.tool,
                severity: vuln.severity,
                html_rel,
                png_rel,
            });
        }

        // 5. proof of concept
        let poc_files = if self.generate_poc {
            self.scaffold_poc(&mut asm, contract, analysis).await
        } else {
            Vec::new()
        };

        // 6-7. report and summary are the only required outputs
        let html = render_report(&ReportView {
            report_id: &report_id,
            generated_at,
            contract,
            analysis,
            explorer: &explorer,
            screenshots: &shots,
            visualization: visualization.as_deref(),
            evidence: &evidence,
            poc_files: &poc_files,
        });
        let report_html = asm.write(REPORT_FILE, html.as_bytes()).await?;
        let summary = render_executive_summary(&report_id, generated_at, contract, analysis);
        let executive_summary = asm.write(SUMMARY_FILE, summary.as_bytes()).await?;

        // 8. manifest, then release the marker
        let manifest = Manifest {
            report_id: report_id.clone(),
            created_at: generated_at,
            contract: contract.clone(),
            vulnerability_count: analysis.vulnerabilities().len(),
            artifacts: asm.artifacts.clone(),
        };
        match serde_json::to_vec_pretty(&manifest) {
            Ok(bytes) => {
                if let Err(e) = tokio::fs::write(dir.join(MANIFEST_FILE), bytes).await {
                    asm.warn(format!("manifest not written: {}", e));
                }
            }
            Err(e) => asm.warn(format!("manifest not serialized: {}", e)),
        }
        if let Err(e) = tokio::fs::remove_file(&marker).await {
            asm.warn(format!("could not clear {}: {}", INCOMPLETE_MARKER, e));
        }

        self.metrics.reports_generated.inc();
        info!(
            "[REPORT] {} complete: {} screenshot(s), {} evidence page(s), {} warning(s)",
            report_id,
            shots.len(),
            evidence.len(),
            asm.warnings.len()
        );

        let subdir = |name: &str| {
            let path = dir.join(name);
            path.is_dir().then_some(path)
        };
        Ok(GeneratedReport {
            screenshots_dir: subdir(SCREENSHOTS_DIR),
            visuals_dir: subdir(VISUALS_DIR),
            tool_evidence_dir: subdir(EVIDENCE_DIR),
            poc_dir: subdir(POC_DIR),
            screenshots: shots
                .iter()
                .map(|s| (s.key.clone(), dir.join(&s.rel_path)))
                .collect(),
            report_id,
            report_dir: dir,
            report_html,
            executive_summary,
            evidence,
            warnings: asm.warnings,
        })
    }

    /// Capture one explorer page, falling back to a rendered placeholder.
    /// `None` when neither produced an image.
    async fn capture_explorer_page(
        &self,
        asm: &mut Assembly,
        key: &str,
        url: &str,
    ) -> Option<ScreenshotArtifact> {
        let rel_path = format!("{}/{}.png", SCREENSHOTS_DIR, key);

        let reason = match self.capturer.capture_url(url).await {
            Ok(png) => match asm.write(&rel_path, &png).await {
                Ok(_) => {
                    return Some(ScreenshotArtifact {
                        key: key.to_string(),
                        url: url.to_string(),
                        rel_path,
                        placeholder: false,
                    })
                }
                Err(e) => e.to_string(),
            },
            Err(e) => e.to_string(),
        };
        self.metrics.captures_failed.inc();
        asm.warn(format!("{} screenshot failed: {}", key, reason));

        let placeholder_rel = format!("{}/{}_placeholder.html", SCREENSHOTS_DIR, key);
        let page = render_placeholder(key, url, &reason);
        let placeholder_path = match asm.write(&placeholder_rel, page.as_bytes()).await {
            Ok(path) => path,
            Err(e) => {
                asm.warn(format!("{} placeholder not written: {}", key, e));
                return None;
            }
        };
        match self.capturer.capture_file(&placeholder_path).await {
            Ok(png) => match asm.write(&rel_path, &png).await {
                Ok(_) => Some(ScreenshotArtifact {
                    key: key.to_string(),
                    url: url.to_string(),
                    rel_path,
                    placeholder: true,
                }),
                Err(e) => {
                    asm.warn(format!("{} placeholder image not written, omitting: {}", key, e));
                    None
                }
            },
            Err(e) => {
                asm.warn(format!("{} placeholder capture failed, omitting: {}", key, e));
                None
            }
        }
    }

    /// Relative path of the visualization: the PNG when captured, else the HTML.
    async fn render_visualization(
        &self,
        asm: &mut Assembly,
        contract: &ContractData,
        analysis: &AnalysisData,
    ) -> Option<String> {
        let html_rel = format!("{}/contract_visualization.html", VISUALS_DIR);
        let page = render_contract_visualization(contract, analysis);
        let html_path = match asm.write(&html_rel, page.as_bytes()).await {
            Ok(path) => path,
            Err(e) => {
                asm.warn(format!("visualization not written: {}", e));
                return None;
            }
        };

        let png_rel = format!("{}/contract_visualization.png", VISUALS_DIR);
        match self.capturer.capture_file(&html_path).await {
            Ok(png) => match asm.write(&png_rel, &png).await {
                Ok(_) => Some(png_rel),
                Err(e) => {
                    asm.warn(format!("visualization image not written: {}", e));
                    Some(html_rel)
                }
            },
            Err(e) => {
                self.metrics.captures_failed.inc();
                asm.warn(format!("visualization capture failed: {}", e));
                Some(html_rel)
            }
        }
    }

    /// PoC for the highest-severity finding. Returns report-relative paths.
    async fn scaffold_poc(&self, asm: &mut Assembly, contract: &ContractData, analysis: &AnalysisData) -> Vec<String> {
        let Some(vuln) = analysis.primary_vulnerability() else {
            return Vec::new();
        };
        let spec = PocSpec {
            name: format!("{} {}", contract.display_name(), vuln.kind.title()),
            kind: vuln.kind.clone(),
            severity: vuln.severity,
            target_contract: contract.address.clone(),
            network: contract.network.clone(),
        };

        let project = match poc::generate(&spec) {
            Ok(project) => project,
            Err(e) => {
                asm.warn(format!("PoC not generated: {}", e));
                return Vec::new();
            }
        };
        let mut written = Vec::with_capacity(project.files.len());
        for (path, contents) in &project.files {
            let rel = format!("{}/{}", POC_DIR, path);
            if let Err(e) = asm.write(&rel, contents.as_bytes()).await {
                asm.warn(format!("PoC not written: {}", e));
                return Vec::new();
            }
            written.push(rel);
        }
        written
    }

    // ─── Listing / Download ──────────────────────────────────────────────────

    /// Completed reports, newest first.
    pub async fn list_reports(&self) -> Result<Vec<ReportSummary>, ReportError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(ReportError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let mut reports = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| ReportError::Io {
                path: self.root.clone(),
                source,
            })?
        {
            let dir = entry.path();
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !dir.is_dir()
                || !is_valid_report_id(&id)
                || dir.join(INCOMPLETE_MARKER).exists()
                || !dir.join(REPORT_FILE).is_file()
            {
                continue;
            }
            reports.push(Self::summarize(&id, &dir).await);
        }

        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    async fn summarize(id: &str, dir: &Path) -> ReportSummary {
        let manifest = match tokio::fs::read(dir.join(MANIFEST_FILE)).await {
            Ok(bytes) => serde_json::from_slice::<Manifest>(&bytes).ok(),
            Err(_) => None,
        };
        match manifest {
            Some(m) => ReportSummary {
                report_id: id.to_string(),
                created_at: m.created_at,
                contract_address: Some(m.contract.address),
                network: Some(m.contract.network),
                vulnerability_count: m.vulnerability_count,
            },
            None => {
                let created_at = tokio::fs::metadata(dir.join(REPORT_FILE))
                    .await
                    .and_then(|meta| meta.modified())
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                ReportSummary {
                    report_id: id.to_string(),
                    created_at,
                    contract_address: None,
                    network: None,
                    vulnerability_count: 0,
                }
            }
        }
    }

    /// Path of a completed report's HTML.
    pub fn report_html_path(&self, id: &str) -> Result<PathBuf, ReportError> {
        if !is_valid_report_id(id) {
            return Err(ReportError::InvalidId(id.to_string()));
        }
        let dir = self.root.join(id);
        let path = dir.join(REPORT_FILE);
        if !path.is_file() || dir.join(INCOMPLETE_MARKER).exists() {
            return Err(ReportError::NotFound(id.to_string()));
        }
        Ok(path)
    }
}
