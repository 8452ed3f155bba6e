//! Finding model shared by analysis, evidence rendering, PoC scaffolding and
//! the HTTP API.
//!
//! Vulnerability `type` and `tool` arrive as free text from callers. They are
//! parsed into closed enums here so every downstream consumer dispatches on a
//! variant instead of a string.

use serde::{Deserialize, Serialize};

// ─── Severity ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Critical => "Critical",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Info => "Informational",
        }
    }

    /// Rough payout a bounty program lists for this tier, in USD.
    pub fn estimated_bounty_usd(&self) -> f64 {
        match self {
            Self::Critical => 50_000.0,
            Self::High => 10_000.0,
            Self::Medium => 2_500.0,
            Self::Low => 500.0,
            Self::Info => 0.0,
        }
    }
}

impl From<String> for Severity {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "crit" => Self::Critical,
            "high" => Self::High,
            "low" => Self::Low,
            "info" | "informational" | "none" => Self::Info,
            _ => Self::Medium,
        }
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ─── Vulnerability Kind ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum VulnerabilityKind {
    Reentrancy,
    IntegerOverflow,
    AccessControl,
    UncheckedCall,
    FlashLoan,
    OracleManipulation,
    FrontRunning,
    Selfdestruct,
    DelegateCall,
    Other(String),
}

impl Default for VulnerabilityKind {
    fn default() -> Self {
        Self::Other("unclassified".to_string())
    }
}

impl VulnerabilityKind {
    pub fn parse(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        if key.contains("reentran") {
            Self::Reentrancy
        } else if key.contains("overflow") || key.contains("underflow") || key.contains("arithmetic") {
            Self::IntegerOverflow
        } else if key.contains("access") || key.contains("auth") || key.contains("txorigin") || key.contains("owner") {
            Self::AccessControl
        } else if key.contains("unchecked") || key.contains("lowlevel") {
            Self::UncheckedCall
        } else if key.contains("flash") {
            Self::FlashLoan
        } else if key.contains("oracle") || key.contains("price") {
            Self::OracleManipulation
        } else if key.contains("front") || key.contains("sandwich") || key.contains("mev") {
            Self::FrontRunning
        } else if key.contains("selfdestruct") || key.contains("suicid") {
            Self::Selfdestruct
        } else if key.contains("delegatecall") || key.contains("proxy") {
            Self::DelegateCall
        } else if key.is_empty() {
            Self::default()
        } else {
            Self::Other(raw.trim().to_string())
        }
    }

    pub fn slug(&self) -> String {
        match self {
            Self::Reentrancy => "reentrancy".into(),
            Self::IntegerOverflow => "integer-overflow".into(),
            Self::AccessControl => "access-control".into(),
            Self::UncheckedCall => "unchecked-call".into(),
            Self::FlashLoan => "flash-loan".into(),
            Self::OracleManipulation => "oracle-manipulation".into(),
            Self::FrontRunning => "front-running".into(),
            Self::Selfdestruct => "selfdestruct".into(),
            Self::DelegateCall => "delegatecall".into(),
            Self::Other(raw) => {
                let slug: String = raw
                    .chars()
                    .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
                    .collect();
                let slug = slug.trim_matches('-').to_string();
                if slug.is_empty() {
                    "unclassified".into()
                } else {
                    slug
                }
            }
        }
    }

    pub fn title(&self) -> String {
        match self {
            Self::Reentrancy => "Reentrancy".into(),
            Self::IntegerOverflow => "Integer Overflow / Underflow".into(),
            Self::AccessControl => "Missing Access Control".into(),
            Self::UncheckedCall => "Unchecked External Call".into(),
            Self::FlashLoan => "Flash Loan Attack Vector".into(),
            Self::OracleManipulation => "Price Oracle Manipulation".into(),
            Self::FrontRunning => "Front-Running".into(),
            Self::Selfdestruct => "Unprotected Selfdestruct".into(),
            Self::DelegateCall => "Controlled Delegatecall".into(),
            Self::Other(raw) => raw.clone(),
        }
    }

    /// Default tier when a caller or analyzer gives none.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::Reentrancy
            | Self::FlashLoan
            | Self::OracleManipulation
            | Self::Selfdestruct
            | Self::DelegateCall
            | Self::AccessControl => Severity::Critical,
            Self::IntegerOverflow | Self::UncheckedCall => Severity::High,
            Self::FrontRunning => Severity::Medium,
            Self::Other(_) => Severity::Medium,
        }
    }

    pub fn swc_id(&self) -> Option<&'static str> {
        match self {
            Self::Reentrancy => Some("SWC-107"),
            Self::IntegerOverflow => Some("SWC-101"),
            Self::AccessControl => Some("SWC-105"),
            Self::UncheckedCall => Some("SWC-104"),
            Self::FrontRunning => Some("SWC-114"),
            Self::Selfdestruct => Some("SWC-106"),
            Self::DelegateCall => Some("SWC-112"),
            Self::FlashLoan | Self::OracleManipulation | Self::Other(_) => None,
        }
    }

    pub fn slither_detector(&self) -> &'static str {
        match self {
            Self::Reentrancy => "reentrancy-eth",
            Self::IntegerOverflow => "divide-before-multiply",
            Self::AccessControl => "arbitrary-send-eth",
            Self::UncheckedCall => "unchecked-lowlevel",
            Self::FlashLoan => "reentrancy-no-eth",
            Self::OracleManipulation => "incorrect-equality",
            Self::FrontRunning => "tx-ordering",
            Self::Selfdestruct => "suicidal",
            Self::DelegateCall => "controlled-delegatecall",
            Self::Other(_) => "low-level-calls",
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            Self::Reentrancy => "Apply checks-effects-interactions and guard external entry points with a reentrancy lock.",
            Self::IntegerOverflow => "Compile with Solidity >= 0.8 and audit every unchecked block for bounds.",
            Self::AccessControl => "Restrict privileged functions with explicit role checks; never authorize with tx.origin.",
            Self::UncheckedCall => "Check the success flag of every low-level call and revert on failure.",
            Self::FlashLoan => "Do not derive balances or voting power from state that can be borrowed within one transaction.",
            Self::OracleManipulation => "Use time-weighted or decentralized price feeds instead of spot reserves.",
            Self::FrontRunning => "Add slippage bounds, deadlines or commit-reveal to order-sensitive operations.",
            Self::Selfdestruct => "Remove selfdestruct or restrict it behind a multisig-controlled role.",
            Self::DelegateCall => "Only delegatecall into immutable, trusted implementations.",
            Self::Other(_) => "Review the affected code path and add regression tests for the reported behaviour.",
        }
    }
}

impl From<String> for VulnerabilityKind {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<VulnerabilityKind> for String {
    fn from(kind: VulnerabilityKind) -> Self {
        kind.slug()
    }
}

impl std::fmt::Display for VulnerabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.title())
    }
}

// ─── Tool Kind ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ToolKind {
    #[default]
    Slither,
    Mythril,
    Echidna,
    Manticore,
    BytecodeScan,
    ManualReview,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slither => "slither",
            Self::Mythril => "mythril",
            Self::Echidna => "echidna",
            Self::Manticore => "manticore",
            Self::BytecodeScan => "bytecode-scan",
            Self::ManualReview => "manual-review",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Slither => "Slither",
            Self::Mythril => "Mythril",
            Self::Echidna => "Echidna",
            Self::Manticore => "Manticore",
            Self::BytecodeScan => "Bytecode Signature Scan",
            Self::ManualReview => "Manual Review",
        }
    }
}

impl From<String> for ToolKind {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "mythril" | "myth" => Self::Mythril,
            "echidna" => Self::Echidna,
            "manticore" => Self::Manticore,
            "bytecode" | "bytecode-scan" | "bytecode_scan" => Self::BytecodeScan,
            "manual" | "manual-review" | "manual_review" => Self::ManualReview,
            _ => Self::Slither,
        }
    }
}

impl From<ToolKind> for String {
    fn from(tool: ToolKind) -> Self {
        tool.as_str().to_string()
    }
}

// ─── Vulnerability / Contract / Analysis ─────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    #[serde(rename = "type", default)]
    pub kind: VulnerabilityKind,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub tool: ToolKind,
}

impl Vulnerability {
    pub fn new(kind: VulnerabilityKind, tool: ToolKind, description: impl Into<String>) -> Self {
        Self {
            severity: kind.default_severity(),
            kind,
            description: description.into(),
            location: None,
            tool,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractData {
    pub address: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ContractData {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Unnamed Contract")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    #[serde(default)]
    pub vulnerabilities: Vec<Vulnerability>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisData {
    #[serde(default)]
    pub contract_address: String,
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default)]
    pub summary: serde_json::Value,
    #[serde(default)]
    pub results: AnalysisResults,
}

impl AnalysisData {
    pub fn vulnerabilities(&self) -> &[Vulnerability] {
        &self.results.vulnerabilities
    }

    /// Highest-severity finding; ties keep the earliest one.
    pub fn primary_vulnerability(&self) -> Option<&Vulnerability> {
        self.vulnerabilities()
            .iter()
            .fold(None, |best: Option<&Vulnerability>, v| match best {
                Some(b) if b.severity >= v.severity => Some(b),
                _ => Some(v),
            })
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts::from_vulnerabilities(self.vulnerabilities())
    }
}

fn default_network() -> String {
    "ethereum".to_string()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn from_vulnerabilities(vulns: &[Vulnerability]) -> Self {
        let mut counts = Self::default();
        for v in vulns {
            match v.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }

    pub fn risk_label(&self) -> &'static str {
        if self.critical > 0 {
            "CRITICAL"
        } else if self.high > 0 {
            "HIGH"
        } else if self.medium > 0 {
            "MEDIUM"
        } else if self.low > 0 {
            "LOW"
        } else {
            "NONE"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing_free_text() {
        assert_eq!(VulnerabilityKind::parse("Reentrancy Attack"), VulnerabilityKind::Reentrancy);
        assert_eq!(VulnerabilityKind::parse("tx.origin auth"), VulnerabilityKind::AccessControl);
        assert_eq!(VulnerabilityKind::parse("Flash-Loan"), VulnerabilityKind::FlashLoan);
        assert_eq!(
            VulnerabilityKind::parse("Weird Bug"),
            VulnerabilityKind::Other("Weird Bug".to_string())
        );
        assert_eq!(VulnerabilityKind::parse("  "), VulnerabilityKind::default());
    }

    #[test]
    fn test_other_kind_slug() {
        let kind = VulnerabilityKind::Other("Signature Replay!".into());
        assert_eq!(kind.slug(), "signature-replay");
    }

    #[test]
    fn test_severity_ordering_and_bounties() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Critical.estimated_bounty_usd() > Severity::High.estimated_bounty_usd());
        assert!(Severity::High.estimated_bounty_usd() > Severity::Medium.estimated_bounty_usd());
        assert_eq!(Severity::from("HIGH".to_string()), Severity::High);
        assert_eq!(Severity::from("bogus".to_string()), Severity::Medium);
    }

    #[test]
    fn test_vulnerability_deserializes_loose_input() {
        let v: Vulnerability = serde_json::from_value(serde_json::json!({
            "type": "reentrancy",
            "severity": "Critical",
            "description": "withdraw() calls out before updating balances",
            "tool": "Mythril"
        }))
        .unwrap();
        assert_eq!(v.kind, VulnerabilityKind::Reentrancy);
        assert_eq!(v.severity, Severity::Critical);
        assert_eq!(v.tool, ToolKind::Mythril);
        assert!(v.location.is_none());
    }

    #[test]
    fn test_unknown_tool_defaults_to_slither() {
        assert_eq!(ToolKind::from("securify".to_string()), ToolKind::Slither);
    }

    #[test]
    fn test_primary_vulnerability_prefers_severity_then_order() {
        let mut analysis: AnalysisData = serde_json::from_value(serde_json::json!({
            "contractAddress": "0xabc",
            "results": { "vulnerabilities": [
                { "type": "front-running", "severity": "medium" },
                { "type": "reentrancy", "severity": "high" },
                { "type": "oracle", "severity": "high" }
            ]}
        }))
        .unwrap();
        assert_eq!(analysis.network, "ethereum");
        assert_eq!(
            analysis.primary_vulnerability().map(|v| v.kind.clone()),
            Some(VulnerabilityKind::Reentrancy)
        );

        analysis.results.vulnerabilities.clear();
        assert!(analysis.primary_vulnerability().is_none());
    }

    #[test]
    fn test_severity_counts() {
        let vulns = vec![
            Vulnerability::new(VulnerabilityKind::Reentrancy, ToolKind::Slither, ""),
            Vulnerability::new(VulnerabilityKind::FrontRunning, ToolKind::Slither, ""),
            Vulnerability::new(VulnerabilityKind::UncheckedCall, ToolKind::Mythril, ""),
        ];
        let counts = SeverityCounts::from_vulnerabilities(&vulns);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.high, 1);
        assert_eq!(counts.medium, 1);
        assert_eq!(counts.total(), 3);
        assert_eq!(counts.risk_label(), "CRITICAL");
        assert_eq!(SeverityCounts::default().risk_label(), "NONE");
    }
}
