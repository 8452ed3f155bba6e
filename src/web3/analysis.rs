//! Contract analysis - bytecode signature matching over deployed code
//!
//! Patterns checked against the opcode stream (PUSH data skipped) and the
//! set of 4-byte selectors the contract dispatches on:
//!   1.  CALL followed by SSTORE            → reentrancy
//!   2.  SELFDESTRUCT reachable             → unprotected selfdestruct
//!   3.  DELEGATECALL present               → controlled delegatecall
//!   4.  ORIGIN used                        → tx.origin authorization
//!   5.  CALL result popped unchecked       → unchecked external call
//!   6.  flash loan entry points            → flash loan vector
//!   7.  spot price reads (reserves/slot0)  → oracle manipulation
//!   8.  router swap selectors              → front-running exposure

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use super::explorer::Network;
use super::rpc::{RpcError, RpcPool};
use crate::findings::{AnalysisData, AnalysisResults, ContractData, ToolKind, Vulnerability, VulnerabilityKind};

const OP_SSTORE: u8 = 0x55;
const OP_CALL: u8 = 0xf1;
const OP_DELEGATECALL: u8 = 0xf4;
const OP_SELFDESTRUCT: u8 = 0xff;
const OP_ORIGIN: u8 = 0x32;
const OP_POP: u8 = 0x50;
const OP_PUSH1: u8 = 0x60;
const OP_PUSH4: u8 = 0x63;
const OP_PUSH32: u8 = 0x7f;

/// Minimum confidence for a match to be reported.
const MIN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("contract address is required")]
    MissingAddress,
    #[error("no bytecode deployed at {0}")]
    NotAContract(String),
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContractAnalyzer: Send + Sync {
    async fn analyze(&self, contract: &ContractData) -> Result<AnalysisData, AnalysisError>;
}

// ─── Bytecode Signatures ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Signature {
    CallThenStore,
    Selfdestruct,
    Delegatecall,
    TxOrigin,
    UncheckedCall,
    Selector(&'static str, u32),
}

impl Signature {
    fn all() -> Vec<(VulnerabilityKind, Signature)> {
        vec![
            (VulnerabilityKind::Reentrancy, Self::CallThenStore),
            (VulnerabilityKind::Selfdestruct, Self::Selfdestruct),
            (VulnerabilityKind::DelegateCall, Self::Delegatecall),
            (VulnerabilityKind::AccessControl, Self::TxOrigin),
            (VulnerabilityKind::UncheckedCall, Self::UncheckedCall),
            (VulnerabilityKind::FlashLoan, Self::Selector("flashLoan(address,address,uint256,bytes)", 0x5cffe9de)),
            (VulnerabilityKind::FlashLoan, Self::Selector("executeOperation(address[],uint256[],uint256[],address,bytes)", 0x920f5c84)),
            (VulnerabilityKind::OracleManipulation, Self::Selector("getReserves()", 0x0902f1ac)),
            (VulnerabilityKind::OracleManipulation, Self::Selector("slot0()", 0x3850c7bd)),
            (VulnerabilityKind::FrontRunning, Self::Selector("swapExactTokensForTokens(uint256,uint256,address[],address,uint256)", 0x38ed1739)),
        ]
    }

    fn describe(&self) -> String {
        match self {
            Self::CallThenStore => "CALL followed by SSTORE: state written after an external call".into(),
            Self::Selfdestruct => "SELFDESTRUCT opcode reachable in runtime code".into(),
            Self::Delegatecall => "DELEGATECALL opcode present in runtime code".into(),
            Self::TxOrigin => "ORIGIN opcode used, likely tx.origin authorization".into(),
            Self::UncheckedCall => "CALL success flag discarded with POP".into(),
            Self::Selector(sig, sel) => format!("dispatches selector 0x{:08x} ({})", sel, sig),
        }
    }
}

/// Opcodes of `code` with PUSH immediates stripped, plus every PUSH4 value.
fn disassemble(code: &[u8]) -> (Vec<u8>, HashSet<u32>) {
    let mut ops = Vec::with_capacity(code.len());
    let mut selectors = HashSet::new();
    let mut pc = 0;
    while pc < code.len() {
        let op = code[pc];
        ops.push(op);
        if (OP_PUSH1..=OP_PUSH32).contains(&op) {
            let width = (op - OP_PUSH1 + 1) as usize;
            if op == OP_PUSH4 && pc + 4 < code.len() {
                let imm = &code[pc + 1..pc + 5];
                selectors.insert(u32::from_be_bytes([imm[0], imm[1], imm[2], imm[3]]));
            }
            pc += width;
        }
        pc += 1;
    }
    (ops, selectors)
}

/// Match every signature against runtime bytecode.
/// Returns (kind, confidence, evidence) triples above [`MIN_CONFIDENCE`].
pub fn analyze_bytecode(code: &[u8]) -> Vec<(VulnerabilityKind, f64, String)> {
    let (ops, selectors) = disassemble(code);
    let mut findings = Vec::new();

    for (kind, sig) in Signature::all() {
        let confidence = match sig {
            Signature::CallThenStore => match ops.iter().position(|&op| op == OP_CALL) {
                Some(call_at) if ops[call_at..].contains(&OP_SSTORE) => 0.6,
                _ => continue,
            },
            Signature::Selfdestruct if ops.contains(&OP_SELFDESTRUCT) => 0.7,
            Signature::Delegatecall if ops.contains(&OP_DELEGATECALL) => 0.5,
            Signature::TxOrigin if ops.contains(&OP_ORIGIN) => 0.6,
            Signature::UncheckedCall if ops.windows(2).any(|w| w == [OP_CALL, OP_POP]) => 0.6,
            Signature::Selector(_, sel) if selectors.contains(&sel) => 0.5,
            _ => continue,
        };
        if confidence >= MIN_CONFIDENCE {
            findings.push((kind, confidence, sig.describe()));
        }
    }

    findings
}

// ─── Analyzer ────────────────────────────────────────────────────────────────

pub struct BytecodeAnalyzer {
    rpc: Arc<RpcPool>,
}

impl BytecodeAnalyzer {
    pub fn new(rpc: Arc<RpcPool>) -> Self {
        Self { rpc }
    }
}

pub fn build_analysis(contract: &ContractData, network: Network, code: &[u8]) -> AnalysisData {
    let mut vulnerabilities: Vec<Vulnerability> = Vec::new();
    for (kind, confidence, evidence) in analyze_bytecode(code) {
        // one finding per kind; keep the first (strongest-listed) signature
        if vulnerabilities.iter().any(|v| v.kind == kind) {
            continue;
        }
        let mut vuln = Vulnerability::new(
            kind,
            ToolKind::BytecodeScan,
            format!("{} (confidence {:.0}%)", evidence, confidence * 100.0),
        );
        vuln.location = Some(format!("{}:runtime", contract.address));
        vulnerabilities.push(vuln);
    }

    let results = AnalysisResults { vulnerabilities };
    let counts = crate::findings::SeverityCounts::from_vulnerabilities(&results.vulnerabilities);
    AnalysisData {
        contract_address: contract.address.clone(),
        network: network.key().to_string(),
        summary: serde_json::json!({
            "totalVulnerabilities": counts.total(),
            "critical": counts.critical,
            "high": counts.high,
            "medium": counts.medium,
            "low": counts.low,
            "riskLevel": counts.risk_label(),
            "bytecodeSize": code.len(),
            "analyzedAt": chrono::Utc::now().to_rfc3339(),
        }),
        results,
    }
}

#[async_trait]
impl ContractAnalyzer for BytecodeAnalyzer {
    async fn analyze(&self, contract: &ContractData) -> Result<AnalysisData, AnalysisError> {
        if contract.address.trim().is_empty() {
            return Err(AnalysisError::MissingAddress);
        }
        let network = Network::resolve(&contract.network);
        let code = self.rpc.fetch_code(network, &contract.address).await?;
        if code.is_empty() {
            return Err(AnalysisError::NotAContract(contract.address.clone()));
        }

        let analysis = build_analysis(contract, network, &code);
        info!(
            "[ANALYSIS] {} on {}: {} bytes, {} findings",
            contract.address,
            network,
            code.len(),
            analysis.vulnerabilities().len()
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &[u8]) -> Vec<VulnerabilityKind> {
        analyze_bytecode(code).into_iter().map(|(k, _, _)| k).collect()
    }

    #[test]
    fn test_call_then_sstore_is_reentrancy() {
        // PUSH1 0x80 PUSH1 0x40 MSTORE CALL SSTORE
        let code = [0x60, 0x80, 0x60, 0x40, 0x52, OP_CALL, OP_SSTORE];
        assert!(kinds(&code).contains(&VulnerabilityKind::Reentrancy));
    }

    #[test]
    fn test_push_data_is_not_an_opcode() {
        // PUSH2 0xff55 - both bytes are immediates, not SELFDESTRUCT/SSTORE
        let code = [0x61, 0xff, 0x55, 0x00];
        assert!(kinds(&code).is_empty());
    }

    #[test]
    fn test_selector_detection() {
        // PUSH4 0x5cffe9de EQ
        let code = [OP_PUSH4, 0x5c, 0xff, 0xe9, 0xde, 0x14, 0x00];
        assert_eq!(kinds(&code), vec![VulnerabilityKind::FlashLoan]);
    }

    #[test]
    fn test_unchecked_call_and_origin() {
        let code = [OP_ORIGIN, 0x00, OP_CALL, OP_POP];
        let found = kinds(&code);
        assert!(found.contains(&VulnerabilityKind::AccessControl));
        assert!(found.contains(&VulnerabilityKind::UncheckedCall));
    }

    #[test]
    fn test_build_analysis_deduplicates_kinds() {
        let code = [
            OP_PUSH4, 0x5c, 0xff, 0xe9, 0xde, OP_PUSH4, 0x92, 0x0f, 0x5c, 0x84, 0x00,
        ];
        let contract = ContractData {
            address: "0x1111111111111111111111111111111111111111".into(),
            network: "base".into(),
            name: None,
        };
        let analysis = build_analysis(&contract, Network::Base, &code);
        assert_eq!(analysis.vulnerabilities().len(), 1);
        assert_eq!(analysis.network, "base");
        assert_eq!(analysis.summary["totalVulnerabilities"], 1);
        assert_eq!(analysis.vulnerabilities()[0].tool, ToolKind::BytecodeScan);
    }

    #[tokio::test]
    async fn test_missing_address() {
        let pool = RpcPool::with_endpoints(vec![], std::time::Duration::from_secs(1)).unwrap();
        let analyzer = BytecodeAnalyzer::new(Arc::new(pool));
        let contract = ContractData {
            address: " ".into(),
            network: "ethereum".into(),
            name: None,
        };
        assert!(matches!(
            analyzer.analyze(&contract).await,
            Err(AnalysisError::MissingAddress)
        ));
    }
}
