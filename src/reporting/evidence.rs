//! Tool evidence pages.
//!
//! Each finding gets an HTML page styled as a terminal session of the tool
//! that reported it. Output is templated from the finding; no tool is run.

use serde::Serialize;

use super::html::escape_html;
use crate::findings::{ContractData, Severity, ToolKind, Vulnerability};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceArtifact {
    pub title: String,
    pub tool: ToolKind,
    pub severity: Severity,
    pub html_rel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png_rel: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EvidencePage {
    pub file_stem: String,
    pub title: String,
    pub html: String,
}

pub fn render_evidence(index: usize, vuln: &Vulnerability, contract: &ContractData) -> EvidencePage {
    let file_stem = format!("{:02}_{}_{}", index + 1, vuln.tool.as_str(), vuln.kind.slug());
    let title = format!("{} ({})", vuln.kind.title(), vuln.severity.label());
    let output = terminal_output(vuln, contract);

    let html = format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8"><title>{title}</title>
<style>
    body {{ background: #0c0c0c; margin: 0; padding: 40px; font-family: 'JetBrains Mono', Consolas, monospace; }}
    .term {{ background: #000; border: 1px solid #333; border-radius: 8px; max-width: 1100px; margin: 0 auto; }}
    .bar {{ background: #222; padding: 8px 14px; color: #aaa; border-radius: 8px 8px 0 0; }}
    pre {{ color: #d0d0d0; padding: 20px; white-space: pre-wrap; margin: 0; }}
    .hl {{ color: #ff5555; }}
</style></head>
<body><div class="term"><div class="bar">{tool} &mdash; {title}</div><pre>{output}</pre></div></body></html>"#,
        title = escape_html(&title),
        tool = vuln.tool.display_name(),
        output = escape_html(&output),
    );

    EvidencePage { file_stem, title, html }
}

fn terminal_output(vuln: &Vulnerability, contract: &ContractData) -> String {
    match vuln.tool {
        ToolKind::Slither => slither_output(vuln, contract),
        ToolKind::Mythril => mythril_output(vuln, contract),
        ToolKind::Echidna => echidna_output(vuln, contract),
        ToolKind::Manticore => manticore_output(vuln, contract),
        ToolKind::BytecodeScan => bytecode_output(vuln, contract),
        ToolKind::ManualReview => manual_output(vuln, contract),
    }
}

fn location(vuln: &Vulnerability) -> &str {
    vuln.location.as_deref().unwrap_or("Contract.sol")
}

fn slither_output(vuln: &Vulnerability, contract: &ContractData) -> String {
    format!(
        "$ slither {addr} --detect {detector}\n\
         INFO:Detectors:\n\
         {title} in {loc}\n\
         \t{desc}\n\
         Reference: https://github.com/crytic/slither/wiki/Detector-Documentation#{detector}\n\
         INFO:Slither:{addr} analyzed, 1 result(s) found ({severity})",
        addr = contract.address,
        detector = vuln.kind.slither_detector(),
        title = vuln.kind.title(),
        loc = location(vuln),
        desc = vuln.description,
        severity = vuln.severity.label(),
    )
}

fn mythril_output(vuln: &Vulnerability, contract: &ContractData) -> String {
    format!(
        "$ myth analyze -a {addr} --rpc infura-{network}\n\
         ==== {title} ====\n\
         SWC ID: {swc}\n\
         Severity: {severity}\n\
         Contract: {name}\n\
         Location: {loc}\n\
         --------------------\n\
         {desc}\n\
         --------------------\n\
         Transaction Sequence:\n\
         Caller: [ATTACKER], function: attack(), value: 0",
        addr = contract.address,
        network = contract.network,
        title = vuln.kind.title(),
        swc = vuln.kind.swc_id().unwrap_or("n/a"),
        severity = vuln.severity.label(),
        name = contract.display_name(),
        loc = location(vuln),
        desc = vuln.description,
    )
}

fn echidna_output(vuln: &Vulnerability, contract: &ContractData) -> String {
    format!(
        "$ echidna . --contract {name} --test-mode assertion\n\
         Analyzing contract: {name}\n\
         echidna_{slug}: FAILED!\n\
         \x20 Call sequence:\n\
         \x20   deposit() Value: 0x1\n\
         \x20   attack()\n\
         {desc}\n\
         Unique instructions: 1337\n\
         Seed: 0",
        name = contract.display_name().replace(' ', ""),
        slug = vuln.kind.slug().replace('-', "_"),
        desc = vuln.description,
    )
}

fn manticore_output(vuln: &Vulnerability, contract: &ContractData) -> String {
    format!(
        "$ manticore --contract {addr} --quick-mode\n\
         m.main:INFO: Registered plugins: DetectAll\n\
         m.main:INFO: Beginning analysis\n\
         m.e.manticore:WARNING: {title} at {loc}\n\
         \x20   {desc}\n\
         m.c.manticore:INFO: Results in mcore_{short}",
        addr = contract.address,
        title = vuln.kind.title(),
        loc = location(vuln),
        desc = vuln.description,
        short = contract.address.trim_start_matches("0x").chars().take(8).collect::<String>(),
    )
}

fn bytecode_output(vuln: &Vulnerability, contract: &ContractData) -> String {
    format!(
        "$ forge bytecode-scan {addr} --chain {network}\n\
         [scan] fetched runtime code via eth_getCode\n\
         [match] {title}: {desc}\n\
         [risk] {severity}",
        addr = contract.address,
        network = contract.network,
        title = vuln.kind.title(),
        desc = vuln.description,
        severity = vuln.severity.label(),
    )
}

fn manual_output(vuln: &Vulnerability, contract: &ContractData) -> String {
    format!(
        "Manual review notes - {name}\n\
         Finding:  {title}\n\
         Severity: {severity}\n\
         Location: {loc}\n\n\
         {desc}\n\n\
         Suggested fix: {fix}",
        name = contract.display_name(),
        title = vuln.kind.title(),
        severity = vuln.severity.label(),
        loc = location(vuln),
        desc = vuln.description,
        fix = vuln.kind.remediation(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::VulnerabilityKind;

    fn contract() -> ContractData {
        ContractData {
            address: "0xdeadbeef00".into(),
            network: "ethereum".into(),
            name: Some("Lending Pool".into()),
        }
    }

    #[test]
    fn test_dispatch_per_tool() {
        let c = contract();
        let mut v = Vulnerability::new(VulnerabilityKind::Reentrancy, ToolKind::Slither, "re-enter <withdraw>");

        let page = render_evidence(0, &v, &c);
        assert_eq!(page.file_stem, "01_slither_reentrancy");
        assert!(page.html.contains("reentrancy-eth"));
        assert!(page.html.contains("re-enter &lt;withdraw&gt;"));

        v.tool = ToolKind::Mythril;
        let page = render_evidence(1, &v, &c);
        assert_eq!(page.file_stem, "02_mythril_reentrancy");
        assert!(page.html.contains("SWC-107"));

        v.tool = ToolKind::Echidna;
        assert!(render_evidence(2, &v, &c).html.contains("echidna_reentrancy: FAILED!"));
    }

    #[test]
    fn test_other_kind_has_no_swc() {
        let c = contract();
        let v = Vulnerability::new(VulnerabilityKind::Other("Logic Bug".into()), ToolKind::Mythril, "");
        let page = render_evidence(0, &v, &c);
        assert!(page.html.contains("SWC ID: n/a"));
        assert_eq!(page.file_stem, "01_mythril_logic-bug");
    }
}
