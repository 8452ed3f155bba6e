//! HTML and plain-text rendering for report artifacts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::evidence::EvidenceArtifact;
use crate::findings::{AnalysisData, ContractData, Severity, SeverityCounts};
use crate::web3::explorer::{ExplorerUrls, Network};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotArtifact {
    pub key: String,
    pub url: String,
    pub rel_path: String,
    pub placeholder: bool,
}

pub struct ReportView<'a> {
    pub report_id: &'a str,
    pub generated_at: DateTime<Utc>,
    pub contract: &'a ContractData,
    pub analysis: &'a AnalysisData,
    pub explorer: &'a ExplorerUrls,
    pub screenshots: &'a [ScreenshotArtifact],
    pub visualization: Option<&'a str>,
    pub evidence: &'a [EvidenceArtifact],
    pub poc_files: &'a [String],
}

/// Safe in text and in quoted attributes.
pub fn escape_html(raw: &str) -> String {
    html_escape::encode_quoted_attribute(raw).into_owned()
}

fn severity_class(severity: Severity) -> &'static str {
    severity.as_str()
}

const BASE_CSS: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body { font-family: 'JetBrains Mono', Consolas, monospace; line-height: 1.6; color: #e0e0e0; background: #0a0a0a; }
        .container { max-width: 1200px; margin: 0 auto; padding: 20px; }
        .header { background: linear-gradient(135deg, #0f0f0f 0%, #1a1a1a 100%); color: #39ff14; padding: 40px; border-radius: 10px; margin-bottom: 30px; border: 1px solid #39ff14; }
        .header h1 { font-size: 2.2em; margin-bottom: 10px; }
        .header p { color: #b0b0b0; }
        .section { background: #111; padding: 30px; margin-bottom: 20px; border-radius: 10px; border: 1px solid #2a2a2a; }
        .section h2 { color: #39ff14; margin-bottom: 20px; padding-bottom: 10px; border-bottom: 2px solid #39ff14; }
        .stats-grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(150px, 1fr)); gap: 20px; }
        .stat-card { text-align: center; padding: 20px; border-radius: 8px; background: #1a1a1a; border: 1px solid #2a2a2a; }
        .stat-card .number { font-size: 2em; font-weight: 700; }
        .critical { border-left: 4px solid #ff4444; }
        .high { border-left: 4px solid #ff8c00; }
        .medium { border-left: 4px solid #ffc107; }
        .low { border-left: 4px solid #2196f3; }
        .info { border-left: 4px solid #9e9e9e; }
        table { width: 100%; border-collapse: collapse; }
        th, td { text-align: left; padding: 10px; border-bottom: 1px solid #2a2a2a; vertical-align: top; }
        th { color: #39ff14; }
        a { color: #39ff14; }
        .gallery { display: grid; grid-template-columns: repeat(auto-fit, minmax(320px, 1fr)); gap: 20px; }
        .gallery figure { background: #1a1a1a; padding: 10px; border-radius: 8px; }
        .gallery img { width: 100%; border-radius: 4px; }
        .gallery figcaption { margin-top: 8px; font-size: 0.9em; color: #b0b0b0; }
        .muted { color: #777; }
        .footer { text-align: center; color: #777; padding: 20px; }
"#;

// ─── Aggregated Report ───────────────────────────────────────────────────────

pub fn render_report(view: &ReportView<'_>) -> String {
    let network = Network::resolve(&view.contract.network);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Web3 Security Report - {title}</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Web3 Security Assessment</h1>
            <p>{title} &middot; <code>{address}</code> &middot; {network}</p>
            <p>Report {report_id} &middot; generated {generated}</p>
        </div>
        {summary}
        {findings}
        {screenshots}
        {visualization}
        {evidence}
        {poc}
        <div class="footer">Evidence pages are generated from templates and must be reproduced before submission.</div>
    </div>
</body>
</html>"#,
        title = escape_html(view.contract.display_name()),
        css = BASE_CSS,
        address = escape_html(&view.contract.address),
        network = network.display_name(),
        report_id = escape_html(view.report_id),
        generated = view.generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
        summary = summary_section(view.analysis),
        findings = findings_section(view.analysis),
        screenshots = screenshots_section(view.explorer, view.screenshots),
        visualization = visualization_section(view.visualization),
        evidence = evidence_section(view.evidence),
        poc = poc_section(view.poc_files),
    )
}

fn summary_section(analysis: &AnalysisData) -> String {
    let counts = analysis.severity_counts();
    let card = |class: &str, label: &str, n: usize| {
        format!(
            r#"<div class="stat-card {}"><div class="number">{}</div><div>{}</div></div>"#,
            class, n, label
        )
    };
    format!(
        r#"<div class="section">
            <h2>Executive Summary</h2>
            <p>Overall risk: <strong>{risk}</strong> &middot; {total} finding(s)</p>
            <div class="stats-grid">{c}{h}{m}{l}{i}</div>
        </div>"#,
        risk = counts.risk_label(),
        total = counts.total(),
        c = card("critical", "Critical", counts.critical),
        h = card("high", "High", counts.high),
        m = card("medium", "Medium", counts.medium),
        l = card("low", "Low", counts.low),
        i = card("info", "Info", counts.info),
    )
}

fn findings_section(analysis: &AnalysisData) -> String {
    let vulns = analysis.vulnerabilities();
    if vulns.is_empty() {
        return r#"<div class="section"><h2>Findings</h2><p class="muted">No vulnerabilities were reported for this contract.</p></div>"#.to_string();
    }

    let rows: String = vulns
        .iter()
        .enumerate()
        .map(|(i, v)| {
            format!(
                r#"<tr class="{class}"><td>{n}</td><td>{title}</td><td>{severity}</td><td>{tool}</td><td>{location}</td><td>{description}<br><span class="muted">{fix}</span></td></tr>"#,
                class = severity_class(v.severity),
                n = i + 1,
                title = escape_html(&v.kind.title()),
                severity = v.severity.label(),
                tool = v.tool.display_name(),
                location = escape_html(v.location.as_deref().unwrap_or("-")),
                description = escape_html(&v.description),
                fix = v.kind.remediation(),
            )
        })
        .collect();

    format!(
        r#"<div class="section">
            <h2>Findings</h2>
            <table>
                <thead><tr><th>#</th><th>Type</th><th>Severity</th><th>Tool</th><th>Location</th><th>Details</th></tr></thead>
                <tbody>{}</tbody>
            </table>
        </div>"#,
        rows
    )
}

fn screenshots_section(explorer: &ExplorerUrls, shots: &[ScreenshotArtifact]) -> String {
    let links: String = explorer
        .entries()
        .iter()
        .map(|(key, url)| format!(r#"<li>{}: <a href="{}">{}</a></li>"#, key, escape_html(url), escape_html(url)))
        .collect();

    let gallery = if shots.is_empty() {
        r#"<p class="muted">No explorer screenshots are available.</p>"#.to_string()
    } else {
        let figures: String = shots
            .iter()
            .map(|s| {
                format!(
                    r#"<figure><a href="{path}"><img src="{path}" alt="{key}"></a><figcaption>{key}{note}</figcaption></figure>"#,
                    path = escape_html(&s.rel_path),
                    key = escape_html(&s.key),
                    note = if s.placeholder { " (placeholder: capture failed)" } else { "" },
                )
            })
            .collect();
        format!(r#"<div class="gallery">{}</div>"#, figures)
    };

    format!(
        r#"<div class="section"><h2>Block Explorer</h2><ul>{}</ul><br>{}</div>"#,
        links, gallery
    )
}

fn visualization_section(visualization: Option<&str>) -> String {
    match visualization {
        Some(path) if path.ends_with(".png") => format!(
            r#"<div class="section"><h2>Contract Visualization</h2><div class="gallery"><figure><img src="{0}" alt="contract visualization"></figure></div></div>"#,
            escape_html(path)
        ),
        Some(path) => format!(
            r#"<div class="section"><h2>Contract Visualization</h2><p><a href="{0}">Open visualization</a></p></div>"#,
            escape_html(path)
        ),
        None => String::new(),
    }
}

fn evidence_section(evidence: &[EvidenceArtifact]) -> String {
    if evidence.is_empty() {
        return String::new();
    }
    let rows: String = evidence
        .iter()
        .map(|e| {
            let image = e
                .png_rel
                .as_deref()
                .map(|p| format!(r#" &middot; <a href="{}">screenshot</a>"#, escape_html(p)))
                .unwrap_or_default();
            format!(
                r#"<tr class="{class}"><td>{title}</td><td>{tool}</td><td><a href="{html}">terminal output</a>{image}</td></tr>"#,
                class = severity_class(e.severity),
                title = escape_html(&e.title),
                tool = e.tool.display_name(),
                html = escape_html(&e.html_rel),
                image = image,
            )
        })
        .collect();
    format!(
        r#"<div class="section"><h2>Tool Evidence</h2><table><thead><tr><th>Finding</th><th>Tool</th><th>Artifacts</th></tr></thead><tbody>{}</tbody></table></div>"#,
        rows
    )
}

fn poc_section(files: &[String]) -> String {
    if files.is_empty() {
        return String::new();
    }
    let items: String = files
        .iter()
        .map(|f| format!(r#"<li><a href="{0}">{0}</a></li>"#, escape_html(f)))
        .collect();
    format!(
        r#"<div class="section"><h2>Proof of Concept</h2><p>Foundry project scaffold. Run <code>forge test -vvv</code> inside <code>immunefi_poc/</code>.</p><ul>{}</ul></div>"#,
        items
    )
}

// ─── Supporting Pages ────────────────────────────────────────────────────────

/// Stand-in page rendered when an explorer capture fails.
pub fn render_placeholder(key: &str, url: &str, reason: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8"><style>{css}
        .box {{ margin: 200px auto; max-width: 900px; text-align: center; }}
</style></head>
<body><div class="box section">
    <h2>{key} screenshot unavailable</h2>
    <p><a href="{url}">{url}</a></p>
    <p class="muted">{reason}</p>
</div></body></html>"#,
        css = BASE_CSS,
        key = escape_html(key),
        url = escape_html(url),
        reason = escape_html(reason),
    )
}

pub fn render_contract_visualization(contract: &ContractData, analysis: &AnalysisData) -> String {
    let network = Network::resolve(&contract.network);
    let counts = analysis.severity_counts();
    let bars: String = [
        ("critical", counts.critical),
        ("high", counts.high),
        ("medium", counts.medium),
        ("low", counts.low),
        ("info", counts.info),
    ]
    .iter()
    .map(|(class, n)| {
        format!(
            r#"<div class="stat-card {0}" style="min-height: {1}px"><div class="number">{2}</div><div>{0}</div></div>"#,
            class,
            60 + n * 40,
            n
        )
    })
    .collect();

    format!(
        r#"<!DOCTYPE html>
<html><head><meta charset="UTF-8"><style>{css}</style></head>
<body><div class="container">
    <div class="header"><h1>{name}</h1><p><code>{address}</code></p><p>{network} &middot; chain id {chain_id}</p></div>
    <div class="section"><h2>Finding Distribution</h2><div class="stats-grid">{bars}</div></div>
</div></body></html>"#,
        css = BASE_CSS,
        name = escape_html(contract.display_name()),
        address = escape_html(&contract.address),
        network = network.display_name(),
        chain_id = network.chain_id(),
        bars = bars,
    )
}

// ─── Executive Summary ───────────────────────────────────────────────────────

pub fn render_executive_summary(
    report_id: &str,
    generated_at: DateTime<Utc>,
    contract: &ContractData,
    analysis: &AnalysisData,
) -> String {
    let counts: SeverityCounts = analysis.severity_counts();
    let network = Network::resolve(&contract.network);
    let potential: f64 = analysis
        .vulnerabilities()
        .iter()
        .map(|v| v.severity.estimated_bounty_usd())
        .sum();

    let mut out = format!(
        "WEB3 SECURITY ASSESSMENT - EXECUTIVE SUMMARY\n\
         ============================================\n\n\
         Report ID:   {}\n\
         Generated:   {}\n\
         Contract:    {} ({})\n\
         Network:     {}\n\n\
         Overall risk: {}\n\
         Findings:     {} total ({} critical, {} high, {} medium, {} low, {} info)\n\
         Potential bounty (listed tiers): ${:.0}\n",
        report_id,
        generated_at.to_rfc3339(),
        contract.display_name(),
        contract.address,
        network.display_name(),
        counts.risk_label(),
        counts.total(),
        counts.critical,
        counts.high,
        counts.medium,
        counts.low,
        counts.info,
        potential,
    );

    if analysis.vulnerabilities().is_empty() {
        out.push_str("\nNo vulnerabilities were reported.\n");
    } else {
        out.push_str("\nKey findings:\n");
        for (i, v) in analysis.vulnerabilities().iter().enumerate() {
            out.push_str(&format!(
                "  {}. [{}] {} - {}\n",
                i + 1,
                v.severity.label(),
                v.kind.title(),
                if v.description.is_empty() { "no description" } else { v.description.as_str() }
            ));
        }
        out.push_str("\nRecommendations:\n");
        let mut seen = Vec::new();
        for v in analysis.vulnerabilities() {
            let fix = v.kind.remediation();
            if !seen.contains(&fix) {
                seen.push(fix);
                out.push_str(&format!("  - {}\n", fix));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::findings::{AnalysisResults, ToolKind, Vulnerability, VulnerabilityKind};
    use crate::web3::explorer::explorer_urls;

    fn contract() -> ContractData {
        ContractData {
            address: "0xabc".into(),
            network: "arbitrum".into(),
            name: Some("Vault <v2>".into()),
        }
    }

    fn analysis(vulns: Vec<Vulnerability>) -> AnalysisData {
        AnalysisData {
            contract_address: "0xabc".into(),
            network: "arbitrum".into(),
            summary: serde_json::Value::Null,
            results: AnalysisResults { vulnerabilities: vulns },
        }
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&"#), "&lt;a href=&quot;x&quot;&gt;&amp;");
        assert!(!escape_html("it's").contains('\''));
        assert_eq!(escape_html("screenshots/contract.png"), "screenshots/contract.png");
    }

    #[test]
    fn test_report_links_screenshots_and_escapes_name() {
        let c = contract();
        let a = analysis(vec![Vulnerability::new(
            VulnerabilityKind::Reentrancy,
            ToolKind::Slither,
            "withdraw re-entered",
        )]);
        let urls = explorer_urls(&c.address, &c.network);
        let shots = vec![ScreenshotArtifact {
            key: "code".into(),
            url: urls.code.clone(),
            rel_path: "screenshots/code.png".into(),
            placeholder: false,
        }];
        let html = render_report(&ReportView {
            report_id: "web3_1",
            generated_at: Utc::now(),
            contract: &c,
            analysis: &a,
            explorer: &urls,
            screenshots: &shots,
            visualization: None,
            evidence: &[],
            poc_files: &[],
        });
        assert!(html.contains("Vault &lt;v2&gt;"));
        assert!(html.contains(r#"src="screenshots/code.png""#));
        assert!(html.contains("https://arbiscan.io/address/0xabc#code"));
        assert!(html.contains("Reentrancy"));
        assert!(!html.contains("Proof of Concept"));
    }

    #[test]
    fn test_empty_findings_render() {
        let c = contract();
        let a = analysis(vec![]);
        let urls = explorer_urls(&c.address, &c.network);
        let html = render_report(&ReportView {
            report_id: "web3_2",
            generated_at: Utc::now(),
            contract: &c,
            analysis: &a,
            explorer: &urls,
            screenshots: &[],
            visualization: None,
            evidence: &[],
            poc_files: &[],
        });
        assert!(html.contains("No vulnerabilities were reported"));
        assert!(html.contains("No explorer screenshots are available"));
    }

    #[test]
    fn test_executive_summary() {
        let c = contract();
        let a = analysis(vec![
            Vulnerability::new(VulnerabilityKind::Reentrancy, ToolKind::Slither, "x"),
            Vulnerability::new(VulnerabilityKind::Reentrancy, ToolKind::Mythril, ""),
        ]);
        let text = render_executive_summary("web3_3", Utc::now(), &c, &a);
        assert!(text.contains("Overall risk: CRITICAL"));
        assert!(text.contains("2 total (2 critical"));
        assert!(text.contains("Potential bounty (listed tiers): $100000"));
        // remediation listed once per kind
        assert_eq!(text.matches("checks-effects-interactions").count(), 1);
    }
}
