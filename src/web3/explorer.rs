//! Block explorer URL table.
//!
//! Every supported network maps to an Etherscan-family explorer. Unknown
//! network keys resolve to Ethereum so a report can always be assembled.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Optimism,
    Base,
    Avalanche,
    Fantom,
}

impl Network {
    pub fn all() -> Vec<Self> {
        vec![
            Self::Ethereum,
            Self::Bsc,
            Self::Polygon,
            Self::Arbitrum,
            Self::Optimism,
            Self::Base,
            Self::Avalanche,
            Self::Fantom,
        ]
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" => Some(Self::Ethereum),
            "bsc" | "binance" | "bnb" => Some(Self::Bsc),
            "polygon" | "matic" => Some(Self::Polygon),
            "arbitrum" | "arb" => Some(Self::Arbitrum),
            "optimism" | "op" => Some(Self::Optimism),
            "base" => Some(Self::Base),
            "avalanche" | "avax" => Some(Self::Avalanche),
            "fantom" | "ftm" => Some(Self::Fantom),
            _ => None,
        }
    }

    /// Like [`Network::from_key`] but falls back to Ethereum.
    pub fn resolve(key: &str) -> Self {
        Self::from_key(key).unwrap_or(Self::Ethereum)
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Bsc => "bsc",
            Self::Polygon => "polygon",
            Self::Arbitrum => "arbitrum",
            Self::Optimism => "optimism",
            Self::Base => "base",
            Self::Avalanche => "avalanche",
            Self::Fantom => "fantom",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ethereum => "Ethereum Mainnet",
            Self::Bsc => "BNB Smart Chain",
            Self::Polygon => "Polygon PoS",
            Self::Arbitrum => "Arbitrum One",
            Self::Optimism => "OP Mainnet",
            Self::Base => "Base",
            Self::Avalanche => "Avalanche C-Chain",
            Self::Fantom => "Fantom Opera",
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Ethereum => 1,
            Self::Bsc => 56,
            Self::Polygon => 137,
            Self::Arbitrum => 42161,
            Self::Optimism => 10,
            Self::Base => 8453,
            Self::Avalanche => 43114,
            Self::Fantom => 250,
        }
    }

    pub fn explorer_base(&self) -> &'static str {
        match self {
            Self::Ethereum => "https://etherscan.io",
            Self::Bsc => "https://bscscan.com",
            Self::Polygon => "https://polygonscan.com",
            Self::Arbitrum => "https://arbiscan.io",
            Self::Optimism => "https://optimistic.etherscan.io",
            Self::Base => "https://basescan.org",
            Self::Avalanche => "https://snowtrace.io",
            Self::Fantom => "https://ftmscan.com",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ─── Explorer Sub-Pages ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplorerUrls {
    pub contract: String,
    pub code: String,
    pub transactions: String,
    pub events: String,
    pub analytics: String,
}

impl ExplorerUrls {
    pub const KEYS: [&'static str; 5] = ["contract", "code", "transactions", "events", "analytics"];

    /// Sub-pages in capture order.
    pub fn entries(&self) -> [(&'static str, &str); 5] {
        [
            ("contract", self.contract.as_str()),
            ("code", self.code.as_str()),
            ("transactions", self.transactions.as_str()),
            ("events", self.events.as_str()),
            ("analytics", self.analytics.as_str()),
        ]
    }
}

pub fn explorer_urls(address: &str, network: &str) -> ExplorerUrls {
    let base = Network::resolve(network).explorer_base();
    let address = address.trim();
    ExplorerUrls {
        contract: format!("{}/address/{}", base, address),
        code: format!("{}/address/{}#code", base, address),
        transactions: format!("{}/txs?a={}", base, address),
        events: format!("{}/address/{}#events", base, address),
        analytics: format!("{}/address/{}#analytics", base, address),
    }
}
