//! Runtime settings
//!
//! Resolution order: built-in defaults, then environment (`.env` is loaded
//! first by `main`), then command-line flags.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid environment: {0}")]
    Env(#[from] envy::Error),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON credentials in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed TOML credentials in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Allowed CORS origin. Unset means any origin.
    #[serde(default)]
    pub client_url: Option<String>,
    #[serde(default = "default_app_env")]
    pub app_env: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub mongodb_uri: Option<String>,
    #[serde(default = "default_reports_dir")]
    pub reports_dir: PathBuf,
    #[serde(default = "default_client_build_dir")]
    pub client_build_dir: PathBuf,
    #[serde(default = "default_platform_credentials")]
    pub platform_credentials: PathBuf,
    #[serde(default = "default_screenshot_timeout")]
    pub screenshot_timeout_secs: u64,
    #[serde(default = "default_screenshot_settle")]
    pub screenshot_settle_ms: u64,
    #[serde(default = "default_rate_limit_rps")]
    pub rate_limit_rps: u32,
    #[serde(default = "default_rate_limit_burst")]
    pub rate_limit_burst: u32,
    #[serde(default = "default_true")]
    pub generate_poc: bool,
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

fn default_port() -> u16 {
    5000
}
fn default_app_env() -> String {
    "development".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_reports_dir() -> PathBuf {
    PathBuf::from("server/reports")
}
fn default_client_build_dir() -> PathBuf {
    PathBuf::from("client/build")
}
fn default_platform_credentials() -> PathBuf {
    PathBuf::from("server/config/platform-credentials.json")
}
fn default_screenshot_timeout() -> u64 {
    30
}
fn default_screenshot_settle() -> u64 {
    3000
}
fn default_rate_limit_rps() -> u32 {
    10
}
fn default_rate_limit_burst() -> u32 {
    100
}
fn default_true() -> bool {
    true
}
fn default_rpc_timeout() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: default_port(),
            client_url: None,
            app_env: default_app_env(),
            log_level: default_log_level(),
            mongodb_uri: None,
            reports_dir: default_reports_dir(),
            client_build_dir: default_client_build_dir(),
            platform_credentials: default_platform_credentials(),
            screenshot_timeout_secs: default_screenshot_timeout(),
            screenshot_settle_ms: default_screenshot_settle(),
            rate_limit_rps: default_rate_limit_rps(),
            rate_limit_burst: default_rate_limit_burst(),
            generate_poc: true,
            rpc_timeout_secs: default_rpc_timeout(),
        }
    }
}

/// Flag values that take precedence over the environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub port: Option<u16>,
    pub reports_dir: Option<PathBuf>,
    pub client_build_dir: Option<PathBuf>,
    pub no_poc: bool,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::from_env::<Settings>()?)
    }

    pub fn from_iter<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::from_iter::<_, Settings>(vars)?)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(dir) = overrides.reports_dir {
            self.reports_dir = dir;
        }
        if let Some(dir) = overrides.client_build_dir {
            self.client_build_dir = dir;
        }
        if overrides.no_poc {
            self.generate_poc = false;
        }
        self
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }

    pub fn screenshot_timeout(&self) -> Duration {
        Duration::from_secs(self.screenshot_timeout_secs)
    }

    pub fn screenshot_settle(&self) -> Duration {
        Duration::from_millis(self.screenshot_settle_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

// ─── Platform Credentials ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCredential {
    #[serde(default, alias = "username")]
    pub api_username: String,
    #[serde(alias = "token", alias = "api_token")]
    pub api_token: String,
    /// Overrides the platform's public API base, e.g. for a sandbox.
    #[serde(default, alias = "base_url")]
    pub base_url: Option<String>,
}

/// Credentials keyed by lower-case platform key (`hackerone`, `bugcrowd`, ...).
pub type Credentials = HashMap<String, PlatformCredential>;

/// Load platform credentials; `.toml` files are parsed as TOML, anything
/// else as JSON. A missing file yields an empty set.
pub fn load_credentials(path: &Path) -> Result<Credentials, ConfigError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("[CONFIG] no platform credentials at {}", path.display());
            return Ok(Credentials::new());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let parsed: Credentials = if path.extension().is_some_and(|ext| ext == "toml") {
        toml::from_str(&raw).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })?
    } else {
        serde_json::from_str(&raw).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?
    };

    let creds: Credentials = parsed
        .into_iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v))
        .collect();
    info!("[CONFIG] loaded credentials for {} platform(s)", creds.len());
    Ok(creds)
}
