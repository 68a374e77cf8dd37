// ⚙️ Configuration
// Collector and server settings, defaults overridable through the environment

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BDAP_BASE_URL: &str = "https://bdap-opendata.mef.gov.it/api/v1";
pub const DEFAULT_ISTAT_ROSTER_URL: &str =
    "https://www.istat.it/storage/codici-unita-amministrative/Elenco-comuni-italiani.csv";
pub const USER_AGENT: &str = "Trasparenza-Comuni/1.0";
pub const DEFAULT_DATA_DIR: &str = "data/raw";

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_ROSTER_TTL_SECS: u64 = 6 * 60 * 60;

// ============================================================================
// COLLECTOR CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct CollectorConfig {
    pub bdap_base_url: String,
    pub istat_roster_url: String,
    pub user_agent: String,
    /// Applied to every upstream request; exceeding it yields SourceError::Timeout
    pub timeout: Duration,
    /// How long a downloaded ISTAT roster stays fresh
    pub roster_ttl: Duration,
    pub output_dir: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            bdap_base_url: DEFAULT_BDAP_BASE_URL.to_string(),
            istat_roster_url: DEFAULT_ISTAT_ROSTER_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            roster_ttl: Duration::from_secs(DEFAULT_ROSTER_TTL_SECS),
            output_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl CollectorConfig {
    /// Read overrides from the process environment
    ///
    /// TC_BDAP_BASE_URL, TC_ISTAT_URL, TC_HTTP_TIMEOUT_SECS, TC_ROSTER_TTL_SECS, TC_DATA_DIR
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as from_env, with an injectable lookup (used by tests)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CollectorConfig::default();

        if let Some(url) = non_empty(lookup("TC_BDAP_BASE_URL")) {
            config.bdap_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(url) = non_empty(lookup("TC_ISTAT_URL")) {
            config.istat_roster_url = url;
        }
        if let Some(secs) = parse_secs(lookup("TC_HTTP_TIMEOUT_SECS")) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(lookup("TC_ROSTER_TTL_SECS")) {
            config.roster_ttl = Duration::from_secs(secs);
        }
        if let Some(dir) = non_empty(lookup("TC_DATA_DIR")) {
            config.output_dir = PathBuf::from(dir);
        }

        config
    }
}

// ============================================================================
// SERVER CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl ServerConfig {
    /// HOST, PORT and TC_DATA_DIR
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ServerConfig::default();

        if let Some(host) = non_empty(lookup("HOST")) {
            config.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            config.port = port;
        }
        if let Some(dir) = non_empty(lookup("TC_DATA_DIR")) {
            config.data_dir = PathBuf::from(dir);
        }

        config
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_secs(value: Option<String>) -> Option<u64> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
}
