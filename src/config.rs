use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub assets: AssetsConfig,
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

/// Where uploaded images live and how to reach the hosting service.
#[derive(Debug, Deserialize, Clone)]
pub struct AssetsConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub cloud_name: Option<String>,
    /// URLs containing this host are treated as hosted assets.
    #[serde(default = "default_asset_host")]
    pub host: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            cloud_name: None,
            host: default_asset_host(),
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_asset_host() -> String {
    "res.cloudinary.com".to_string()
}
fn default_api_base() -> String {
    "https://api.cloudinary.com/v1_1".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_upload_bytes() -> usize {
    folio_core::content::DEFAULT_MAX_UPLOAD_BYTES
}

impl AssetsConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    /// Upper bound on one asset request: every attempt times out and every
    /// retry waits its full backoff (1s, 2s, 4s, ... capped at 32s).
    pub fn worst_case_request_secs(&self) -> u64 {
        let attempts = u64::from(self.max_retries) + 1;
        let backoff: u64 = (1..=self.max_retries).map(|a| 1u64 << (a - 1).min(5)).sum();
        self.timeout_secs.saturating_mul(attempts).saturating_add(backoff)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LifecycleConfig {
    /// Seconds after which an unfinished restore/purge claim is ignored.
    ///
    /// Purge renews its claim before each asset request, so this must
    /// exceed [`AssetsConfig::worst_case_request_secs`].
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            claim_ttl_secs: default_claim_ttl_secs(),
        }
    }
}

fn default_claim_ttl_secs() -> u64 {
    folio_core::lifecycle::DEFAULT_CLAIM_TTL_SECS as u64
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.server.bind.parse::<std::net::SocketAddr>().is_err() {
        anyhow::bail!("server.bind must be a socket address, got '{}'", config.server.bind);
    }

    match config.assets.provider.as_str() {
        "disabled" => {}
        "cloudinary" => {
            if config.assets.cloud_name.as_deref().unwrap_or("").is_empty() {
                anyhow::bail!("assets.cloud_name must be set when provider is 'cloudinary'");
            }
        }
        other => anyhow::bail!(
            "Unknown asset provider: '{}'. Must be disabled or cloudinary.",
            other
        ),
    }

    if config.assets.host.is_empty() {
        anyhow::bail!("assets.host must not be empty");
    }
    if config.assets.max_upload_bytes == 0 {
        anyhow::bail!("assets.max_upload_bytes must be > 0");
    }
    if config.lifecycle.claim_ttl_secs == 0 {
        anyhow::bail!("lifecycle.claim_ttl_secs must be > 0");
    }
    if config.assets.is_enabled() {
        let bound = config.assets.worst_case_request_secs();
        if config.lifecycle.claim_ttl_secs <= bound {
            anyhow::bail!(
                "lifecycle.claim_ttl_secs ({}) must exceed the worst-case asset request time of {}s \
                 (assets.timeout_secs × (assets.max_retries + 1) plus backoff)",
                config.lifecycle.claim_ttl_secs,
                bound
            );
        }
    }

    Ok(config)
}
