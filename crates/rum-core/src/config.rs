use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per chunk (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_secs_f64(self.base_delay_secs.max(0.0)),
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

/// Global configuration loaded from `~/.config/rum/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RumConfig {
    /// Maximum concurrent chunk transfers across all uploads.
    pub max_parallel: usize,
    /// Default chunk size in bytes for new uploads.
    pub chunk_size_bytes: u64,
    /// Per-attempt timeout in seconds for one chunk transfer.
    pub attempt_timeout_secs: u64,
    /// Base URL chunks are PUT to when the caller gives no explicit remote.
    #[serde(default)]
    pub default_remote: Option<String>,
    /// Extra headers sent with every chunk PUT (e.g. authorization).
    #[serde(default)]
    pub headers: Option<BTreeMap<String, String>>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for RumConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            chunk_size_bytes: 4 * 1024 * 1024,
            attempt_timeout_secs: 120,
            default_remote: None,
            headers: None,
            retry: None,
        }
    }
}

impl RumConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }

    /// Effective retry policy: the `[retry]` section if present, otherwise
    /// the built-in defaults.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
            .as_ref()
            .map(RetryConfig::to_policy)
            .unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("rum")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RumConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RumConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: RumConfig = toml::from_str(&data)?;
    Ok(cfg)
}
