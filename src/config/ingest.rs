use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{PipelineError, Result};

/// The ingest run configuration, read from YAML.
#[derive(Deserialize, Debug, Clone)]
pub struct IngestConfig {
    /// Root directory to scan.
    pub root: PathBuf,
    /// Company whose inbox this scan belongs to.
    pub company_id: i64,
    /// Path of the relational (SQLite) store.
    pub metadata_db: PathBuf,
    /// Directory backing the document store.
    pub detail_dir: PathBuf,

    #[serde(default = "default_extensions")]
    pub include_extensions: Vec<String>,
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Work queue capacity. Defaults to workers * 10 to cap memory during
    /// large scans.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    #[serde(default = "default_extract_timeout_ms")]
    pub extract_timeout_ms: u64,
    #[serde(default = "default_drain_timeout_secs")]
    pub drain_timeout_secs: u64,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
    #[serde(default = "default_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default)]
    pub breaker: BreakerConfig,
}

/// Circuit breaker tuning: the rolling window size, the failure rate that
/// opens the breaker, and how long intake stays paused.
#[derive(Deserialize, Debug, Clone)]
pub struct BreakerConfig {
    #[serde(default = "default_breaker_window")]
    pub window: usize,
    #[serde(default = "default_breaker_threshold")]
    pub failure_threshold: f64,
    #[serde(default = "default_breaker_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            window: default_breaker_window(),
            failure_threshold: default_breaker_threshold(),
            cooldown_secs: default_breaker_cooldown_secs(),
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl IngestConfig {
    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity.unwrap_or(self.workers * 10).max(1)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn extract_timeout(&self) -> Duration {
        Duration::from_millis(self.extract_timeout_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_extensions() -> Vec<String> {
    ["txt", "md", "csv", "json", "xml", "html"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_store_timeout_ms() -> u64 {
    5_000
}

fn default_extract_timeout_ms() -> u64 {
    30_000
}

fn default_drain_timeout_secs() -> u64 {
    30
}

fn default_heartbeat_secs() -> u64 {
    10
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_cache_ttl_secs() -> u64 {
    3_600
}

fn default_breaker_window() -> usize {
    50
}

fn default_breaker_threshold() -> f64 {
    0.5
}

fn default_breaker_cooldown_secs() -> u64 {
    15
}

/// Loads and parses the ingest run configuration YAML file.
pub fn load_ingest_config<P: AsRef<Path>>(config_path: P) -> Result<IngestConfig> {
    let path_ref = config_path.as_ref();
    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        PipelineError::ConfigError(format!(
            "Failed to read ingest config file '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    let config: IngestConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        PipelineError::ConfigError(format!(
            "Failed to parse ingest config YAML from '{}': {}",
            path_ref.display(),
            e
        ))
    })?;

    if config.workers == 0 {
        return Err(PipelineError::ConfigError(
            "workers must be at least 1".to_string(),
        ));
    }
    Ok(config)
}
