use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config yaml: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub log_dir: String,
    pub log_file: String,
    pub use_json: bool,
    pub rotation: String,
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub idempotency: IdempotencyConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Create tables on startup if missing
    #[serde(default)]
    pub init_schema: bool,
}

fn default_max_connections() -> u32 {
    10
}

/// Where idempotency keys live
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IdempotencyBackend {
    Redis,
    /// Process-local; only safe for a single gateway instance
    Memory,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdempotencyConfig {
    pub backend: IdempotencyBackend,
    pub redis_url: String,
    pub ttl_secs: u64,
    pub timeout_ms: u64,
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            backend: IdempotencyBackend::Redis,
            redis_url: "redis://localhost:6379".to_string(),
            ttl_secs: 24 * 60 * 60,
            timeout_ms: 500,
        }
    }
}

/// Minimum age of a reclaimable PROCESSING task, in provider timeouts
pub const STALE_RECLAIM_MARGIN: u32 = 2;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WorkerSettings {
    pub enabled: bool,
    pub poll_interval_ms: u64,
    pub provider_timeout_ms: u64,
    /// PROCESSING tasks older than this go back to PENDING. Unset keeps them stranded.
    #[serde(default)]
    pub stale_reclaim_secs: Option<u64>,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_ms: 5000,
            provider_timeout_ms: 10_000,
            stale_reclaim_secs: None,
        }
    }
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn stale_threshold(&self) -> Option<Duration> {
        self.stale_reclaim_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Mock,
    Http,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Payout endpoint for the HTTP provider
    #[serde(default)]
    pub url: Option<String>,
    /// Mock only: probability of a simulated gateway timeout
    pub failure_rate: f64,
    /// Mock only: simulated network latency
    pub latency_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Mock,
            url: None,
            failure_rate: 0.1,
            latency_ms: 100,
        }
    }
}

impl AppConfig {
    /// Load `config/<env>.yaml` and apply environment overrides.
    pub fn load(env: &str) -> Result<Self, ConfigError> {
        let config_path = format!("config/{}.yaml", env);
        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// `DATABASE_URL`, `REDIS_URL` (or bare `REDIS_ADDR` host:port) and `PORT` win over the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.idempotency.redis_url = url;
        } else if let Some(addr) = lookup("REDIS_ADDR") {
            self.idempotency.redis_url = format!("redis://{}", addr);
        }
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.gateway.port = port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "worker.poll_interval_ms must be > 0".to_string(),
            ));
        }
        if self.worker.provider_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "worker.provider_timeout_ms must be > 0".to_string(),
            ));
        }
        if let Some(stale_secs) = self.worker.stale_reclaim_secs {
            let min_ms = self
                .worker
                .provider_timeout_ms
                .saturating_mul(u64::from(STALE_RECLAIM_MARGIN));
            if stale_secs.saturating_mul(1000) < min_ms {
                return Err(ConfigError::Invalid(format!(
                    "worker.stale_reclaim_secs ({}s) must be at least {}x provider_timeout_ms ({}ms)",
                    stale_secs, STALE_RECLAIM_MARGIN, self.worker.provider_timeout_ms
                )));
            }
        }
        if self.idempotency.ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "idempotency.ttl_secs must be > 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.provider.failure_rate) {
            return Err(ConfigError::Invalid(format!(
                "provider.failure_rate must be within [0, 1], got {}",
                self.provider.failure_rate
            )));
        }
        if self.provider.kind == ProviderKind::Http && self.provider.url.is_none() {
            return Err(ConfigError::Invalid(
                "provider.url is required for the http provider".to_string(),
            ));
        }
        Ok(())
    }
}
