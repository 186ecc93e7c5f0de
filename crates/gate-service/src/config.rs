//! Service configuration.

use std::path::Path;
use std::time::Duration;

use gate_bus::{ORDERS_INCOMING, ORDERS_VALIDATED, RISK_MULTIPLIER_KEY};
use gate_core::RiskLimits;
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// Default config path when neither `--config` nor `GATE_CONFIG` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Bus channel and store key names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel carrying order requests in.
    #[serde(default = "default_incoming")]
    pub incoming: String,
    /// Channel approved orders are published to.
    #[serde(default = "default_validated")]
    pub validated: String,
    /// Store key holding the risk multiplier.
    #[serde(default = "default_multiplier_key")]
    pub multiplier_key: String,
}

fn default_incoming() -> String {
    ORDERS_INCOMING.to_string()
}

fn default_validated() -> String {
    ORDERS_VALIDATED.to_string()
}

fn default_multiplier_key() -> String {
    RISK_MULTIPLIER_KEY.to_string()
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            incoming: default_incoming(),
            validated: default_validated(),
            multiplier_key: default_multiplier_key(),
        }
    }
}

/// Which bus and store backend to run against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// In-process bus and store. Nothing outside the process can reach them.
    #[default]
    Memory,
    /// Shared Redis instance for pub/sub and the multiplier key.
    Redis,
}

/// Bus and store backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,
    /// Used when `kind = "redis"`.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            redis_url: default_redis_url(),
        }
    }
}

/// Risk gating service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// How often the refresher polls the store (seconds). Default: 1.0.
    #[serde(default = "default_refresh_interval_secs", alias = "refreshIntervalSeconds")]
    pub refresh_interval_secs: f64,
    /// Daily realized loss that closes the gate. Default: 5000.
    #[serde(default = "default_max_daily_loss", alias = "maxDailyLoss")]
    pub max_daily_loss: f64,
    /// Per-trade loss limit. Default: 1000.
    #[serde(default = "default_max_per_trade_loss", alias = "maxPerTradeLoss")]
    pub max_per_trade_loss: f64,
    /// Upper bound on a single store read (ms). Default: 500.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// How long `stop()` waits for each task (ms). Default: 2000.
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,
    #[serde(default)]
    pub channels: ChannelConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_refresh_interval_secs() -> f64 {
    1.0
}

fn default_max_daily_loss() -> f64 {
    5000.0
}

fn default_max_per_trade_loss() -> f64 {
    1000.0
}

fn default_store_timeout_ms() -> u64 {
    500
}

fn default_shutdown_timeout_ms() -> u64 {
    2000
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            max_daily_loss: default_max_daily_loss(),
            max_per_trade_loss: default_max_per_trade_loss(),
            store_timeout_ms: default_store_timeout_ms(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            channels: ChannelConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Load from `path`, falling back to defaults if the file does not exist.
    pub fn load(path: &str) -> ServiceResult<Self> {
        if Path::new(path).exists() {
            Self::from_file(path)
        } else {
            tracing::warn!(path = %path, "Config file not found, using defaults");
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> ServiceResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML content.
    pub fn from_toml_str(content: &str) -> ServiceResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ServiceError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> ServiceResult<()> {
        if self.refresh_interval_secs <= 0.0
            || Duration::try_from_secs_f64(self.refresh_interval_secs).is_err()
        {
            return Err(ServiceError::Config(format!(
                "refresh_interval_secs must be positive, got {}",
                self.refresh_interval_secs
            )));
        }
        if self.store_timeout_ms == 0 {
            return Err(ServiceError::Config("store_timeout_ms must be positive".to_string()));
        }
        if self.shutdown_timeout_ms == 0 {
            return Err(ServiceError::Config(
                "shutdown_timeout_ms must be positive".to_string(),
            ));
        }
        if self.channels.incoming == self.channels.validated {
            return Err(ServiceError::Config(format!(
                "incoming and validated channels must differ, both are {:?}",
                self.channels.incoming
            )));
        }
        let redis = self.transport.kind == TransportKind::Redis;
        if redis && self.transport.redis_url.trim().is_empty() {
            return Err(ServiceError::Config(
                "transport.redis_url is required for the redis transport".to_string(),
            ));
        }
        self.limits()?;
        Ok(())
    }

    /// Validated risk limits.
    pub fn limits(&self) -> ServiceResult<RiskLimits> {
        Ok(RiskLimits::new(self.max_daily_loss, self.max_per_trade_loss)?)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(self.refresh_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}
