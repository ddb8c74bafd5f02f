//! Configuration for the coordinator

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Bind address for the coordinator RPC endpoint
    pub bind_addr: SocketAddr,

    /// Path of the durable coordinator log; `None` keeps decisions in memory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Timeout for outbound RPCs (membership updates, tablet pushes)
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,

    /// Send attempts per membership recipient before it is declared down
    #[serde(default = "default_updater_max_retries")]
    pub updater_max_retries: usize,

    /// Initial retry delay for unreachable membership recipients
    #[serde(default = "default_updater_retry_delay_ms")]
    pub updater_retry_delay_ms: u64,

    /// Cap on the exponential retry delay
    #[serde(default = "default_updater_max_retry_delay_ms")]
    pub updater_max_retry_delay_ms: u64,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_rpc_timeout_ms() -> u64 {
    5_000
}
fn default_updater_max_retries() -> usize {
    4
}
fn default_updater_retry_delay_ms() -> u64 {
    100
}
fn default_updater_max_retry_delay_ms() -> u64 {
    2_000
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".parse().unwrap(),
            log_path: None,
            rpc_timeout_ms: default_rpc_timeout_ms(),
            updater_max_retries: default_updater_max_retries(),
            updater_retry_delay_ms: default_updater_retry_delay_ms(),
            updater_max_retry_delay_ms: default_updater_max_retry_delay_ms(),
            log_level: default_log_level(),
        }
    }
}

impl CoordinatorConfig {
    /// Load from a JSON file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CoordinatorConfig = serde_json::from_str(&content)
            .map_err(|e| crate::Error::InvalidConfig(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a JSON file
    pub fn to_file(&self, path: impl AsRef<std::path::Path>) -> crate::Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| crate::Error::InvalidConfig(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.rpc_timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig(
                "rpc_timeout_ms must be non-zero".into(),
            ));
        }
        if self.updater_max_retries == 0 {
            return Err(crate::Error::InvalidConfig(
                "updater_max_retries must be non-zero".into(),
            ));
        }
        if self.updater_retry_delay_ms > self.updater_max_retry_delay_ms {
            return Err(crate::Error::InvalidConfig(
                "updater_retry_delay_ms exceeds updater_max_retry_delay_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn updater_retry_delay(&self) -> Duration {
        Duration::from_millis(self.updater_retry_delay_ms)
    }

    pub fn updater_max_retry_delay(&self) -> Duration {
        Duration::from_millis(self.updater_max_retry_delay_ms)
    }
}
