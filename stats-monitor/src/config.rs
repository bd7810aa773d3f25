use std::path::{Path, PathBuf};
use std::time::Duration;

use container_stats::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::error::{MonitorError, MonitorResult};

pub(crate) const DEFAULT_CONTAINER: &str = "ruost";
pub(crate) const DEFAULT_LOG_DIR: &str = "/logs";
pub(crate) const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 10;
pub(crate) const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
pub(crate) const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub(crate) const DEFAULT_RETRY_WAIT_SECS: u64 = 2;

/// Everything the monitor needs to run. Every field has a default, so an
/// empty (or absent) config file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub container: String,
    pub socket_path: PathBuf,
    pub api_version: String,
    pub log_dir: PathBuf,
    pub sample_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_wait_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            container: DEFAULT_CONTAINER.to_string(),
            socket_path: PathBuf::from(container_stats::DEFAULT_SOCKET_PATH),
            api_version: container_stats::DEFAULT_API_VERSION.to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            sample_interval_secs: DEFAULT_SAMPLE_INTERVAL_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_wait_secs: DEFAULT_RETRY_WAIT_SECS,
        }
    }
}

impl MonitorConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_secs(self.sample_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_secs(self.retry_wait_secs),
        )
    }

    pub fn validate(&self) -> MonitorResult<()> {
        if self.container.trim().is_empty() {
            return Err(MonitorError::Config("container must not be empty".into()));
        }
        if self.api_version.trim_matches('/').is_empty() {
            return Err(MonitorError::Config("api_version must not be empty".into()));
        }
        if self.sample_interval_secs == 0 {
            return Err(MonitorError::Config(
                "sample_interval_secs must be at least 1".into(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(MonitorError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        if self.retry_attempts == 0 {
            return Err(MonitorError::Config(
                "retry_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn resolve_relative_paths(&mut self, config_dir: &Path) {
        if self.log_dir.is_relative() {
            self.log_dir = config_dir.join(&self.log_dir);
        }
        if self.socket_path.is_relative() {
            self.socket_path = config_dir.join(&self.socket_path);
        }
    }
}

/// Load a monitor config from a YAML file. Missing keys take their defaults.
///
/// Relative paths in the config are resolved against the config file's parent directory.
pub async fn load(path: &Path) -> MonitorResult<MonitorConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| MonitorError::Config(format!("read {}: {e}", path.display())))?;
    let mut config: MonitorConfig = if content.trim().is_empty() {
        MonitorConfig::default()
    } else {
        serde_yaml_ng::from_str(&content)
            .map_err(|e| MonitorError::Config(format!("parse {}: {e}", path.display())))?
    };
    if let Some(config_dir) = path.parent() {
        config.resolve_relative_paths(config_dir);
    }
    Ok(config)
}
