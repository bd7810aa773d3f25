use std::path::PathBuf;

use clap::Parser;

use crate::config::{self, MonitorConfig};
use crate::error::MonitorResult;

#[derive(Debug, Parser)]
#[command(
    name = "stats-monitor",
    version,
    about = "Sample one container's CPU, memory and network stats into a JSONL log"
)]
pub struct Cli {
    /// Path to a monitor.yaml config file (defaults apply when omitted)
    #[arg(long, short, env = "STATS_MONITOR_CONFIG")]
    pub config: Option<PathBuf>,
    /// Container name or ID to sample (overrides config)
    #[arg(long, env = "STATS_MONITOR_CONTAINER")]
    pub container: Option<String>,
    /// Runtime API Unix socket (overrides config)
    #[arg(long, env = "STATS_MONITOR_SOCKET")]
    pub socket: Option<PathBuf>,
    /// Directory that receives stats.jsonl (overrides config)
    #[arg(long, env = "STATS_MONITOR_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
    /// Seconds between samples (overrides config)
    #[arg(long, env = "STATS_MONITOR_INTERVAL")]
    pub interval: Option<u64>,
}

impl Cli {
    /// Load the config file if one was given, apply CLI / env overrides, and
    /// validate the result.
    pub async fn resolve(self) -> MonitorResult<MonitorConfig> {
        let mut config = match &self.config {
            Some(path) => config::load(path).await?,
            None => MonitorConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(self, config: &mut MonitorConfig) {
        if let Some(container) = self.container {
            config.container = container;
        }
        if let Some(socket) = self.socket {
            config.socket_path = socket;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = log_dir;
        }
        if let Some(interval) = self.interval {
            config.sample_interval_secs = interval;
        }
    }
}
