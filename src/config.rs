//! Runtime configuration loaded from a JSON file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Daemon configuration. Unknown keys are ignored and missing keys take
/// the defaults below, so a minimal file only needs the paths it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Informational list of service names shown on the dashboard.
    pub services_to_watch: Vec<String>,

    /// Log files consumed by the tailer. SSH and FTP may point at the same
    /// file; it is then read once per cycle and fed to both parsers.
    pub ssh_log_path: String,
    pub ftp_log_path: String,
    pub apache_access_log_path: String,
    pub apache_error_log_path: String,

    /// Global fallback threshold when no per-service value is set.
    pub max_failures: u32,

    /// Per-service overrides; 0 means unset.
    pub ssh_max_failures: u32,
    pub ftp_max_failures: u32,
    pub apache_error_threshold: u32,

    /// Scan period in seconds.
    pub check_interval_seconds: u64,

    /// Persistence target for the blocked address set.
    pub blocked_ips_file: String,

    /// Exemption list, reloaded every cycle.
    pub whitelist_file: String,

    /// Base hold time for automatic release; 0 disables auto-unblock.
    pub auto_unblock_minutes: u64,

    /// Whether the Apache strategy may block at threshold.
    pub apache_block_on_threshold: bool,

    /// Bind address for the inspection API.
    pub listen_addr: String,

    /// Clear a login strategy's running total for an address after blocking
    /// it, so only fresh failures can re-trigger the block.
    pub reset_totals_on_block: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            services_to_watch: Vec::new(),
            ssh_log_path: "/var/log/auth.log".to_string(),
            ftp_log_path: "/var/log/auth.log".to_string(),
            apache_access_log_path: "/var/log/apache2/access.log".to_string(),
            apache_error_log_path: "/var/log/apache2/error.log".to_string(),
            max_failures: 5,
            ssh_max_failures: 0,
            ftp_max_failures: 0,
            apache_error_threshold: 0,
            check_interval_seconds: 10,
            blocked_ips_file: "blocked_ips.txt".to_string(),
            whitelist_file: "whitelist.txt".to_string(),
            auto_unblock_minutes: 0,
            apache_block_on_threshold: false,
            listen_addr: "0.0.0.0:9000".to_string(),
            reset_totals_on_block: false,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }
}
