//! JSON configuration with defaults, forgiving of a missing or malformed
//! file — startup never fails because of the config file itself.

use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_thread_pool_size")]
    pub thread_pool_size: usize,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    #[serde(default = "default_blocked_domains_file")]
    pub blocked_domains_file: String,
    #[serde(default = "default_log_file")]
    pub log_file: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    8888
}
fn default_thread_pool_size() -> usize {
    10
}
fn default_backlog() -> u32 {
    100
}
fn default_blocked_domains_file() -> String {
    "config/blocked_domains.txt".to_string()
}
fn default_log_file() -> String {
    "logs/proxy.log".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: default_host(),
            port: default_port(),
            thread_pool_size: default_thread_pool_size(),
            backlog: default_backlog(),
            blocked_domains_file: default_blocked_domains_file(),
            log_file: default_log_file(),
        }
    }
}

impl Config {
    /// Loads configuration from `path`. A missing file gets the defaults
    /// written to it (parent directories created as needed) so there's
    /// something to edit on the next run. A malformed file logs a warning
    /// to stderr (the real logger isn't up yet at this point) and falls
    /// back to defaults rather than failing startup. Unknown keys are
    /// ignored by `serde`'s default field handling.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Config::default();
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(path, serde_json::to_string_pretty(&config)?)?;
            return Ok(config);
        }

        let text = fs::read_to_string(path)?;
        match serde_json::from_str(&text) {
            Ok(config) => Ok(config),
            Err(err) => {
                eprintln!(
                    "warning: invalid config at {}: {err}; falling back to defaults",
                    path.display()
                );
                Ok(Config::default())
            }
        }
    }
}
