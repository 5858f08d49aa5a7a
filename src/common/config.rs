//! Configuration file handling

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Harness settings
    #[serde(default)]
    pub harness: HarnessConfig,

    /// Timeout settings
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Harness settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Pause the session before the first evaluation runs
    #[serde(default)]
    pub suspend_on_entry: bool,

    /// Name given to the execution worker thread
    #[serde(default = "default_worker_thread_name")]
    pub worker_thread_name: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            suspend_on_entry: false,
            worker_thread_name: default_worker_thread_name(),
        }
    }
}

fn default_worker_thread_name() -> String {
    "inspector-executor".to_string()
}

/// Timeout settings in seconds
///
/// Zero means wait indefinitely.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Timeouts {
    /// Bound on waiting for protocol messages
    #[serde(default = "default_receive")]
    pub receive_secs: u64,

    /// Bound on waiting for an evaluation result
    #[serde(default = "default_eval")]
    pub eval_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            receive_secs: default_receive(),
            eval_secs: default_eval(),
        }
    }
}

fn default_receive() -> u64 {
    10
}
fn default_eval() -> u64 {
    30
}

impl Timeouts {
    /// Receive bound, `None` when unbounded
    pub fn receive(&self) -> Option<Duration> {
        non_zero_secs(self.receive_secs)
    }

    /// Evaluation bound, `None` when unbounded
    pub fn eval(&self) -> Option<Duration> {
        non_zero_secs(self.eval_secs)
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| super::Error::Config(e.to_string()))
    }
}
