//! Configuration loading and management.
//!
//! Configuration can be loaded from TOML, YAML, or JSON files, discovered from the
//! directory hierarchy, or built programmatically.

use crate::{Result, RuleError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level Ruleforge configuration.
///
/// # Example
///
/// ```rust
/// use ruleforge::core::config::RuleforgeConfig;
///
/// let config = RuleforgeConfig::default();
/// assert_eq!(config.preload.stop_timeout_ms, 5000);
///
/// // let config = RuleforgeConfig::from_toml_file("ruleforge.toml")?;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleforgeConfig {
    /// Preload worker settings
    #[serde(default)]
    pub preload: PreloaderConfig,
}

/// Settings for the shared preload worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloaderConfig {
    /// How long a stop waits for the worker to exit cleanly before it is abandoned
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,

    /// Name given to the dedicated worker thread
    #[serde(default = "default_worker_thread_name")]
    pub worker_thread_name: String,

    /// Stack size for the worker thread (None = platform default)
    #[serde(default)]
    pub worker_stack_size: Option<usize>,
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

fn default_worker_thread_name() -> String {
    "ruleforge-preload-worker".to_string()
}

impl Default for PreloaderConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: default_stop_timeout_ms(),
            worker_thread_name: default_worker_thread_name(),
            worker_stack_size: None,
        }
    }
}

impl PreloaderConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.stop_timeout_ms == 0 {
            return Err(RuleError::validation("preload.stop_timeout_ms must be greater than 0"));
        }
        if self.worker_thread_name.trim().is_empty() {
            return Err(RuleError::validation("preload.worker_thread_name cannot be empty"));
        }
        if self.worker_stack_size == Some(0) {
            return Err(RuleError::validation("preload.worker_stack_size must be greater than 0"));
        }
        Ok(())
    }
}

impl RuleforgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `RuleError::Validation` if the file can't be read, is invalid TOML,
    /// or holds invalid values.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| RuleError::validation(format!("Invalid TOML in {}: {}", path.as_ref().display(), e)))?;
        config.preload.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        let config: Self = serde_yaml_ng::from_str(&content)
            .map_err(|e| RuleError::validation(format!("Invalid YAML in {}: {}", path.as_ref().display(), e)))?;
        config.preload.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = read_config(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| RuleError::validation(format!("Invalid JSON in {}: {}", path.as_ref().display(), e)))?;
        config.preload.validate()?;
        Ok(config)
    }

    /// Discover `ruleforge.toml` in the current directory or any parent.
    ///
    /// # Returns
    ///
    /// - `Some(config)` if found
    /// - `None` if no config file found
    pub fn discover() -> Result<Option<Self>> {
        let mut current = std::env::current_dir().map_err(RuleError::Io)?;

        loop {
            let candidate = current.join("ruleforge.toml");
            if candidate.exists() {
                return Ok(Some(Self::from_toml_file(candidate)?));
            }

            if let Some(parent) = current.parent() {
                current = parent.to_path_buf();
            } else {
                break;
            }
        }

        Ok(None)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| RuleError::validation(format!("Failed to read config file {}: {}", path.display(), e)))
}
