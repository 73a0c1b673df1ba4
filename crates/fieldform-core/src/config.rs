//! Engine configuration
//!
//! Settings are merged from, in increasing precedence:
//! - Default values
//! - A configuration file (YAML/JSON)
//! - Environment variables (`FIELDFORM_MODE`, `FIELDFORM_WORKERS`,
//!   `FIELDFORM_POOL_MAX_IDLE`)

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ENV_MODE: &str = "FIELDFORM_MODE";
pub const ENV_WORKERS: &str = "FIELDFORM_WORKERS";
pub const ENV_POOL_MAX_IDLE: &str = "FIELDFORM_POOL_MAX_IDLE";

/// How leaf fields are dispatched, as written in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Sequential,
    Parallel,
}

impl std::str::FromStr for ExecutionMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(ExecutionMode::Sequential),
            "parallel" => Ok(ExecutionMode::Parallel),
            other => Err(Error::config(format!(
                "Unknown execution mode '{}' (expected 'sequential' or 'parallel')",
                other
            ))),
        }
    }
}

/// Resolved dispatch strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Depth-first, one field at a time on the calling thread
    #[default]
    Sequential,
    /// Leaf chains fanned out over scoped worker threads
    Parallel { workers: usize },
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Dispatch strategy
    pub mode: ExecutionMode,

    /// Worker threads in parallel mode
    pub workers: usize,

    /// Scratch context pool settings
    pub pool: PoolConfig,

    /// Register the built-in string directives
    pub builtins: bool,
}

/// Scratch context pool configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Idle contexts kept for reuse; extras are dropped on release
    pub max_idle: usize,

    /// Initial capacity of each namespace buffer
    pub namespace_capacity: usize,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Sequential,
            workers: 4,
            pool: PoolConfig::default(),
            builtins: true,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 16,
            namespace_capacity: 64,
        }
    }
}

impl TransformerConfig {
    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config_with_source(format!("Failed to read {}", path.display()), e)
        })?;

        let config: Self = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| Error::config_with_source("Invalid YAML configuration", e))?,
            _ => serde_json::from_str(&content)
                .map_err(|e| Error::config_with_source("Invalid JSON configuration", e))?,
        };

        debug!("Loaded configuration from {}: {:?}", path.display(), config);
        config.validate()?;
        Ok(config)
    }

    /// Defaults merged with environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `FIELDFORM_*` environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup(ENV_MODE) {
            self.mode = mode.parse()?;
            debug!("{} override: {:?}", ENV_MODE, self.mode);
        }
        if let Some(workers) = lookup(ENV_WORKERS) {
            self.workers = parse_count(ENV_WORKERS, &workers)?;
            debug!("{} override: {}", ENV_WORKERS, self.workers);
        }
        if let Some(max_idle) = lookup(ENV_POOL_MAX_IDLE) {
            self.pool.max_idle = parse_count(ENV_POOL_MAX_IDLE, &max_idle)?;
            debug!("{} override: {}", ENV_POOL_MAX_IDLE, self.pool.max_idle);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        Ok(())
    }

    pub fn dispatch_mode(&self) -> DispatchMode {
        match self.mode {
            ExecutionMode::Sequential => DispatchMode::Sequential,
            ExecutionMode::Parallel => DispatchMode::Parallel {
                workers: self.workers,
            },
        }
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|e| Error::config_with_source(format!("{} must be a non-negative integer, got '{}'", key, raw), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = TransformerConfig::default();
        assert_eq!(config.dispatch_mode(), DispatchMode::Sequential);
        assert!(config.builtins);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_file_with_partial_settings() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "mode: parallel\nworkers: 3\npool:\n  max_idle: 2").unwrap();

        let config = TransformerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.dispatch_mode(), DispatchMode::Parallel { workers: 3 });
        assert_eq!(config.pool.max_idle, 2);
        assert_eq!(config.pool.namespace_capacity, 64);
        assert!(config.builtins);
    }

    #[test]
    fn test_json_file_is_validated() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"workers": 0}}"#).unwrap();

        let err = TransformerConfig::from_file(file.path()).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_MODE, "Parallel"),
            (ENV_WORKERS, "8"),
            (ENV_POOL_MAX_IDLE, "1"),
        ]);

        let mut config = TransformerConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.dispatch_mode(), DispatchMode::Parallel { workers: 8 });
        assert_eq!(config.pool.max_idle, 1);
    }

    #[test]
    fn test_bad_override_is_rejected() {
        let mut config = TransformerConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_WORKERS).then(|| "many".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_WORKERS));

        let err = config
            .apply_overrides(|key| (key == ENV_MODE).then(|| "fast".to_string()))
            .unwrap_err();
        assert!(err.is_configuration_error());
    }
}
