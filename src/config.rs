//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty document is a
//! valid configuration.
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 1024
//!
//! [evaluation]
//! log_decisions = true
//! ```

use crate::error::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub cache: CacheConfig,
    pub evaluation: EvaluationConfig,
}

/// Custom-policy lookup cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Off by default: every evaluation reads the policy store
    pub enabled: bool,
    /// Maximum number of (profile, subject set) entries
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            enabled: false,
            capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationConfig {
    /// Emit a `debug!` event for every decision
    pub log_decisions: bool,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        EvaluationConfig {
            log_decisions: true,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(source).map_err(|e| PolicyError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| PolicyError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(PolicyError::Config(
                "cache.capacity must be greater than 0 when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
