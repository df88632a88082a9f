//! Engine configuration.
//!
//! The engine needs very little configuration: the compiled-pattern cache and
//! the encoding assumed when a caller does not supply one.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Compiled regex cache settings
    #[serde(default)]
    pub pattern_cache: PatternCacheConfig,

    /// Encoding used by `Engine::evaluate_default`
    #[serde(default)]
    pub default_encoding: Encoding,
}

/// Configuration for the compiled pattern cache.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternCacheConfig {
    /// Enable pattern caching
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Maximum number of compiled patterns kept (LRU eviction when exceeded)
    #[serde(default = "default_cache_max_size")]
    pub max_size: usize,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_max_size() -> usize {
    1024
}

impl Default for PatternCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            max_size: default_cache_max_size(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a YAML (or JSON) file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML text. JSON is accepted as well.
    pub fn from_yaml(contents: &str) -> Result<Self, anyhow::Error> {
        let config: EngineConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.pattern_cache.enabled && self.pattern_cache.max_size == 0 {
            anyhow::bail!("patternCache.maxSize must be greater than 0 when the cache is enabled");
        }
        Ok(())
    }
}
