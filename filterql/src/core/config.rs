use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_MAX_DEPTH, DEFAULT_MAX_FILTERS, DEFAULT_MAX_QUERY_LENGTH,
};

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Limits applied while parsing and resolving filter input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterConfig {
    /// Maximum number of operator entries across all filter keys
    pub max_filters: usize,
    /// Maximum number of bracket segments in one parameter name
    pub max_depth: usize,
    /// Maximum raw query string length in bytes
    pub max_query_length: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_filters: DEFAULT_MAX_FILTERS,
            max_depth: DEFAULT_MAX_DEPTH,
            max_query_length: DEFAULT_MAX_QUERY_LENGTH,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppConfig {
    pub filter: FilterConfig,
}

// =============================================================================
// File Configuration
// =============================================================================

/// Filter section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilterFileConfig {
    pub max_filters: Option<usize>,
    pub max_depth: Option<usize>,
    pub max_query_length: Option<usize>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub filter: Option<FilterFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        let file_config = match path {
            Some(path) => {
                let config = FileConfig::load_from_file(&path)?;
                config.warn_unknown_fields();
                config
            }
            None => FileConfig::default(),
        };

        Self::from_sources(cli, file_config)
    }

    /// Layer defaults, file config and CLI/env overrides, then validate
    pub fn from_sources(cli: &CliConfig, file_config: FileConfig) -> Result<Self> {
        let file_filter = file_config.filter.unwrap_or_default();
        let defaults = FilterConfig::default();

        let config = Self {
            filter: FilterConfig {
                max_filters: cli
                    .max_filters
                    .or(file_filter.max_filters)
                    .unwrap_or(defaults.max_filters),
                max_depth: cli
                    .max_depth
                    .or(file_filter.max_depth)
                    .unwrap_or(defaults.max_depth),
                max_query_length: cli
                    .max_query_length
                    .or(file_filter.max_query_length)
                    .unwrap_or(defaults.max_query_length),
            },
        };

        config.validate()?;
        tracing::debug!(config = ?config, "Configuration loaded");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.filter.max_filters == 0 {
            anyhow::bail!("Configuration error: filter.max_filters must be greater than 0");
        }
        // `filter[key]` alone is two segments
        if self.filter.max_depth < 2 {
            anyhow::bail!("Configuration error: filter.max_depth must be at least 2");
        }
        if self.filter.max_query_length == 0 {
            anyhow::bail!("Configuration error: filter.max_query_length must be greater than 0");
        }
        Ok(())
    }
}
