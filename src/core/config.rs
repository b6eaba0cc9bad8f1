//! Runtime settings for the matcher and the mapper.

use crate::core::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the mapper splits work.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// One traversal on the calling thread.
    Sequential,
    /// Contiguous chunks on scoped worker threads.
    #[default]
    Threaded,
    /// Contiguous chunks on the global rayon pool.
    Pool,
}

/// Settings shared by an [`OpEnvironment`](crate::matching::OpEnvironment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpsConfig {
    /// Worker count for threaded mapping (0 = use all available).
    pub workers: usize,
    /// Default mapper execution mode.
    pub execution: ExecutionMode,
    /// Below this many elements per chunk the mapper uses fewer chunks.
    pub min_chunk_len: usize,
    /// Log every rejected candidate at debug level.
    pub log_rejections: bool,
}

impl Default for OpsConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            execution: ExecutionMode::Threaded,
            min_chunk_len: 1,
            log_rejections: true,
        }
    }
}

impl OpsConfig {
    /// Create a new config builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: OpsConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
            path: path.display().to_string(),
            error,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_chunk_len == 0 {
            return Err(ConfigError::Invalid {
                field: "min_chunk_len".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the default execution mode.
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    /// Set the minimum chunk length.
    pub fn with_min_chunk_len(mut self, len: usize) -> Self {
        self.min_chunk_len = len.max(1);
        self
    }

    /// Enable/disable rejection logging.
    pub fn with_log_rejections(mut self, enabled: bool) -> Self {
        self.log_rejections = enabled;
        self
    }

    /// Worker count with 0 resolved to the available parallelism.
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        }
    }
}
