use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

pub const STORE_ENV: &str = "BATCHWIPE_STORE";
pub const CHUNK_SIZE_ENV: &str = "BATCHWIPE_CHUNK_SIZE";
pub const LOG_ENV: &str = "BATCHWIPE_LOG";

pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024; // 1MB
pub const DEFAULT_LOG_FILTER: &str = "info";
const STORE_FILE_NAME: &str = "wipe_records.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipeConfig {
    /// Location of the persisted record document.
    pub store_path: PathBuf,
    /// Write buffer size used by each overwrite pass.
    pub chunk_size: usize,
    pub log_filter: String,
}

impl Default for WipeConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl WipeConfig {
    /// Defaults overlaid with any `BATCHWIPE_*` environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Ok(path) = env::var(STORE_ENV) {
            if !path.trim().is_empty() {
                config.store_path = PathBuf::from(path);
            }
        }
        if let Ok(raw) = env::var(CHUNK_SIZE_ENV) {
            config.chunk_size = parse_chunk_size(&raw)?;
        }
        if let Ok(filter) = env::var(LOG_ENV) {
            if !filter.trim().is_empty() {
                config.log_filter = filter;
            }
        }
        Ok(config)
    }

    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Replaces the tracing filter; a blank filter keeps the current one.
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        let filter = filter.into();
        if !filter.trim().is_empty() {
            self.log_filter = filter;
        }
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self, ConfigError> {
        if chunk_size == 0 {
            return Err(ConfigError::Invalid {
                key: CHUNK_SIZE_ENV,
                reason: "chunk size must be greater than zero".to_string(),
            });
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }
}

fn parse_chunk_size(raw: &str) -> Result<usize, ConfigError> {
    let value = raw.trim().parse::<usize>().map_err(|e| ConfigError::Invalid {
        key: CHUNK_SIZE_ENV,
        reason: e.to_string(),
    })?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            key: CHUNK_SIZE_ENV,
            reason: "chunk size must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("BatchWipe").join(STORE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(STORE_FILE_NAME))
}
