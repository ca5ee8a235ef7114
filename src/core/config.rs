//! Configuration management for whouses.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Largest number of files the lock registry accepts in one legacy batch.
pub const MAX_BATCH_SIZE: usize = 50;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Termination settings
    #[serde(default)]
    pub termination: TerminationConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigLoad(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigSave(format!("Failed to create config directory: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigSave(format!("Failed to write config file: {}", e)))
    }

    /// Load configuration from default location, or create default if not exists.
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        if config_path.exists() {
            match Self::load(&config_path).and_then(|c| c.validate().map(|_| c)) {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to load config, using defaults: {}", e);
                    return Self::default();
                }
            }
        }

        let config = Self::default();

        if let Err(e) = config.save(&config_path) {
            log::warn!("Failed to save default config: {}", e);
        }

        config
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        Self::data_dir().join("config.json")
    }

    /// Get the application data directory.
    pub fn data_dir() -> PathBuf {
        #[cfg(windows)]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData"))
                .join("whouses")
        }

        #[cfg(not(windows))]
        {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("whouses")
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.discovery.batch_size == 0 || self.discovery.batch_size > MAX_BATCH_SIZE {
            return Err(Error::ConfigInvalid {
                field: "discovery.batch_size".to_string(),
                message: format!("Must be between 1 and {}", MAX_BATCH_SIZE),
            });
        }

        if self.discovery.max_files == 0 {
            return Err(Error::ConfigInvalid {
                field: "discovery.max_files".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.termination.grace_delay_ms > 60_000 {
            return Err(Error::ConfigInvalid {
                field: "termination.grace_delay_ms".to_string(),
                message: "Must be at most 60000".to_string(),
            });
        }

        Ok(())
    }
}

/// How the file-lock scanner drives the lock registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockQueryMode {
    /// One session per file; every lock is attributed to its exact file
    #[default]
    PerFile,
    /// One session per batch of files; faster, but a hit inside a
    /// multi-file batch can only be attributed to the batch
    Batched,
}

impl std::fmt::Display for LockQueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockQueryMode::PerFile => write!(f, "per-file"),
            LockQueryMode::Batched => write!(f, "batched"),
        }
    }
}

/// Discovery configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Lock registry query strategy
    pub lock_query_mode: LockQueryMode,
    /// Files per session in batched mode
    pub batch_size: usize,
    /// Maximum files enumerated under a folder target
    pub max_files: usize,
    /// Extensions that mark a file target as an executable
    pub executable_extensions: Vec<String>,
    /// Whether to follow symbolic links during folder enumeration
    pub follow_symlinks: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            lock_query_mode: LockQueryMode::PerFile,
            batch_size: MAX_BATCH_SIZE,
            max_files: 1000,
            executable_extensions: ["exe", "com", "scr", "bat", "cmd"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            follow_symlinks: false,
        }
    }
}

/// Termination configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    /// Wait between the kill requests and the liveness check (milliseconds)
    pub grace_delay_ms: u64,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        Self { grace_delay_ms: 500 }
    }
}

impl TerminationConfig {
    /// Grace delay as a duration.
    pub fn grace_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.grace_delay_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Show module paths in log lines
    pub module_path: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            module_path: false,
        }
    }
}
