//! Configuration parsing
//!
//! Reads settings from `~/.cadenza/config.toml`. Every key is optional; a
//! missing file means defaults.

use crate::host::HostScanConfig;
use cadenza_protocol::defaults::{DEFAULT_FAILURE_DISPLAY_LIMIT, SUPPORTED_AUDIO_EXTENSIONS};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub use cadenza_protocol::paths::{cadenza_home, default_config_path, default_logs_dir};

/// Error type for config operations
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CadenzaConfig {
    #[serde(default)]
    pub scan: ScanSettings,

    #[serde(default)]
    pub display: DisplaySettings,
}

/// `[scan]` table
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ScanSettings {
    /// File extensions to index, with or without the leading dot
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    #[serde(default)]
    pub follow_symlinks: bool,

    /// Walk into dot-directories and pick up dot-files
    #[serde(default)]
    pub include_hidden: bool,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            follow_symlinks: false,
            include_hidden: false,
        }
    }
}

/// `[display]` table
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DisplaySettings {
    /// Item failures printed before collapsing the rest into "+N more"
    #[serde(default = "default_max_failures_shown")]
    pub max_failures_shown: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_failures_shown: default_max_failures_shown(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    SUPPORTED_AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_max_failures_shown() -> usize {
    DEFAULT_FAILURE_DISPLAY_LIMIT
}

impl CadenzaConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Toml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `~/.cadenza/config.toml`.
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load(&default_config_path())
    }

    pub fn host_scan_config(&self) -> HostScanConfig {
        HostScanConfig {
            extensions: self.scan.extensions.clone(),
            follow_symlinks: self.scan.follow_symlinks,
            include_hidden: self.scan.include_hidden,
        }
    }
}
