//! Configuration file parser for ~/.config/feedlist/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning so typos are
//! visible.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::adapter::AdapterOptions;
use crate::storage::MAX_SNAPSHOT_ROWS;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database file. `None` means `<config dir>/entries.db`.
    pub database_path: Option<PathBuf>,

    /// Show feed name and icon next to each entry.
    pub show_feed_info: bool,

    /// Undo an optimistic edit when the store reports the write failed.
    pub rollback_failed_edits: bool,

    /// chrono format string for the entry date.
    pub date_format: String,

    /// chrono format string for the entry time.
    pub time_format: String,

    /// Capacity of the background result channel.
    pub event_channel_capacity: usize,

    /// Capacity of the change notification channel.
    pub change_channel_capacity: usize,

    /// Maximum rows per snapshot (capped at 2000).
    pub snapshot_limit: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            show_feed_info: true,
            rollback_failed_edits: true,
            date_format: "%Y-%m-%d".to_string(),
            time_format: "%H:%M".to_string(),
            event_channel_capacity: 32,
            change_channel_capacity: 64,
            snapshot_limit: 500,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 8] = [
        "database_path",
        "show_feed_info",
        "rollback_failed_edits",
        "date_format",
        "time_format",
        "event_channel_capacity",
        "change_channel_capacity",
        "snapshot_limit",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            show_feed_info = config.show_feed_info,
            rollback_failed_edits = config.rollback_failed_edits,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Adapter settings derived from this config.
    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            show_feed_info: self.show_feed_info,
            rollback_failed_edits: self.rollback_failed_edits,
            date_format: self.date_format.clone(),
            time_format: self.time_format.clone(),
            snapshot_limit: self.snapshot_limit.clamp(1, MAX_SNAPSHOT_ROWS),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
