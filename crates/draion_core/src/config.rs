//! Configuration for Draion clients.
//!
//! Loaded from `~/.config/draion/config.toml` (or an explicit path). Every
//! field has a default, so a missing or partial file is fine.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{DraionError, Result};

/// Quiet period before typed text is persisted.
pub const DEFAULT_TEXT_DEBOUNCE_MS: u64 = 800;

/// Quiet period before a checkbox toggle is persisted.
pub const DEFAULT_CHECKBOX_DEBOUNCE_MS: u64 = 300;

/// Longest accepted debounce interval (ten minutes).
pub const MAX_DEBOUNCE_MS: u64 = 600_000;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory used by the file-backed store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// Debounce timings for the sync session.
    pub sync: SyncConfig,

    /// Page name rules for the page access flow.
    pub pages: PageRules,

    /// Timestamp display settings.
    pub display: DisplayConfig,
}

/// Debounce timings for a sync session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Milliseconds of typing inactivity before persisting.
    pub text_debounce_ms: u64,
    /// Milliseconds after the last checkbox toggle before persisting.
    pub checkbox_debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            text_debounce_ms: DEFAULT_TEXT_DEBOUNCE_MS,
            checkbox_debounce_ms: DEFAULT_CHECKBOX_DEBOUNCE_MS,
        }
    }
}

impl SyncConfig {
    /// Text debounce as a `Duration`.
    pub fn text_debounce(&self) -> Duration {
        Duration::from_millis(self.text_debounce_ms)
    }

    /// Checkbox debounce as a `Duration`.
    pub fn checkbox_debounce(&self) -> Duration {
        Duration::from_millis(self.checkbox_debounce_ms)
    }
}

/// Length rules applied to user-typed page names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageRules {
    /// Minimum number of characters after trimming.
    pub min_name_len: usize,
    /// Maximum number of characters after trimming.
    pub max_name_len: usize,
}

impl Default for PageRules {
    fn default() -> Self {
        Self {
            min_name_len: 2,
            max_name_len: 50,
        }
    }
}

/// How timestamps are shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Offset from UTC in minutes (default: -180, São Paulo).
    pub utc_offset_minutes: i32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: -180,
        }
    }
}

impl Config {
    /// Get the config file path (~/.config/draion/config.toml)
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("draion").join("config.toml"))
    }

    /// Default store directory (~/.local/share/draion)
    pub fn default_store_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("draion")
    }

    /// Load config from the default path, or return defaults if there is none.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to an explicit file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Store directory from config, falling back to the platform default.
    pub fn store_dir(&self) -> PathBuf {
        self.store_dir
            .clone()
            .unwrap_or_else(Self::default_store_dir)
    }

    fn validate(&self) -> Result<()> {
        if self.pages.min_name_len > self.pages.max_name_len {
            return Err(DraionError::Config(format!(
                "pages.min_name_len ({}) exceeds pages.max_name_len ({})",
                self.pages.min_name_len, self.pages.max_name_len
            )));
        }
        for (key, value) in [
            ("sync.text_debounce_ms", self.sync.text_debounce_ms),
            ("sync.checkbox_debounce_ms", self.sync.checkbox_debounce_ms),
        ] {
            if value == 0 || value > MAX_DEBOUNCE_MS {
                return Err(DraionError::Config(format!(
                    "{} must be between 1 and {} (got {})",
                    key, MAX_DEBOUNCE_MS, value
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.sync.text_debounce(), Duration::from_millis(800));
        assert_eq!(config.sync.checkbox_debounce(), Duration::from_millis(300));
        assert_eq!(config.pages.min_name_len, 2);
        assert_eq!(config.pages.max_name_len, 50);
        assert_eq!(config.display.utc_offset_minutes, -180);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[sync]\ntext_debounce_ms = 1200\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.sync.text_debounce_ms, 1200);
        assert_eq!(config.sync.checkbox_debounce_ms, 300);
        assert_eq!(config.pages, PageRules::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.store_dir = Some(PathBuf::from("/tmp/pages"));
        config.display.utc_offset_minutes = 60;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_rejects_inverted_name_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[pages]\nmin_name_len = 10\nmax_name_len = 3\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(DraionError::Config(_))
        ));
    }

    #[test]
    fn test_rejects_out_of_range_debounce() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        for body in [
            "[sync]\ntext_debounce_ms = 9223372036854775807\n",
            "[sync]\ncheckbox_debounce_ms = 0\n",
        ] {
            fs::write(&path, body).unwrap();
            assert!(matches!(
                Config::load_from(&path),
                Err(DraionError::Config(_))
            ));
        }
    }
}
