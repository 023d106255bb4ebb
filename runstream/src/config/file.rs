//! Configuration file handling for ~/.runstream/config.ini.
//!
//! Settings structs live in [`super::settings`], constants in
//! [`super::defaults`] and parsing in [`super::parser`].

use ini::Ini;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::defaults::{ENV_SERVER_URI, ENV_TOKEN};
use super::settings::ConfigFile;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigFile {
    /// Load configuration from the default path (~/.runstream/config.ini),
    /// then apply environment overrides.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path, then apply environment
    /// overrides.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        let mut config = if path.exists() {
            let ini = Ini::load_from_file(path)?;
            super::parser::parse_ini(&ini)?
        } else {
            Self::default()
        };

        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay `RUNSTREAM_SERVER_URI` / `RUNSTREAM_TOKEN` onto the loaded file.
    pub(crate) fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(uri) = lookup(ENV_SERVER_URI).filter(|v| !v.trim().is_empty()) {
            self.server.uri = Some(uri.trim().to_string());
        }
        if let Some(token) = lookup(ENV_TOKEN).filter(|v| !v.trim().is_empty()) {
            self.server.token = Some(token.trim().to_string());
        }
    }
}

/// Get the path to the config directory (~/.runstream).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".runstream")
}

/// Get the path to the config file (~/.runstream/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;

    #[test]
    fn test_default_config() {
        let config = ConfigFile::default();

        assert!(config.server.uri.is_none());
        assert!(config.server.token.is_none());
        assert_eq!(config.transfer.block_size, DEFAULT_BLOCK_SIZE);
        assert_eq!(config.transfer.write_dop, DEFAULT_WRITE_DOP);
        assert_eq!(config.transfer.read_dop, DEFAULT_READ_DOP);
        assert_eq!(
            config.watch.max_consecutive_errors,
            DEFAULT_WATCH_MAX_CONSECUTIVE_ERRORS
        );
        assert!(config.logging.file.ends_with("runstream.log"));
    }

    #[test]
    fn test_load_nonexistent_returns_defaults() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.ini");

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config.transfer.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn test_env_overrides_replace_file_values() {
        let mut config = ConfigFile::default();
        config.server.uri = Some("https://from-file".to_string());

        config.apply_env_overrides(|key| match key {
            ENV_SERVER_URI => Some(" https://from-env ".to_string()),
            ENV_TOKEN => Some("tok".to_string()),
            _ => None,
        });

        assert_eq!(config.server.uri.as_deref(), Some("https://from-env"));
        assert_eq!(config.server.token.as_deref(), Some("tok"));
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = ConfigFile::default();
        config.server.uri = Some("https://from-file".to_string());

        config.apply_env_overrides(|_| Some("   ".to_string()));

        assert_eq!(config.server.uri.as_deref(), Some("https://from-file"));
        assert!(config.server.token.is_none());
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = ConfigFile::default();
        config.server.token = Some("very-secret".to_string());
        let printed = format!("{:?}", config);
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
