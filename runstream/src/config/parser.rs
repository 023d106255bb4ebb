//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [server] section
    if let Some(section) = ini.section(Some("server")) {
        if let Some(v) = section.get("uri") {
            let v = v.trim();
            if !v.is_empty() {
                let parsed = reqwest::Url::parse(v).map_err(|e| ConfigFileError::InvalidValue {
                    section: "server".to_string(),
                    key: "uri".to_string(),
                    value: v.to_string(),
                    reason: format!("must be an absolute URI ({})", e),
                })?;
                config.server.uri = Some(parsed.as_str().to_string());
            }
        }
        if let Some(v) = section.get("token") {
            let v = v.trim();
            if !v.is_empty() {
                config.server.token = Some(v.to_string());
            }
        }
    }

    // [transfer] section
    if let Some(section) = ini.section(Some("transfer")) {
        if let Some(v) = section.get("block_size") {
            let size = parse_size(v).map_err(|_| ConfigFileError::InvalidValue {
                section: "transfer".to_string(),
                key: "block_size".to_string(),
                value: v.to_string(),
                reason: "expected format like '4MiB', '512KB', or a byte count".to_string(),
            })?;
            config.transfer.block_size = positive(size, "transfer", "block_size", v)?;
        }
        if let Some(v) = section.get("write_dop") {
            let dop = parse_number("transfer", "write_dop", v)?;
            config.transfer.write_dop = positive(dop, "transfer", "write_dop", v)?;
        }
        if let Some(v) = section.get("read_dop") {
            let dop = parse_number("transfer", "read_dop", v)?;
            config.transfer.read_dop = positive(dop, "transfer", "read_dop", v)?;
        }
        if let Some(v) = section.get("max_block_retries") {
            config.transfer.max_block_retries = parse_number("transfer", "max_block_retries", v)?;
        }
        if let Some(v) = section.get("block_poll_interval_ms") {
            config.transfer.block_poll_interval_ms =
                parse_number("transfer", "block_poll_interval_ms", v)?;
        }
    }

    // [watch] section
    if let Some(section) = ini.section(Some("watch")) {
        if let Some(v) = section.get("max_consecutive_errors") {
            config.watch.max_consecutive_errors =
                parse_number("watch", "max_consecutive_errors", v)?;
        }
    }

    // [logs] section
    if let Some(section) = ini.section(Some("logs")) {
        if let Some(v) = section.get("reconnect_delay_ms") {
            config.logs.reconnect_delay_ms = parse_number("logs", "reconnect_delay_ms", v)?;
        }
    }

    // [exec] section
    if let Some(section) = ini.section(Some("exec")) {
        if let Some(v) = section.get("shutdown_timeout_secs") {
            config.exec.shutdown_timeout_secs = parse_number("exec", "shutdown_timeout_secs", v)?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a non-negative integer".to_string(),
        })
}

fn positive(n: usize, section: &str, key: &str, value: &str) -> Result<usize, ConfigFileError> {
    if n == 0 {
        return Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(n)
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use tempfile::TempDir;

    fn load(contents: &str) -> Result<ConfigFile, ConfigFileError> {
        let ini = Ini::load_from_str(contents).unwrap();
        parse_ini(&ini)
    }

    #[test]
    fn test_full_config() {
        let config = load(
            r#"
[server]
uri = https://runs.example.com/
token = abc123

[transfer]
block_size = 1MiB
write_dop = 4
read_dop = 8
max_block_retries = 2
block_poll_interval_ms = 50

[watch]
max_consecutive_errors = 3

[logs]
reconnect_delay_ms = 10

[exec]
shutdown_timeout_secs = 2

[logging]
file = /tmp/runstream-test.log
"#,
        )
        .unwrap();

        assert_eq!(config.server.uri.as_deref(), Some("https://runs.example.com/"));
        assert_eq!(config.server.token.as_deref(), Some("abc123"));
        assert_eq!(config.transfer.block_size, 1024 * 1024);
        assert_eq!(config.transfer.write_dop, 4);
        assert_eq!(config.transfer.read_dop, 8);
        assert_eq!(config.transfer.max_block_retries, 2);
        assert_eq!(config.transfer.block_poll_interval_ms, 50);
        assert_eq!(config.watch.max_consecutive_errors, 3);
        assert_eq!(config.logs.reconnect_delay_ms, 10);
        assert_eq!(config.exec.shutdown_timeout_secs, 2);
        assert_eq!(config.logging.file, PathBuf::from("/tmp/runstream-test.log"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = load(
            r#"
[transfer]
read_dop = 2
"#,
        )
        .unwrap();

        assert_eq!(config.transfer.read_dop, 2);
        assert_eq!(config.transfer.write_dop, DEFAULT_WRITE_DOP);
        assert_eq!(config.transfer.block_size, DEFAULT_BLOCK_SIZE);
        assert!(config.server.uri.is_none());
    }

    #[test]
    fn test_invalid_server_uri() {
        let err = load("[server]\nuri = not a uri\n").unwrap_err();
        assert!(err.to_string().contains("server.uri"));
        assert!(err.to_string().contains("absolute URI"));
    }

    #[test]
    fn test_invalid_block_size() {
        let err = load("[transfer]\nblock_size = lots\n").unwrap_err();
        assert!(err.to_string().contains("transfer.block_size"));
    }

    #[test]
    fn test_zero_dop_rejected() {
        let err = load("[transfer]\nwrite_dop = 0\n").unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }

    #[test]
    fn test_negative_number_rejected() {
        let err = load("[watch]\nmax_consecutive_errors = -1\n").unwrap_err();
        assert!(err.to_string().contains("watch.max_consecutive_errors"));
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, "[transfer]\nblock_size = 64KB\n").unwrap();

        let config = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(config.transfer.block_size, 64 * 1024);
    }

    #[test]
    fn test_expand_tilde() {
        let expanded = expand_tilde("~/logs/run.log");
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
    }
}
