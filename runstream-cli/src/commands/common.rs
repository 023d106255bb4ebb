//! Argument types and parsers shared across CLI commands.

use std::num::NonZeroUsize;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Args;
use runstream::config::{Size, TransferConfig};

/// Buffer transfer tuning flags.
#[derive(Debug, Clone, Default, Args)]
pub struct TransferArgs {
    /// Size of each buffer block (e.g. 4MiB, 512K). Units are base 2
    #[arg(long, value_parser = parse_block_size)]
    pub block_size: Option<Size>,

    /// Number of blocks uploaded in parallel
    #[arg(long)]
    pub write_dop: Option<NonZeroUsize>,

    /// Number of blocks downloaded in parallel
    #[arg(long)]
    pub read_dop: Option<NonZeroUsize>,
}

impl TransferArgs {
    /// Apply the flags that were given on top of `base`.
    pub fn apply(&self, base: TransferConfig) -> TransferConfig {
        let mut config = base;
        if let Some(size) = self.block_size {
            config = config.with_block_size(size.bytes());
        }
        if let Some(dop) = self.write_dop {
            config = config.with_write_dop(dop.get());
        }
        if let Some(dop) = self.read_dop {
            config = config.with_read_dop(dop.get());
        }
        config
    }
}

/// Parse a non-zero block size.
pub fn parse_block_size(s: &str) -> Result<Size, String> {
    let size: Size = s.parse().map_err(|e: runstream::config::SizeParseError| e.to_string())?;
    if size.bytes() == 0 {
        return Err("block size must be greater than zero".to_string());
    }
    Ok(size)
}

/// Parse a `key=value` pair.
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("'{}' is not in the form KEY=VALUE", s)),
    }
}

/// Parse an RFC 3339 timestamp.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| format!("'{}' is not an RFC 3339 timestamp: {}", s, e))
}

/// Parse a duration such as `90`, `90s`, `15m`, `2h` or `1h30m`.
///
/// A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let invalid = || format!("'{}' is not a duration (e.g. 90s, 15m, 2h, 1h30m)", s);
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = trimmed.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = 0u64;
    let mut number = String::new();
    for c in trimmed.chars() {
        if c.is_ascii_digit() {
            number.push(c);
            continue;
        }
        let value: u64 = number.parse().map_err(|_| invalid())?;
        let unit = match c {
            's' => 1,
            'm' => 60,
            'h' => 3600,
            'd' => 86_400,
            _ => return Err(invalid()),
        };
        total = value
            .checked_mul(unit)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
        number.clear();
    }
    if !number.is_empty() {
        return Err(invalid());
    }
    Ok(Duration::from_secs(total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_size_units() {
        assert_eq!(parse_block_size("4M").unwrap().bytes(), 4 * 1024 * 1024);
        assert_eq!(parse_block_size("512KiB").unwrap().bytes(), 512 * 1024);
        assert_eq!(parse_block_size("100").unwrap().bytes(), 100);
        assert!(parse_block_size("0").is_err());
        assert!(parse_block_size("big").is_err());
    }

    #[test]
    fn test_key_value() {
        assert_eq!(
            parse_key_value("input=abc123").unwrap(),
            ("input".to_string(), "abc123".to_string())
        );
        assert_eq!(
            parse_key_value("x=a=b").unwrap(),
            ("x".to_string(), "a=b".to_string())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=v").is_err());
    }

    #[test]
    fn test_timestamp() {
        let t = parse_timestamp("2024-05-06T07:08:09.5+02:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2024-05-06T05:08:09.500+00:00");
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_duration() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("15m").unwrap(), Duration::from_secs(900));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("5x").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("10m5").is_err());
    }

    #[test]
    fn test_transfer_args_override_only_given_flags() {
        let base = TransferConfig::new().with_block_size(1024).with_read_dop(7);
        let args = TransferArgs {
            block_size: Some(Size(2048)),
            write_dop: NonZeroUsize::new(3),
            read_dop: None,
        };
        let config = args.apply(base);
        assert_eq!(config.block_size(), 2048);
        assert_eq!(config.write_dop(), 3);
        assert_eq!(config.read_dop(), 7);
    }
}
