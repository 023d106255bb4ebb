//! Human-readable block size parsing (e.g., "4MiB", "512KB", "1M").

use std::fmt;
use thiserror::Error;

/// Error parsing a size string.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid size '{input}' - expected format like '4MiB', '512KB', '1M', or a byte count")]
pub struct SizeParseError {
    input: String,
}

impl SizeParseError {
    fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

const KIB: usize = 1024;
const MIB: usize = 1024 * 1024;
const GIB: usize = 1024 * 1024 * 1024;

/// Parse a human-readable size string into bytes.
///
/// All units are base 2. The unit may be written as `K`, `KB` or `KiB`
/// (likewise `M` and `G`), in any case, with optional whitespace between the
/// number and the unit. A bare number, or a number followed by `B`, is a
/// byte count.
///
/// # Examples
///
/// ```
/// use runstream::config::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("512B").unwrap(), 512);
/// assert_eq!(parse_size("4MiB").unwrap(), 4 * 1024 * 1024);
/// assert_eq!(parse_size("4 mb").unwrap(), 4 * 1024 * 1024);
/// assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<usize, SizeParseError> {
    let trimmed = s.trim();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (num_str, unit) = trimmed.split_at(digits_end);
    if num_str.is_empty() {
        return Err(SizeParseError::new(s));
    }

    let multiplier = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => KIB,
        "M" | "MB" | "MIB" => MIB,
        "G" | "GB" | "GIB" => GIB,
        _ => return Err(SizeParseError::new(s)),
    };

    let num: usize = num_str.parse().map_err(|_| SizeParseError::new(s))?;
    num.checked_mul(multiplier)
        .ok_or_else(|| SizeParseError::new(s))
}

/// Format a byte count using the largest base-2 unit that divides it evenly.
///
/// ```
/// use runstream::config::format_size;
///
/// assert_eq!(format_size(4 * 1024 * 1024), "4MiB");
/// assert_eq!(format_size(1000), "1000B");
/// ```
pub fn format_size(bytes: usize) -> String {
    if bytes >= GIB && bytes % GIB == 0 {
        format!("{}GiB", bytes / GIB)
    } else if bytes >= MIB && bytes % MIB == 0 {
        format!("{}MiB", bytes / MIB)
    } else if bytes >= KIB && bytes % KIB == 0 {
        format!("{}KiB", bytes / KIB)
    } else {
        format!("{}B", bytes)
    }
}

/// A size value usable directly as a clap argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size(pub usize);

impl Size {
    pub fn bytes(self) -> usize {
        self.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_size(self.0))
    }
}

impl std::str::FromStr for Size {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_size(s).map(Size)
    }
}
