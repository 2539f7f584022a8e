//! Centralized validation functions for updated.
//!
//! This module provides unified validation for:
//! - Time intervals (`30s`, `5m`, `4h`, `1d`)
//! - Hex digests used as expected checksums

use anyhow::{bail, Result};
use std::time::Duration;

/// Interval syntax check (e.g., "4h", "30m", "1d").
///
/// Valid suffixes: `s` (seconds), `m` (minutes), `h` (hours), `d` (days)
///
/// # Examples
/// ```
/// use updated::validation::is_valid_interval;
/// assert!(is_valid_interval("600m"));
/// assert!(is_valid_interval("1d"));
/// assert!(!is_valid_interval("4x"));
/// assert!(!is_valid_interval(""));
/// ```
pub fn is_valid_interval(interval: &str) -> bool {
    parse_interval(interval).is_ok()
}

/// Parse an interval into a [`Duration`].
///
/// Requires ASCII-only input to prevent Unicode-related edge cases.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use updated::validation::parse_interval;
/// assert_eq!(parse_interval("90s").unwrap(), Duration::from_secs(90));
/// assert_eq!(parse_interval("2h").unwrap(), Duration::from_secs(7200));
/// assert!(parse_interval("2 h").is_err());
/// ```
pub fn parse_interval(interval: &str) -> Result<Duration> {
    if interval.is_empty() {
        bail!("Interval cannot be empty");
    }
    if !interval.is_ascii() {
        bail!("Invalid interval '{}'. Only ASCII characters allowed", interval);
    }
    if interval.len() < 2 {
        bail!("Invalid interval '{}'. Use format like '4h', '30m', '1d'", interval);
    }

    let (num_part, suffix) = interval.split_at(interval.len() - 1);
    let multiplier: u64 = match suffix {
        "s" => 1,
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => bail!(
            "Invalid interval suffix in '{}'. Use s (seconds), m (minutes), h (hours), or d (days)",
            interval
        ),
    };
    if !num_part.bytes().all(|b| b.is_ascii_digit()) {
        bail!("Invalid interval '{}'. Number part must be digits only", interval);
    }
    let value: u32 = num_part
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid interval '{}'. Number out of range", interval))?;

    Ok(Duration::from_secs(u64::from(value) * multiplier))
}

/// Validate a hex digest of exactly `len` characters.
///
/// # Examples
/// ```
/// use updated::validation::validate_hex_digest;
/// assert!(validate_hex_digest("MD5", "076cfeb40394314adf28b7be79e6ecb1", 32).is_ok());
/// assert!(validate_hex_digest("MD5", "076cfeb4", 32).is_err());
/// ```
pub fn validate_hex_digest(name: &str, value: &str, len: usize) -> Result<()> {
    if value.len() != len {
        bail!(
            "Invalid {} '{}'. Expected {} hex characters, got {}",
            name,
            value,
            len,
            value.len()
        );
    }
    if !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("Invalid {} '{}'. Only hex characters allowed", name, value);
    }
    Ok(())
}

/// Expected MD5 of the named root: empty disables the check.
pub fn validate_md5_hex(value: &str) -> Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    validate_hex_digest("MD5 checksum", value, 32)
}

/// Expected SHA-256 of the root anchors: always required.
pub fn validate_sha256_hex(value: &str) -> Result<()> {
    validate_hex_digest("SHA-256 checksum", value, 64)
}
