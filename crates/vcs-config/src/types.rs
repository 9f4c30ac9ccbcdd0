//! Typed value conversion.

use bstr::{BStr, ByteSlice};

use crate::error::ConfigError;

/// Interpret a config value as a boolean.
///
/// A bare key (no `=`) is true and an empty value is false. Otherwise
/// `true`/`yes`/`on` and `false`/`no`/`off` are accepted in any case, as is
/// any integer (zero is false).
pub fn parse_bool(key: &str, value: Option<&BStr>) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(true);
    };
    let text = value.to_str_lossy();
    let text = text.trim();
    match text.to_ascii_lowercase().as_str() {
        "" | "false" | "no" | "off" => Ok(false),
        "true" | "yes" | "on" => Ok(true),
        other => other.parse::<i64>().map(|n| n != 0).map_err(|_| ConfigError::InvalidBool {
            key: key.to_string(),
            value: text.to_string(),
        }),
    }
}

/// Interpret a config value as an integer with an optional `k`, `m` or `g`
/// suffix (powers of 1024).
pub fn parse_int(key: &str, value: Option<&BStr>) -> Result<i64, ConfigError> {
    let text = value.map(|v| v.to_str_lossy().trim().to_string()).unwrap_or_default();
    let invalid = || ConfigError::InvalidInt {
        key: key.to_string(),
        value: text.clone(),
    };

    let (digits, scale) = match text.as_bytes().last().map(u8::to_ascii_lowercase) {
        Some(b'k') => (&text[..text.len() - 1], 1 << 10),
        Some(b'm') => (&text[..text.len() - 1], 1 << 20),
        Some(b'g') => (&text[..text.len() - 1], 1 << 30),
        _ => (text.as_str(), 1),
    };
    let base: i64 = digits.parse().map_err(|_| invalid())?;
    base.checked_mul(scale).ok_or_else(invalid)
}
