//! Environment Lookup
//!
//! Helpers shared by every `from_env` constructor. Lookups are passed in as
//! closures so configuration can be built from the process environment or
//! from a fixed map.

use crate::error::{Error, Result};

/// Read a variable from the process environment
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Parse a flexible boolean.
///
/// Accepts `true/t/1/yes/y/on` and `false/f/0/no/n/off`, case-insensitive,
/// surrounding whitespace ignored.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" | "on" => Some(true),
        "false" | "f" | "0" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean variable, falling back to `default` when unset or blank.
pub fn env_bool<F>(lookup: F, var: &str, default: &str) -> Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(var)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string());

    parse_bool(&raw).ok_or_else(|| Error::InvalidBool {
        var: var.to_string(),
        value: raw.trim().to_lowercase(),
    })
}

/// Read a string variable; unset and empty both yield `default`.
pub fn env_or<F>(lookup: F, var: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

// =============================================================================
// Tests
// =============================================================================
