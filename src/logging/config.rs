//! Logging configuration

use tracing::Level;

use crate::env::{env_bool, env_or, process_env};
use crate::error::Result;

/// Configuration for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Minimum level (`LOG_LEVEL`)
    pub level: Level,
    /// JSON output instead of text (`LOG_AS_JSON`)
    pub as_json: bool,
    /// Add trace and span ids to records emitted inside a span (`LOG_TRACING`)
    pub tracing: bool,
}

impl LoggingConfig {
    /// Create from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(process_env)
    }

    /// Create from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            level: parse_level(&env_or(&lookup, "LOG_LEVEL", "INFO")),
            as_json: env_bool(&lookup, "LOG_AS_JSON", "false")?,
            tracing: env_bool(&lookup, "LOG_TRACING", "false")?,
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            as_json: false,
            tracing: false,
        }
    }
}

/// Parse a level name; anything unrecognised is INFO
pub fn parse_level(level: &str) -> Level {
    match level.trim().to_uppercase().as_str() {
        "DEBUG" => Level::DEBUG,
        "INFO" => Level::INFO,
        "WARN" | "WARNING" => Level::WARN,
        "ERROR" => Level::ERROR,
        _ => Level::INFO,
    }
}

// =============================================================================
// Tests
// =============================================================================
