//! Operational server configuration

use crate::env::{env_or, process_env};

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 42069;

/// Operational HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationalServerConfig {
    /// Bind host (`OPERATIONAL_HOST`)
    pub host: String,
    /// Bind port (`OPERATIONAL_PORT`); 0 lets the OS pick one
    pub port: u16,
}

impl OperationalServerConfig {
    /// Create with explicit host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Create from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(process_env)
    }

    /// Create from an arbitrary variable lookup.
    ///
    /// A port that does not parse falls back to [`DEFAULT_PORT`].
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("OPERATIONAL_PORT")
            .and_then(|p| p.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            host: env_or(&lookup, "OPERATIONAL_HOST", DEFAULT_HOST),
            port,
        }
    }

    /// `host:port` string used for binding
    pub fn bind_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl Default for OperationalServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

// =============================================================================
// Tests
// =============================================================================
