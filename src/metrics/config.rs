//! Metrics configuration

use crate::env::{env_bool, env_or, process_env};
use crate::error::Result;

/// Configuration for the metrics collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Register async-runtime metrics (`METRICS_ENABLE_GO`)
    pub enable_runtime_collector: bool,
    /// Register process metrics (`METRICS_ENABLE_PROCESS`)
    pub enable_process_collector: bool,
    /// Prefix for metrics built by the `create_*` helpers (`METRICS_PREFIX`)
    pub metric_prefix: String,
}

impl MetricsConfig {
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
            enable_runtime_collector: env_bool(&lookup, "METRICS_ENABLE_GO", "true")?,
            enable_process_collector: env_bool(&lookup, "METRICS_ENABLE_PROCESS", "true")?,
            metric_prefix: env_or(&lookup, "METRICS_PREFIX", ""),
        })
    }

    /// Config with no built-in collectors and no prefix
    pub fn bare() -> Self {
        Self {
            enable_runtime_collector: false,
            enable_process_collector: false,
            metric_prefix: String::new(),
        }
    }

    /// Set the metric prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.metric_prefix = prefix.into();
        self
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enable_runtime_collector: true,
            enable_process_collector: true,
            metric_prefix: String::new(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
