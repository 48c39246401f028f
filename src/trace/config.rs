//! Tracing configuration

use std::fmt;
use std::str::FromStr;

use crate::env::{env_or, process_env};
use crate::error::{Error, Result};

/// Span exporter backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportType {
    /// Pretty-printed spans on stdout
    #[default]
    Stdout,
    /// OTLP over HTTP/protobuf
    Http,
    /// OTLP over gRPC
    Grpc,
}

impl ExportType {
    /// Name as accepted by `TRACING_EXPORTER_TYPE`
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Stdout => "stdout",
            ExportType::Http => "http",
            ExportType::Grpc => "grpc",
        }
    }

    /// Whether the exporter talks to a remote collector
    pub fn is_remote(&self) -> bool {
        !matches!(self, ExportType::Stdout)
    }
}

impl FromStr for ExportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "stdout" => Ok(ExportType::Stdout),
            "http" => Ok(ExportType::Http),
            "grpc" => Ok(ExportType::Grpc),
            other => Err(Error::InvalidExportType(other.to_string())),
        }
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for OpenTelemetry tracing
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TracingConfig {
    /// Exporter backend (`TRACING_EXPORTER_TYPE`)
    pub export_type: ExportType,
    /// Collector endpoint (`TRACING_EXPORTER_ENDPOINT`), required for http/grpc
    pub endpoint: String,
}

impl TracingConfig {
    /// Create with an explicit exporter and endpoint
    pub fn new(export_type: ExportType, endpoint: impl Into<String>) -> Self {
        Self {
            export_type,
            endpoint: endpoint.into(),
        }
    }

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
            export_type: env_or(&lookup, "TRACING_EXPORTER_TYPE", "stdout").parse()?,
            endpoint: env_or(&lookup, "TRACING_EXPORTER_ENDPOINT", ""),
        })
    }

    /// Check that remote exporters have an endpoint
    pub fn validate(&self) -> Result<()> {
        if self.export_type.is_remote() && self.endpoint.trim().is_empty() {
            return Err(Error::MissingEndpoint(self.export_type.as_str().to_uppercase()));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
