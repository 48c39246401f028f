//! Error types for corrupt-o11y

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running observability components
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Boolean environment variable with an unrecognised value
    #[error(
        "invalid boolean value for {var}: '{value}'. Use true/false, 1/0, yes/no, on/off"
    )]
    InvalidBool { var: String, value: String },

    /// Unknown tracing exporter type
    #[error("invalid export type: {0}")]
    InvalidExportType(String),

    /// Network exporter configured without an endpoint
    #[error("{0} exporter requires an endpoint")]
    MissingEndpoint(String),

    /// Log filter directive could not be parsed
    #[error("invalid log filter directive: {0}")]
    FilterDirective(#[from] tracing_subscriber::filter::ParseError),

    // =========================================================================
    // Metrics Errors
    // =========================================================================
    /// Tracking name already in use
    #[error("metric already registered under name: {0}")]
    AlreadyRegistered(String),

    /// Error reported by the Prometheus registry
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    // =========================================================================
    // Operational Server Errors
    // =========================================================================
    /// Listener could not be bound
    #[error("failed to listen on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation not permitted in the current lifecycle state
    #[error("invalid server state: {0}")]
    InvalidState(String),

    /// Graceful shutdown did not finish before the deadline
    #[error("server {addr} did not shut down within {deadline:?}")]
    ShutdownTimeout { addr: SocketAddr, deadline: Duration },

    // =========================================================================
    // Telemetry Installation Errors
    // =========================================================================
    /// Span exporter or tracer provider failure
    #[error("tracing error: {0}")]
    Tracing(String),

    /// Global subscriber could not be installed
    #[error("failed to install logging: {0}")]
    LoggingInit(String),
}
