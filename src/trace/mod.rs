//! Distributed tracing
//!
//! Exporter selection and process-wide OpenTelemetry installation.

mod config;
mod provider;

pub use config::{ExportType, TracingConfig};
pub use provider::{build_provider, configure_tracing, tracer, TracerHandle};
