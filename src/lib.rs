//! corrupt-o11y - Observability Toolkit
//!
//! Structured logging, Prometheus metrics, OpenTelemetry tracing and a small
//! operational HTTP server, configured from the environment.
//!
//! # Architecture
//!
//! ```text
//! ServiceInfo ──┐
//! Status ───────┼──▶ OperationalServer  (/health /ready /info /metrics)
//! Metrics ──────┘
//!
//! TracingConfig ──▶ TracerHandle ──▶ configure_logging (trace_id / span_id)
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use corrupt_o11y::{
//!     configure_logging, configure_tracing, LoggingConfig, MetricsCollector,
//!     OperationalServer, OperationalServerConfig, ServiceInfo, Status, TracingConfig,
//! };
//!
//! # async fn run() -> corrupt_o11y::Result<()> {
//! let info = ServiceInfo::from_env();
//!
//! let tracer = configure_tracing(
//!     &TracingConfig::from_env()?,
//!     &info.name,
//!     &info.version,
//! )?;
//! configure_logging(&LoggingConfig::from_env()?, Some(&tracer))?;
//!
//! let metrics = Arc::new(MetricsCollector::new()?);
//! metrics.create_service_info_metric_from(&info)?;
//!
//! let status = Arc::new(Status::new());
//! let mut server = OperationalServer::new(
//!     OperationalServerConfig::from_env(),
//!     info,
//!     status.clone(),
//!     metrics,
//! );
//! server.start().await?;
//! status.set_ready(true);
//!
//! // ... serve traffic ...
//!
//! server.stop(Duration::from_secs(10)).await?;
//! tracer.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`env`] - Environment lookup and boolean parsing
//! - [`error`] - Error types
//! - [`logging`] - Subscriber installation and trace correlation
//! - [`metadata`] - Service identity
//! - [`metrics`] - Prometheus registry management
//! - [`operational`] - Liveness/readiness state and the HTTP server
//! - [`trace`] - OpenTelemetry exporter configuration

pub mod env;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod metrics;
pub mod operational;
pub mod trace;

// Re-export commonly used types
pub use error::{Error, Result};
pub use logging::{configure_logging, LoggingConfig};
pub use metadata::ServiceInfo;
pub use metrics::{MetricsCollector, MetricsConfig};
pub use operational::{OperationalServer, OperationalServerConfig, Status};
pub use trace::{configure_tracing, TracerHandle, TracingConfig};
