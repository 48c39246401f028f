//! Tracer provider installation
//!
//! Builds the span exporter selected by [`TracingConfig`] and installs the
//! process-wide tracer provider and W3C trace-context propagator.

use std::borrow::Cow;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

use super::config::{ExportType, TracingConfig};
use crate::error::{Error, Result};

/// Instrumentation scope used for spans bridged from `tracing`
const INSTRUMENTATION_NAME: &str = env!("CARGO_PKG_NAME");

/// Handle to an installed tracer provider
#[derive(Debug, Clone)]
pub struct TracerHandle {
    provider: TracerProvider,
}

impl TracerHandle {
    /// Wrap an existing provider
    pub fn new(provider: TracerProvider) -> Self {
        Self { provider }
    }

    /// Get the underlying provider
    pub fn provider(&self) -> &TracerProvider {
        &self.provider
    }

    /// Get a tracer from this provider
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> Tracer {
        self.provider.tracer(name)
    }

    /// Layer bridging `tracing` spans into this provider
    pub fn layer<S>(&self) -> OpenTelemetryLayer<S, Tracer>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        tracing_opentelemetry::layer().with_tracer(self.tracer(INSTRUMENTATION_NAME))
    }

    /// Flush and shut down the provider
    pub fn shutdown(&self) -> Result<()> {
        self.provider
            .shutdown()
            .map_err(|e| Error::Tracing(format!("failed to shut down tracer provider: {}", e)))
    }
}

/// Configure OpenTelemetry tracing for the process.
///
/// Remote exporters are validated before any exporter is built and must be
/// configured from within a Tokio runtime.
pub fn configure_tracing(
    config: &TracingConfig,
    service_name: &str,
    service_version: &str,
) -> Result<TracerHandle> {
    let provider = build_provider(config, service_name, service_version)?;

    global::set_tracer_provider(provider.clone());
    global::set_text_map_propagator(TraceContextPropagator::new());

    Ok(TracerHandle::new(provider))
}

/// Build a tracer provider without installing it globally
pub fn build_provider(
    config: &TracingConfig,
    service_name: &str,
    service_version: &str,
) -> Result<TracerProvider> {
    config.validate()?;

    let resource = Resource::new(vec![
        KeyValue::new("service.name", service_name.to_string()),
        KeyValue::new("service.version", service_version.to_string()),
    ]);
    let builder = TracerProvider::builder().with_resource(resource);

    let provider = match config.export_type {
        ExportType::Stdout => builder
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build(),
        ExportType::Http => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .with_endpoint(http_traces_url(&config.endpoint))
                .build()
                .map_err(|e| Error::Tracing(format!("failed to create HTTP exporter: {}", e)))?;
            builder.with_batch_exporter(exporter, runtime::Tokio).build()
        }
        ExportType::Grpc => {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(with_scheme(&config.endpoint))
                .build()
                .map_err(|e| Error::Tracing(format!("failed to create GRPC exporter: {}", e)))?;
            builder.with_batch_exporter(exporter, runtime::Tokio).build()
        }
    };

    Ok(provider)
}

/// Get a tracer from the globally installed provider
pub fn tracer(name: impl Into<Cow<'static, str>>) -> BoxedTracer {
    global::tracer(name)
}

fn with_scheme(endpoint: &str) -> String {
    let endpoint = endpoint.trim().trim_end_matches('/');
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

// OTLP/HTTP endpoints given as bare host:port get the standard traces path
fn http_traces_url(endpoint: &str) -> String {
    let url = with_scheme(endpoint);
    let authority_start = url.find("://").map(|i| i + 3).unwrap_or(0);
    if url[authority_start..].contains('/') {
        url
    } else {
        format!("{}/v1/traces", url)
    }
}

// =============================================================================
// Tests
// =============================================================================
