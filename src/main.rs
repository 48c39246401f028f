//! corrupt-o11y
//!
//! Runs the operational server for a service configured entirely from the
//! environment, until interrupted.
//!
//! ```text
//! env ──▶ tracing ──▶ logging ──▶ metrics ──▶ OperationalServer ──▶ Ctrl-C ──▶ stop
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use prometheus::Opts;
use tracing::{error, info, warn};

use corrupt_o11y::env::process_env;
use corrupt_o11y::{
    configure_logging, configure_tracing, LoggingConfig, MetricsCollector, OperationalServer,
    OperationalServerConfig, Result, ServiceInfo, Status, TracingConfig,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Operational endpoints for a service: health, readiness, info and metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Override the operational server port (OPERATIONAL_PORT otherwise)
    #[arg(long)]
    port: Option<u16>,

    /// Graceful shutdown deadline in seconds
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECONDS", default_value = "10")]
    shutdown_timeout_seconds: u64,
}

// =============================================================================
// Telemetry Settings
// =============================================================================

/// Logging and tracing settings, parsed together so a bad value in either
/// fails startup before anything is installed
#[derive(Debug)]
struct Telemetry {
    logging: LoggingConfig,
    tracing: TracingConfig,
}

impl Telemetry {
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            logging: LoggingConfig::from_lookup(&lookup)?,
            tracing: TracingConfig::from_lookup(&lookup)?,
        })
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let started = Instant::now();

    let service_info = ServiceInfo::from_env();
    let telemetry = Telemetry::from_lookup(process_env)?;

    // Spans are only exported when logs are asked to carry their ids
    let tracer = if telemetry.logging.tracing {
        Some(configure_tracing(
            &telemetry.tracing,
            &service_info.name,
            &service_info.version,
        )?)
    } else {
        None
    };
    configure_logging(&telemetry.logging, tracer.as_ref())?;

    info!(
        service = %service_info.name,
        version = %service_info.version,
        instance = %service_info.instance_id,
        "starting corrupt-o11y"
    );
    match &tracer {
        Some(_) => info!(exporter = %telemetry.tracing.export_type, "tracing configured"),
        None => info!("tracing disabled"),
    }

    let metrics = Arc::new(MetricsCollector::new()?);
    metrics.create_service_info_metric_from(&service_info)?;
    metrics.create_gauge_func(
        Opts::new("uptime_seconds", "Seconds since the process started"),
        move || started.elapsed().as_secs_f64(),
    )?;

    let mut server_config = OperationalServerConfig::from_env();
    if let Some(port) = args.port {
        server_config.port = port;
    }

    let status = Arc::new(Status::new());
    let mut server =
        OperationalServer::new(server_config, service_info, status.clone(), metrics);
    server.start().await?;
    status.set_ready(true);

    info!(
        url = server.server_url().unwrap_or_default(),
        "operational server ready"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    status.set_ready(false);

    let deadline = Duration::from_secs(args.shutdown_timeout_seconds);
    if let Err(e) = server.stop(deadline).await {
        warn!("Operational server did not stop cleanly: {}", e);
    }

    if let Some(tracer) = tracer {
        if let Err(e) = tracer.shutdown() {
            warn!("Tracer shutdown failed: {}", e);
        }
    }

    info!("Shutdown complete");
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use corrupt_o11y::Error;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_invalid_exporter_rejected_with_tracing_off() {
        let result = Telemetry::from_lookup(lookup(&[
            ("LOG_TRACING", "false"),
            ("TRACING_EXPORTER_TYPE", "jaeger"),
        ]));
        assert_matches!(result, Err(Error::InvalidExportType(t)) if t == "jaeger");
    }

    #[test]
    fn test_defaults() {
        let telemetry = Telemetry::from_lookup(lookup(&[])).unwrap();
        assert!(!telemetry.logging.tracing);
        assert_eq!(telemetry.tracing.export_type.as_str(), "stdout");
    }

    #[test]
    fn test_invalid_log_flag_rejected() {
        let result = Telemetry::from_lookup(lookup(&[("LOG_AS_JSON", "sometimes")]));
        assert_matches!(result, Err(Error::InvalidBool { var, .. }) if var == "LOG_AS_JSON");
    }
}
