//! Structured logging
//!
//! Builds the process-wide `tracing` subscriber: text or JSON output, level
//! filtering, and optional trace correlation through [`TraceCorrelation`].

mod config;
mod correlation;

pub use config::{parse_level, LoggingConfig};
pub use correlation::{current_span_ids, Encoding, SpanIds, TraceCorrelation};

use tracing::level_filters::LevelFilter;
use tracing::{Span, Subscriber};
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::{Error, Result};
use crate::trace::TracerHandle;

/// Build the formatting layer described by `config`, writing to `make_writer`.
///
/// The layer filters by `config.level` on its own, so it can be composed into
/// any subscriber.
pub fn fmt_layer<S, W>(config: &LoggingConfig, make_writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let level = LevelFilter::from_level(config.level);
    let layer = fmt::layer()
        .with_writer(make_writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    match (config.as_json, config.tracing) {
        (false, false) => layer.with_filter(level).boxed(),
        (true, false) => layer.json().with_filter(level).boxed(),
        (false, true) => {
            let format = fmt::format()
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            layer
                .event_format(TraceCorrelation::new(format, Encoding::Text))
                .with_filter(level)
                .boxed()
        }
        (true, true) => {
            let format = fmt::format()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true);
            layer
                .json()
                .event_format(TraceCorrelation::new(format, Encoding::Json))
                .with_filter(level)
                .boxed()
        }
    }
}

/// Install the process-wide subscriber.
///
/// Logs go to stdout. When a tracer handle is supplied its OpenTelemetry layer
/// is installed too, which is what gives records their trace ids. May only
/// succeed once per process.
pub fn configure_logging(config: &LoggingConfig, tracer: Option<&TracerHandle>) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive(config.level.into())
        .add_directive("hyper=warn".parse()?)
        .add_directive("h2=warn".parse()?)
        .add_directive("tonic=warn".parse()?);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracer.map(|t| t.layer()))
        .with(fmt_layer(config, std::io::stdout))
        .try_init()
        .map_err(|e| Error::LoggingInit(e.to_string()))
}

/// Span scoping records to a named component
pub fn logger(name: &str) -> Span {
    tracing::info_span!("logger", logger = name)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use opentelemetry::trace::TracerProvider as _;
    use parking_lot::Mutex;
    use serde_json::Value;
    use std::io;
    use std::sync::Arc;
    use tracing::{debug, info, info_span, Level};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn lines(&self) -> Vec<String> {
            String::from_utf8(self.0.lock().clone())
                .unwrap()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn config(as_json: bool, tracing: bool) -> LoggingConfig {
        LoggingConfig {
            level: Level::INFO,
            as_json,
            tracing,
        }
    }

    /// Emit one record outside any span and one inside a traced span
    fn emit_with_otel(config: LoggingConfig) -> Vec<String> {
        let out = Captured::default();
        let provider = opentelemetry_sdk::trace::TracerProvider::builder().build();
        let subscriber = tracing_subscriber::registry()
            .with(tracing_opentelemetry::layer().with_tracer(provider.tracer("test")))
            .with(fmt_layer(&config, out.clone()));

        tracing::subscriber::with_default(subscriber, || {
            info!("outside");
            let span = info_span!("work");
            let _guard = span.enter();
            info!("inside");
        });

        out.lines()
    }

    #[test]
    fn test_text_output_and_level_filter() {
        let out = Captured::default();
        let subscriber = tracing_subscriber::registry().with(fmt_layer(&config(false, false), out.clone()));

        tracing::subscriber::with_default(subscriber, || {
            debug!("hidden");
            info!(user = "alice", "visible");
        });

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("visible"));
        assert!(lines[0].contains("user=\"alice\""));
        assert!(lines[0].contains("INFO"));
    }

    #[test]
    fn test_json_output() {
        let out = Captured::default();
        let subscriber = tracing_subscriber::registry().with(fmt_layer(&config(true, false), out.clone()));

        tracing::subscriber::with_default(subscriber, || {
            info!(answer = 42, "structured");
        });

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        let record: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["fields"]["message"], "structured");
        assert_eq!(record["fields"]["answer"], 42);
    }

    #[test]
    fn test_text_correlation_only_inside_span() {
        let lines = emit_with_otel(config(false, true));
        assert_eq!(lines.len(), 2);

        assert!(lines[0].contains("outside"));
        assert!(!lines[0].contains("trace_id="));

        assert!(lines[1].contains("inside"));
        let trace_id = lines[1]
            .split("trace_id=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .unwrap();
        assert_eq!(trace_id.len(), 32);
        assert!(lines[1].contains("span_id="));
    }

    #[test]
    fn test_json_correlation_only_inside_span() {
        let lines = emit_with_otel(config(true, true));
        assert_eq!(lines.len(), 2);

        let outside: Value = serde_json::from_str(&lines[0]).unwrap();
        assert!(outside.get("trace_id").is_none());

        let inside: Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(inside["fields"]["message"], "inside");
        assert_eq!(inside["trace_id"].as_str().unwrap().len(), 32);
        assert_eq!(inside["span_id"].as_str().unwrap().len(), 16);
    }

    #[test]
    fn test_correlation_disabled_leaves_records_alone() {
        let lines = emit_with_otel(config(false, false));
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| !l.contains("trace_id=")));
    }

    #[test]
    fn test_correlation_without_otel_layer_is_passthrough() {
        let out = Captured::default();
        let subscriber = tracing_subscriber::registry().with(fmt_layer(&config(false, true), out.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let _guard = info_span!("plain").entered();
            info!("no otel here");
        });

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert!(!lines[0].contains("trace_id="));
    }

    #[test]
    fn test_logger_span_names_component() {
        let out = Captured::default();
        let subscriber = tracing_subscriber::registry().with(fmt_layer(&config(true, false), out.clone()));

        tracing::subscriber::with_default(subscriber, || {
            let _guard = logger("operational").entered();
            info!("scoped");
        });

        let record: Value = serde_json::from_str(&out.lines()[0]).unwrap();
        assert_eq!(record["span"]["logger"], "operational");
    }

    #[test]
    fn test_configure_logging_installs_once() {
        let config = LoggingConfig::default();
        assert!(configure_logging(&config, None).is_ok());
        assert_matches!(configure_logging(&config, None), Err(Error::LoggingInit(_)));
    }
}
