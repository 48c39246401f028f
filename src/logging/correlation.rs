//! Trace correlation for log records
//!
//! [`TraceCorrelation`] decorates another event formatter. Records emitted
//! inside a span that carries OpenTelemetry data get `trace_id` and `span_id`
//! fields; everything else is forwarded untouched.

use std::fmt;
use std::fmt::Write as _;

use opentelemetry::trace::{SpanId, TraceContextExt, TraceId};
use serde_json::{Map, Value};
use tracing::{Event, Subscriber};
use tracing_opentelemetry::OtelData;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

/// Output encoding of the wrapped formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// `key=value` text lines
    Text,
    /// One JSON object per line
    Json,
}

/// Identifiers of the span a record was emitted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanIds {
    pub trace_id: TraceId,
    pub span_id: SpanId,
}

/// Event formatter decorator adding trace correlation ids
#[derive(Debug, Clone)]
pub struct TraceCorrelation<E> {
    inner: E,
    encoding: Encoding,
}

impl<E> TraceCorrelation<E> {
    /// Wrap `inner`, whose output uses `encoding`
    pub fn new(inner: E, encoding: Encoding) -> Self {
        Self { inner, encoding }
    }

    fn annotate(&self, formatted: String, ids: SpanIds) -> String {
        match self.encoding {
            Encoding::Text => format!(
                "{} trace_id={} span_id={}\n",
                formatted.trim_end_matches('\n'),
                ids.trace_id,
                ids.span_id
            ),
            Encoding::Json => {
                let Ok(mut record) = serde_json::from_str::<Map<String, Value>>(formatted.trim_end())
                else {
                    return formatted;
                };
                record.insert("trace_id".into(), Value::String(ids.trace_id.to_string()));
                record.insert("span_id".into(), Value::String(ids.span_id.to_string()));

                match serde_json::to_string(&record) {
                    Ok(mut line) => {
                        line.push('\n');
                        line
                    }
                    Err(_) => formatted,
                }
            }
        }
    }
}

impl<S, N, E> FormatEvent<S, N> for TraceCorrelation<E>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    E: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let Some(ids) = current_span_ids(ctx) else {
            return self.inner.format_event(ctx, writer, event);
        };

        let mut buf = String::new();
        self.inner.format_event(ctx, Writer::new(&mut buf), event)?;
        writer.write_str(&self.annotate(buf, ids))
    }
}

/// Ids of the current span, if it is known to OpenTelemetry
pub fn current_span_ids<S, N>(ctx: &FmtContext<'_, S, N>) -> Option<SpanIds>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    let span = ctx.lookup_current()?;
    let extensions = span.extensions();
    let otel = extensions.get::<OtelData>()?;

    let span_id = otel.builder.span_id?;
    // only root spans carry their own trace id; children inherit the parent's
    let trace_id = otel
        .builder
        .trace_id
        .unwrap_or_else(|| otel.parent_cx.span().span_context().trace_id());

    if trace_id == TraceId::INVALID || span_id == SpanId::INVALID {
        return None;
    }

    Some(SpanIds { trace_id, span_id })
}
