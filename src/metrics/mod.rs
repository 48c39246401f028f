//! Metrics module
//!
//! Prometheus registry management with name-keyed tracking, plus the metric
//! kinds the `prometheus` crate lacks (summaries, function-backed values).

mod collector;
mod config;
mod func;
mod runtime;
mod summary;

pub use collector::{
    service_info_metric, service_info_metric_from, MetricsCollector, SERVICE_INFO_METRIC,
};
pub use config::MetricsConfig;
pub use func::{CounterFunc, GaugeFunc};
pub use runtime::RuntimeCollector;
pub use summary::{Summary, SummaryOpts, SummaryVec};

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use prometheus::core::Collector;
    use prometheus::TextEncoder;

    /// Render a single collector in the text exposition format.
    ///
    /// Empty families are skipped, as `Registry::gather` does.
    pub(crate) fn render(collector: &dyn Collector) -> String {
        let families: Vec<_> = collector
            .collect()
            .into_iter()
            .filter(|family| !family.get_metric().is_empty())
            .collect();
        TextEncoder::new().encode_to_string(&families).unwrap()
    }
}
