//! Metrics Collector
//!
//! Name-keyed bookkeeping over a private Prometheus registry.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{
    CounterVec, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use tracing::debug;

use super::config::MetricsConfig;
use super::func::{CounterFunc, GaugeFunc};
use super::runtime::RuntimeCollector;
use super::summary::{SummaryOpts, SummaryVec};
use crate::error::{Error, Result};
use crate::metadata::ServiceInfo;

/// Tracking name used for the service info gauge
pub const SERVICE_INFO_METRIC: &str = "service_info";

/// Centralised registry for Prometheus metrics.
///
/// Every collector registered here is tracked under a caller-chosen name so it
/// can be looked up and unregistered later. One lock guards both the tracking
/// map and the registry.
pub struct MetricsCollector {
    /// Configuration
    config: MetricsConfig,
    /// Underlying registry served on `/metrics`
    registry: Registry,
    /// Tracked collectors by name
    metrics: RwLock<HashMap<String, Box<dyn Collector>>>,
}

impl MetricsCollector {
    /// Create a new collector configured from the environment
    pub fn new() -> Result<Self> {
        Self::with_config(MetricsConfig::from_env()?)
    }

    /// Create a new collector with the given configuration
    pub fn with_config(config: MetricsConfig) -> Result<Self> {
        let registry = Registry::new();

        if config.enable_runtime_collector {
            registry.register(Box::new(RuntimeCollector::new()?))?;
        }

        if config.enable_process_collector {
            #[cfg(target_os = "linux")]
            registry.register(Box::new(
                prometheus::process_collector::ProcessCollector::for_self(),
            ))?;
        }

        Ok(Self {
            config,
            registry,
            metrics: RwLock::new(HashMap::new()),
        })
    }

    /// Get configuration
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Get the underlying Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Register a collector under `name`.
    ///
    /// Fails without changing any state if the name is already tracked or the
    /// registry rejects the collector.
    pub fn register<C>(&self, name: impl Into<String>, collector: C) -> Result<()>
    where
        C: Collector + Clone + 'static,
    {
        let name = name.into();
        let mut metrics = self.metrics.write();

        if metrics.contains_key(&name) {
            return Err(Error::AlreadyRegistered(name));
        }

        self.registry.register(Box::new(collector.clone()))?;
        metrics.insert(name, Box::new(collector));
        Ok(())
    }

    /// Unregister the collector tracked under `name`.
    ///
    /// Returns false if nothing was tracked under that name.
    pub fn unregister(&self, name: &str) -> bool {
        let mut metrics = self.metrics.write();

        match metrics.remove(name) {
            Some(collector) => {
                if let Err(e) = self.registry.unregister(collector) {
                    debug!(metric = name, error = %e, "collector missing from registry");
                }
                true
            }
            None => false,
        }
    }

    /// Unregister every tracked collector
    pub fn clear(&self) {
        let mut metrics = self.metrics.write();

        for (name, collector) in metrics.drain() {
            if let Err(e) = self.registry.unregister(collector) {
                debug!(metric = %name, error = %e, "collector missing from registry");
            }
        }
    }

    /// Check if a collector is tracked under `name`
    pub fn is_registered(&self, name: &str) -> bool {
        self.metrics.read().contains_key(name)
    }

    /// Tracked names, sorted
    pub fn registered_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.metrics.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Gather all metric families from the registry
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Export the registry in the Prometheus text format
    pub fn encode_text(&self) -> Result<String> {
        Ok(TextEncoder::new().encode_to_string(&self.gather())?)
    }

    // =========================================================================
    // Convenience constructors
    // =========================================================================

    /// Create and register a [`CounterVec`]
    pub fn create_counter_vec(&self, opts: Opts, label_names: &[&str]) -> Result<CounterVec> {
        let name = opts.name.clone();
        let counter = CounterVec::new(self.prefixed(opts), label_names)?;
        self.track(name, counter.clone());
        Ok(counter)
    }

    /// Create and register a [`GaugeVec`]
    pub fn create_gauge_vec(&self, opts: Opts, label_names: &[&str]) -> Result<GaugeVec> {
        let name = opts.name.clone();
        let gauge = GaugeVec::new(self.prefixed(opts), label_names)?;
        self.track(name, gauge.clone());
        Ok(gauge)
    }

    /// Create and register a [`HistogramVec`]
    pub fn create_histogram_vec(
        &self,
        mut opts: HistogramOpts,
        label_names: &[&str],
    ) -> Result<HistogramVec> {
        let name = opts.common_opts.name.clone();
        opts.common_opts = self.prefixed(opts.common_opts);
        let histogram = HistogramVec::new(opts, label_names)?;
        self.track(name, histogram.clone());
        Ok(histogram)
    }

    /// Create and register a [`SummaryVec`]
    pub fn create_summary_vec(
        &self,
        opts: SummaryOpts,
        label_names: &[&str],
    ) -> Result<SummaryVec> {
        let name = opts.name.clone();
        let summary = SummaryVec::new(self.prefixed(opts), label_names)?;
        self.track(name, summary.clone());
        Ok(summary)
    }

    /// Create and register a [`CounterFunc`]
    pub fn create_counter_func<F>(&self, opts: Opts, count_fn: F) -> Result<CounterFunc>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let name = opts.name.clone();
        let counter = CounterFunc::new(self.prefixed(opts), count_fn)?;
        self.track(name, counter.clone());
        Ok(counter)
    }

    /// Create and register a [`GaugeFunc`]
    pub fn create_gauge_func<F>(&self, opts: Opts, gauge_fn: F) -> Result<GaugeFunc>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        let name = opts.name.clone();
        let gauge = GaugeFunc::new(self.prefixed(opts), gauge_fn)?;
        self.track(name, gauge.clone());
        Ok(gauge)
    }

    /// Create the service info gauge and register it as `service_info`
    pub fn create_service_info_metric(
        &self,
        service_name: &str,
        service_version: &str,
        instance_id: &str,
        commit_sha: Option<&str>,
        build_time: Option<&str>,
    ) -> Result<GaugeVec> {
        let gauge = service_info_metric(
            service_name,
            service_version,
            instance_id,
            commit_sha,
            build_time,
        )?;
        self.track(SERVICE_INFO_METRIC.to_string(), gauge.clone());
        Ok(gauge)
    }

    /// Create the service info gauge from a [`ServiceInfo`] and register it
    pub fn create_service_info_metric_from(&self, info: &ServiceInfo) -> Result<GaugeVec> {
        self.create_service_info_metric(
            &info.name,
            &info.version,
            &info.instance_id,
            Some(&info.commit_sha),
            Some(&info.build_time),
        )
    }

    fn prefixed(&self, mut opts: Opts) -> Opts {
        if !self.config.metric_prefix.is_empty() {
            opts.name = format!("{}{}", self.config.metric_prefix, opts.name);
        }
        opts
    }

    // Registration failures are dropped: the caller still gets a working
    // handle, it is just not tracked.
    fn track<C>(&self, name: String, collector: C)
    where
        C: Collector + Clone + 'static,
    {
        if let Err(e) = self.register(name.clone(), collector) {
            debug!(metric = %name, error = %e, "created metric was not registered");
        }
    }
}

impl fmt::Debug for MetricsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsCollector")
            .field("config", &self.config)
            .field("metrics", &self.registered_names())
            .finish()
    }
}

/// Build a `service_info` gauge set to 1.
///
/// Labels are `service`, `version`, `instance`, plus `commit` and
/// `build_time` when those values are supplied.
pub fn service_info_metric(
    service_name: &str,
    service_version: &str,
    instance_id: &str,
    commit_sha: Option<&str>,
    build_time: Option<&str>,
) -> Result<GaugeVec> {
    let mut label_names = vec!["service", "version", "instance"];
    let mut label_values = vec![service_name, service_version, instance_id];

    if let Some(commit) = commit_sha {
        label_names.push("commit");
        label_values.push(commit);
    }
    if let Some(built) = build_time {
        label_names.push("build_time");
        label_values.push(built);
    }

    let gauge = GaugeVec::new(
        Opts::new(SERVICE_INFO_METRIC, "Service information and build metadata"),
        label_names.as_slice(),
    )?;
    gauge
        .get_metric_with_label_values(label_values.as_slice())?
        .set(1.0);
    Ok(gauge)
}

/// Build a `service_info` gauge from a [`ServiceInfo`]
pub fn service_info_metric_from(info: &ServiceInfo) -> Result<GaugeVec> {
    service_info_metric(
        &info.name,
        &info.version,
        &info.instance_id,
        Some(&info.commit_sha),
        Some(&info.build_time),
    )
}

// =============================================================================
// Tests
// =============================================================================
