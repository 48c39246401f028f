//! Async runtime metrics
//!
//! Gauges describing the Tokio runtime the scrape runs on. Reported as zero
//! when collected outside a runtime.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{IntGauge, Opts};

/// Collector for Tokio runtime statistics
#[derive(Clone, Debug)]
pub struct RuntimeCollector {
    workers: IntGauge,
    alive_tasks: IntGauge,
}

impl RuntimeCollector {
    /// Create a new runtime collector
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            workers: IntGauge::with_opts(Opts::new(
                "tokio_runtime_workers",
                "Number of worker threads used by the async runtime",
            ))?,
            alive_tasks: IntGauge::with_opts(Opts::new(
                "tokio_runtime_alive_tasks",
                "Number of tasks currently alive in the async runtime",
            ))?,
        })
    }

    fn refresh(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let metrics = handle.metrics();
                self.workers.set(metrics.num_workers() as i64);
                self.alive_tasks.set(metrics.num_alive_tasks() as i64);
            }
            Err(_) => {
                self.workers.set(0);
                self.alive_tasks.set(0);
            }
        }
    }
}

impl Collector for RuntimeCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.workers
            .desc()
            .into_iter()
            .chain(self.alive_tasks.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.refresh();
        let mut families = self.workers.collect();
        families.extend(self.alive_tasks.collect());
        families
    }
}

// =============================================================================
// Tests
// =============================================================================
