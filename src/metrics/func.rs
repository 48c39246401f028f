//! Function-backed metrics
//!
//! Counters and gauges whose value is produced by a closure at scrape time.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Counter, Gauge, Opts};

type ValueFn = Arc<dyn Fn() -> f64 + Send + Sync>;

/// Gauge whose value is read from a closure on every collection
#[derive(Clone)]
pub struct GaugeFunc {
    gauge: Gauge,
    value_fn: ValueFn,
}

impl GaugeFunc {
    /// Create a new function-backed gauge
    pub fn new<F>(opts: Opts, value_fn: F) -> prometheus::Result<Self>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Ok(Self {
            gauge: Gauge::with_opts(opts)?,
            value_fn: Arc::new(value_fn),
        })
    }

    /// Evaluate the closure
    pub fn get(&self) -> f64 {
        (self.value_fn)()
    }
}

impl Collector for GaugeFunc {
    fn desc(&self) -> Vec<&Desc> {
        self.gauge.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        self.gauge.set(self.get());
        self.gauge.collect()
    }
}

impl fmt::Debug for GaugeFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GaugeFunc")
            .field("desc", &self.gauge.desc())
            .finish()
    }
}

/// Counter whose value is read from a closure on every collection.
///
/// The closure must be monotonic; negative values are reported as zero.
#[derive(Clone)]
pub struct CounterFunc {
    counter: Counter,
    value_fn: ValueFn,
    // serialises reset+set so concurrent scrapes never see a half-written value
    sync: Arc<Mutex<()>>,
}

impl CounterFunc {
    /// Create a new function-backed counter
    pub fn new<F>(opts: Opts, value_fn: F) -> prometheus::Result<Self>
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Ok(Self {
            counter: Counter::with_opts(opts)?,
            value_fn: Arc::new(value_fn),
            sync: Arc::new(Mutex::new(())),
        })
    }

    /// Evaluate the closure
    pub fn get(&self) -> f64 {
        (self.value_fn)()
    }
}

impl Collector for CounterFunc {
    fn desc(&self) -> Vec<&Desc> {
        self.counter.desc()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let value = self.get();
        let value = if value.is_finite() { value.max(0.0) } else { 0.0 };

        let _guard = self.sync.lock();
        self.counter.reset();
        self.counter.inc_by(value);
        self.counter.collect()
    }
}

impl fmt::Debug for CounterFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterFunc")
            .field("desc", &self.counter.desc())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
