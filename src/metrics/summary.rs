//! Summary metrics
//!
//! Labelled summaries without quantile objectives. Each child tracks the sum
//! and count of its observations; the vector is exposed as one family of type
//! `summary`, rendered as `<name>_sum` and `<name>_count` samples.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use prometheus::core::{Atomic, AtomicF64, AtomicU64, Collector, Desc};
use prometheus::proto::{self, LabelPair, MetricFamily, MetricType};
use prometheus::{Error, Opts};

/// Options for a summary
pub type SummaryOpts = Opts;

#[derive(Debug)]
struct SummaryCore {
    label_pairs: Vec<LabelPair>,
    sum: AtomicF64,
    count: AtomicU64,
}

/// A single labelled summary child
#[derive(Clone, Debug)]
pub struct Summary {
    core: Arc<SummaryCore>,
}

impl Summary {
    fn new(label_pairs: Vec<LabelPair>) -> Self {
        Self {
            core: Arc::new(SummaryCore {
                label_pairs,
                sum: AtomicF64::new(0.0),
                count: AtomicU64::new(0),
            }),
        }
    }

    /// Record one observation
    pub fn observe(&self, value: f64) {
        self.core.sum.inc_by(value);
        self.core.count.inc_by(1);
    }

    /// Sum of all observations
    pub fn sample_sum(&self) -> f64 {
        self.core.sum.get()
    }

    /// Number of observations
    pub fn sample_count(&self) -> u64 {
        self.core.count.get()
    }

    fn metric(&self) -> proto::Metric {
        let mut summary = proto::Summary::default();
        summary.set_sample_sum(self.sample_sum());
        summary.set_sample_count(self.sample_count());

        let mut metric = proto::Metric::from_label(self.core.label_pairs.clone());
        metric.set_summary(summary);
        metric
    }
}

/// Labelled family of [`Summary`] children
#[derive(Clone, Debug)]
pub struct SummaryVec {
    desc: Arc<Desc>,
    children: Arc<RwLock<HashMap<Vec<String>, Summary>>>,
}

impl SummaryVec {
    /// Create a new summary vector
    pub fn new(opts: SummaryOpts, label_names: &[&str]) -> prometheus::Result<Self> {
        let desc = Desc::new(
            opts.fq_name(),
            opts.help,
            label_names.iter().map(|l| l.to_string()).collect(),
            opts.const_labels,
        )?;

        Ok(Self {
            desc: Arc::new(desc),
            children: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Get or create the child for the given label values.
    ///
    /// # Panics
    ///
    /// Panics if the number of values does not match the label names, like
    /// the `prometheus` vectors do.
    pub fn with_label_values(&self, values: &[&str]) -> Summary {
        match self.get_metric_with_label_values(values) {
            Ok(summary) => summary,
            Err(e) => panic!("{}", e),
        }
    }

    /// Fallible variant of [`SummaryVec::with_label_values`]
    pub fn get_metric_with_label_values(&self, values: &[&str]) -> prometheus::Result<Summary> {
        let key = self.key(values)?;

        if let Some(summary) = self.children.read().get(&key) {
            return Ok(summary.clone());
        }

        let mut children = self.children.write();
        let summary = children
            .entry(key)
            .or_insert_with(|| Summary::new(self.label_pairs(values)));
        Ok(summary.clone())
    }

    /// Remove the child for the given label values
    pub fn remove_label_values(&self, values: &[&str]) -> prometheus::Result<()> {
        let key = self.key(values)?;

        match self.children.write().remove(&key) {
            Some(_) => Ok(()),
            None => Err(Error::Msg(format!(
                "missing label values {:?} for summary {}",
                values, self.desc.fq_name
            ))),
        }
    }

    /// Remove all children
    pub fn reset(&self) {
        self.children.write().clear();
    }

    fn key(&self, values: &[&str]) -> prometheus::Result<Vec<String>> {
        if values.len() != self.desc.variable_labels.len() {
            return Err(Error::InconsistentCardinality {
                expect: self.desc.variable_labels.len(),
                got: values.len(),
            });
        }
        Ok(values.iter().map(|v| v.to_string()).collect())
    }

    fn label_pairs(&self, values: &[&str]) -> Vec<LabelPair> {
        let mut pairs: Vec<LabelPair> = self
            .desc
            .variable_labels
            .iter()
            .zip(values)
            .map(|(name, value)| {
                let mut pair = LabelPair::default();
                pair.set_name(name.clone());
                pair.set_value(value.to_string());
                pair
            })
            .chain(self.desc.const_label_pairs.iter().cloned())
            .collect();
        pairs.sort_by(|a, b| a.name().cmp(b.name()));
        pairs
    }
}

impl Collector for SummaryVec {
    fn desc(&self) -> Vec<&Desc> {
        vec![&self.desc]
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let mut metrics: Vec<(Vec<String>, proto::Metric)> = self
            .children
            .read()
            .iter()
            .map(|(key, summary)| (key.clone(), summary.metric()))
            .collect();
        metrics.sort_by(|a, b| a.0.cmp(&b.0));

        let mut family = MetricFamily::default();
        family.set_name(self.desc.fq_name.clone());
        family.set_help(self.desc.help.clone());
        family.set_field_type(MetricType::SUMMARY);
        family.set_metric(metrics.into_iter().map(|(_, m)| m).collect());
        vec![family]
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::render;

    #[test]
    fn test_observe_tracks_sum_and_count() {
        let summary = SummaryVec::new(
            Opts::new("request_size_bytes", "Request size"),
            &["route"],
        )
        .unwrap();

        let child = summary.with_label_values(&["/upload"]);
        child.observe(100.0);
        child.observe(50.5);

        assert_eq!(child.sample_count(), 2);
        assert_eq!(child.sample_sum(), 150.5);

        let text = render(&summary);
        assert!(text.contains("# TYPE request_size_bytes summary"));
        assert!(text.contains("request_size_bytes_sum{route=\"/upload\"} 150.5"));
        assert!(text.contains("request_size_bytes_count{route=\"/upload\"} 2"));
    }

    #[test]
    fn test_single_family_and_identity() {
        let summary = SummaryVec::new(Opts::new("latency", "Latency"), &["l"]).unwrap();
        summary.with_label_values(&["x"]).observe(1.0);

        let families = summary.collect();
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].get_field_type(), MetricType::SUMMARY);

        let names: Vec<String> = summary.desc().iter().map(|d| d.fq_name.clone()).collect();
        assert_eq!(names, vec!["latency".to_string()]);

        let text = render(&summary);
        assert!(!text.contains("# TYPE latency_sum"));
        assert!(!text.contains("# TYPE latency_count"));
    }

    #[test]
    fn test_children_share_state() {
        let summary = SummaryVec::new(Opts::new("jobs", "Jobs"), &["queue"]).unwrap();
        summary.with_label_values(&["fast"]).observe(2.0);
        summary.with_label_values(&["fast"]).observe(3.0);

        let child = summary.get_metric_with_label_values(&["fast"]).unwrap();
        assert_eq!(child.sample_sum(), 5.0);
        assert_eq!(child.sample_count(), 2);
    }

    #[test]
    fn test_const_labels_rendered() {
        let opts = Opts::new("payload_bytes", "Payload").const_label("region", "eu");
        let summary = SummaryVec::new(opts, &["kind"]).unwrap();
        summary.with_label_values(&["put"]).observe(4.0);

        let text = render(&summary);
        assert!(text.contains("payload_bytes_count{kind=\"put\",region=\"eu\"} 1"));
    }

    #[test]
    fn test_negative_observations_allowed() {
        let summary = SummaryVec::new(Opts::new("temperature_delta", "Delta"), &[]).unwrap();
        let child = summary.with_label_values(&[]);
        child.observe(-3.0);
        child.observe(1.0);
        assert_eq!(child.sample_sum(), -2.0);
        assert_eq!(child.sample_count(), 2);
        assert!(render(&summary).contains("temperature_delta_sum -2"));
    }

    #[test]
    fn test_label_cardinality_checked() {
        let summary = SummaryVec::new(Opts::new("latency", "Latency"), &["a", "b"]).unwrap();
        assert!(summary.get_metric_with_label_values(&["only-one"]).is_err());
        assert!(summary.remove_label_values(&["only-one"]).is_err());
    }

    #[test]
    fn test_remove_and_reset() {
        let summary = SummaryVec::new(Opts::new("payload", "Payload"), &["kind"]).unwrap();
        summary.with_label_values(&["a"]).observe(1.0);
        summary.with_label_values(&["b"]).observe(2.0);

        summary.remove_label_values(&["a"]).unwrap();
        assert!(summary.remove_label_values(&["a"]).is_err());
        let text = render(&summary);
        assert!(!text.contains("kind=\"a\""));
        assert!(text.contains("kind=\"b\""));

        summary.reset();
        let families = summary.collect();
        assert_eq!(families.len(), 1);
        assert!(families[0].get_metric().is_empty());
        assert!(render(&summary).is_empty());
    }
}
