//! Prometheus metrics for publish runs
//!
//! The orchestrator records into a [`PublishMetrics`]; `encode` renders the
//! text exposition format.
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub static METRICS: Lazy<Arc<PublishMetrics>> = Lazy::new(|| Arc::new(PublishMetrics::new()));

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabels {
    /// "done", "aborted" or "failed"
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PhaseLabels {
    /// "mapping", "serialize" or "store"
    pub phase: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct StoreLabels {
    pub backend: String,
    /// "success", "failure", "skipped"
    pub result: String,
}

pub struct PublishMetrics {
    registry: RwLock<Registry>,

    pub publish_runs_total: Family<OutcomeLabels, Counter>,
    pub publish_phase_duration_seconds: Family<PhaseLabels, Histogram>,
    pub publish_active: Gauge,
    pub triples_emitted_total: Counter,
    pub row_errors_total: Counter,
    pub store_commits_total: Family<StoreLabels, Counter>,
}

impl PublishMetrics {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let publish_runs_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "karma_publish_runs_total",
            "Publish requests by final outcome",
            publish_runs_total.clone(),
        );

        let publish_phase_duration_seconds =
            Family::<PhaseLabels, Histogram>::new_with_constructor(|| {
                // 5ms .. ~40s
                Histogram::new(exponential_buckets(0.005, 2.5, 10))
            });
        registry.register(
            "karma_publish_phase_duration_seconds",
            "Time spent in each publish phase",
            publish_phase_duration_seconds.clone(),
        );

        let publish_active = Gauge::default();
        registry.register(
            "karma_publish_active",
            "Publish requests currently running",
            publish_active.clone(),
        );

        let triples_emitted_total = Counter::default();
        registry.register(
            "karma_triples_emitted_total",
            "Triples written to published artifacts",
            triples_emitted_total.clone(),
        );

        let row_errors_total = Counter::default();
        registry.register(
            "karma_row_errors_total",
            "Row-level generation errors",
            row_errors_total.clone(),
        );

        let store_commits_total = Family::<StoreLabels, Counter>::default();
        registry.register(
            "karma_store_commits_total",
            "Store commit attempts by backend and result",
            store_commits_total.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            publish_runs_total,
            publish_phase_duration_seconds,
            publish_active,
            triples_emitted_total,
            row_errors_total,
            store_commits_total,
        }
    }

    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        let registry = self.registry.read();
        encode(&mut buffer, &registry)?;
        Ok(buffer)
    }

    pub fn record_phase(&self, phase: &str, duration: Duration) {
        self.publish_phase_duration_seconds
            .get_or_create(&PhaseLabels {
                phase: phase.to_string(),
            })
            .observe(duration.as_secs_f64());
    }

    pub fn record_generation(&self, triples: usize, row_errors: usize) {
        self.triples_emitted_total.inc_by(triples as u64);
        self.row_errors_total.inc_by(row_errors as u64);
    }

    pub fn record_store(&self, backend: &str, result: &str) {
        self.store_commits_total
            .get_or_create(&StoreLabels {
                backend: backend.to_string(),
                result: result.to_string(),
            })
            .inc();
    }

    fn record_outcome(&self, outcome: &str) {
        self.publish_runs_total
            .get_or_create(&OutcomeLabels {
                outcome: outcome.to_string(),
            })
            .inc();
    }
}

impl Default for PublishMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard for one publish run
///
/// Counts the run as active until it is finished. A guard dropped without
/// [`PublishRunMetrics::finish`] is counted as "failed".
pub struct PublishRunMetrics {
    collector: Arc<PublishMetrics>,
    start: Instant,
    completed: bool,
}

impl PublishRunMetrics {
    pub fn new(collector: Arc<PublishMetrics>) -> Self {
        collector.publish_active.inc();
        Self {
            collector,
            start: Instant::now(),
            completed: false,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn finish(mut self, outcome: &str) {
        self.completed = true;
        self.collector.record_outcome(outcome);
        self.collector.publish_active.dec();
    }
}

impl Drop for PublishRunMetrics {
    fn drop(&mut self) {
        if !self.completed {
            self.collector.record_outcome("failed");
            self.collector.publish_active.dec();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_families_registered() {
        let collector = PublishMetrics::new();
        collector.record_phase("serialize", Duration::from_millis(3));
        collector.record_store("embedded", "success");
        let output = collector.encode().unwrap();

        assert!(output.contains("karma_publish_runs_total"));
        assert!(output.contains("karma_publish_phase_duration_seconds"));
        assert!(output.contains("karma_triples_emitted_total"));
        assert!(output.contains("karma_row_errors_total"));
        assert!(output.contains("karma_store_commits_total"));
        assert!(output.contains("phase=\"serialize\""));
    }

    #[test]
    fn test_generation_counters() {
        let collector = PublishMetrics::new();
        collector.record_generation(5, 1);
        collector.record_generation(2, 0);
        assert_eq!(collector.triples_emitted_total.get(), 7);
        assert_eq!(collector.row_errors_total.get(), 1);
    }

    #[test]
    fn test_dropped_guard_counts_as_failed() {
        let collector = Arc::new(PublishMetrics::new());
        {
            let _run = PublishRunMetrics::new(collector.clone());
            assert_eq!(collector.publish_active.get(), 1);
        }
        assert_eq!(collector.publish_active.get(), 0);
        let failed = collector
            .publish_runs_total
            .get_or_create(&OutcomeLabels {
                outcome: "failed".into(),
            })
            .get();
        assert_eq!(failed, 1);
    }

    #[test]
    fn test_finished_guard_records_outcome() {
        let collector = Arc::new(PublishMetrics::new());
        PublishRunMetrics::new(collector.clone()).finish("done");
        let done = collector
            .publish_runs_total
            .get_or_create(&OutcomeLabels {
                outcome: "done".into(),
            })
            .get();
        assert_eq!(done, 1);
    }
}
