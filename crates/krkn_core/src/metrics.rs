use prometheus::{histogram_opts, opts, HistogramVec, IntCounter, IntCounterVec, Registry};
use tokio::time::Instant;

use crate::errors::Error;

/// Prometheus metrics registry, following the teacher's
/// `util::metrics::Metrics` shape: reconciliation counters/histograms
/// plus domain-specific counters for aggregation and submission
/// outcomes.
#[derive(Clone)]
pub struct Metrics {
    pub reconciliations: IntCounter,
    pub failures: IntCounterVec,
    pub reconcile_duration: HistogramVec,
    pub config_requests_completed: IntCounter,
    pub value_submission_rejections: IntCounterVec,
    pub scenario_run_terminal: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        let reconcile_duration = HistogramVec::new(
            histogram_opts!(
                "controller_reconcile_duration_seconds",
                "The duration of reconcile to complete in seconds",
            )
            .buckets(vec![0.01, 0.1, 0.25, 0.5, 1., 5., 15., 60.]),
            &["instance"],
        )
        .unwrap();
        let failures = IntCounterVec::new(
            opts!("controller_reconciliation_errors_total", "reconciliation errors"),
            &["instance", "error"],
        )
        .unwrap();
        let reconciliations = IntCounter::new("reconciliations_total", "reconciliations").unwrap();
        let config_requests_completed = IntCounter::new(
            "config_requests_completed_total",
            "config requests that reached Completed",
        )
        .unwrap();
        let value_submission_rejections = IntCounterVec::new(
            opts!(
                "value_submission_rejections_total",
                "value submissions rejected by reason"
            ),
            &["reason"],
        )
        .unwrap();
        let scenario_run_terminal = IntCounterVec::new(
            opts!(
                "scenario_run_terminal_total",
                "scenario runs that reached a terminal phase"
            ),
            &["phase"],
        )
        .unwrap();
        Metrics {
            reconciliations,
            failures,
            reconcile_duration,
            config_requests_completed,
            value_submission_rejections,
            scenario_run_terminal,
        }
    }
}

impl Metrics {
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.reconcile_duration.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        registry.register(Box::new(self.reconciliations.clone()))?;
        registry.register(Box::new(self.config_requests_completed.clone()))?;
        registry.register(Box::new(self.value_submission_rejections.clone()))?;
        registry.register(Box::new(self.scenario_run_terminal.clone()))?;
        Ok(self)
    }

    pub fn reconcile_failure(&self, instance: &str, e: &Error) {
        self.failures.with_label_values(&[instance, e.metric_label().as_ref()]).inc();
    }

    pub fn count_and_measure(&self, controller: &str) -> ReconcileMeasurer {
        self.reconciliations.inc();
        ReconcileMeasurer {
            start: Instant::now(),
            metric: self.reconcile_duration.clone(),
            instance: controller.to_string(),
        }
    }
}

/// Smart function duration measurer: Drop computes and records the
/// observation in the histogram.
pub struct ReconcileMeasurer {
    start: Instant,
    metric: HistogramVec,
    instance: String,
}

impl Drop for ReconcileMeasurer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.with_label_values(&[self.instance.as_str()]).observe(duration);
    }
}
