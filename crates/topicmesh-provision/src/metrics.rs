//! Reconciliation metrics

use crate::report::ProvisionReport;

/// Metrics for the reconciler
#[derive(Clone)]
pub struct ProvisionMetrics {
    /// Counter for reconciliation passes
    pub reconciliations: metrics::Counter,
    /// Counter for operations applied to the cluster
    pub operations_applied: metrics::Counter,
    /// Counter for failed operations
    pub operations_failed: metrics::Counter,
    /// Histogram for reconciliation duration
    pub duration: metrics::Histogram,
}

impl ProvisionMetrics {
    pub fn new() -> Self {
        Self {
            reconciliations: metrics::counter!("topicmesh_reconciliations_total"),
            operations_applied: metrics::counter!("topicmesh_operations_applied_total"),
            operations_failed: metrics::counter!("topicmesh_operations_failed_total"),
            duration: metrics::histogram!("topicmesh_reconciliation_duration_seconds"),
        }
    }

    pub(crate) fn record(&self, report: &ProvisionReport) {
        self.reconciliations.increment(1);
        self.operations_applied
            .increment(report.applied().count() as u64);
        self.operations_failed
            .increment(report.failures().count() as u64);
        if let Ok(elapsed) = report.duration().to_std() {
            self.duration.record(elapsed.as_secs_f64());
        }
    }
}

impl Default for ProvisionMetrics {
    fn default() -> Self {
        Self::new()
    }
}
