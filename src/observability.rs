use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Workflow activity counters
#[derive(Debug, Default)]
pub struct WorkflowMetrics {
    pub transitions: AtomicU64,
    pub rejections: AtomicU64,
    pub conflicts: AtomicU64,
    pub anomalies: AtomicU64,
    pub notifications: AtomicU64,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transition(&self) {
        self.transitions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejection(&self) {
        self.rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_conflict(&self) {
        self.conflicts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_anomaly(&self) {
        self.anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notifications(&self, count: u64) {
        self.notifications.fetch_add(count, Ordering::Relaxed);
    }

    pub fn get_stats(&self) -> WorkflowStats {
        WorkflowStats {
            transitions: self.transitions.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            anomalies: self.anomalies.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
        }
    }

    pub fn log_stats(&self) {
        let stats = self.get_stats();
        info!(
            transitions = stats.transitions,
            rejections = stats.rejections,
            conflicts = stats.conflicts,
            anomalies = stats.anomalies,
            notifications = stats.notifications,
            "Workflow metrics"
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowStats {
    pub transitions: u64,
    pub rejections: u64,
    pub conflicts: u64,
    pub anomalies: u64,
    pub notifications: u64,
}

/// Global metrics instance
static WORKFLOW_METRICS: std::sync::LazyLock<WorkflowMetrics> =
    std::sync::LazyLock::new(WorkflowMetrics::new);

pub fn workflow_metrics() -> &'static WorkflowMetrics {
    &WORKFLOW_METRICS
}

/// Time an operation and log its duration when finished
pub struct OperationTimer {
    operation: String,
    start: Instant,
}

impl OperationTimer {
    pub fn new(operation: &str) -> Self {
        Self {
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }

    pub fn finish(self) {
        let duration = self.start.elapsed();
        info!(
            operation = %self.operation,
            duration_ms = duration.as_millis() as u64,
            "Operation completed"
        );
    }
}
