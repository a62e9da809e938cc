use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, HistogramVec, IntCounterVec, TextEncoder,
};

// Metrics registry
static PERMISSION_CHECKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rbac_permission_checks_total",
        "Total number of permission checks",
        &["decision"]
    )
    .unwrap()
});

static PERMISSION_CHECK_LATENCY: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "rbac_permission_check_latency_seconds",
        "Permission check latency in seconds",
        &["decision"],
        vec![0.0005, 0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100]
    )
    .unwrap()
});

static AUDIT_RECORDS_WRITTEN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rbac_audit_records_written_total",
        "Total number of audit records persisted",
        &["kind"]
    )
    .unwrap()
});

static AUDIT_WRITE_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rbac_audit_write_failures_total",
        "Total number of audit records lost to write failures",
        &["kind"]
    )
    .unwrap()
});

static ANCESTOR_CACHE_LOOKUPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rbac_ancestor_cache_lookups_total",
        "Ancestor closure cache lookups",
        &["result"]
    )
    .unwrap()
});

static ADMIN_OPERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rbac_admin_operations_total",
        "Total number of administrative policy mutations",
        &["operation", "outcome"]
    )
    .unwrap()
});

pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn record_permission_check(decision: &str, duration: f64) {
        PERMISSION_CHECKS_TOTAL.with_label_values(&[decision]).inc();
        PERMISSION_CHECK_LATENCY
            .with_label_values(&[decision])
            .observe(duration);
    }

    pub fn record_audit_written(kind: &str, count: u64) {
        AUDIT_RECORDS_WRITTEN_TOTAL
            .with_label_values(&[kind])
            .inc_by(count);
    }

    pub fn record_audit_failure(kind: &str, count: u64) {
        AUDIT_WRITE_FAILURES_TOTAL
            .with_label_values(&[kind])
            .inc_by(count);
    }

    pub fn audit_failures(kind: &str) -> u64 {
        AUDIT_WRITE_FAILURES_TOTAL.with_label_values(&[kind]).get()
    }

    pub fn record_cache_hit() {
        ANCESTOR_CACHE_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
    }

    pub fn record_cache_miss() {
        ANCESTOR_CACHE_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
    }

    pub fn record_admin_operation(operation: &str, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        ADMIN_OPERATIONS_TOTAL
            .with_label_values(&[operation, outcome])
            .inc();
    }

    /// Export all metrics in Prometheus format
    pub fn export() -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        encoder.encode_to_string(&metric_families)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_contains_recorded_families() {
        MetricsRecorder::record_permission_check("granted", 0.001);
        MetricsRecorder::record_admin_operation("create_role", true);

        let output = MetricsRecorder::export().unwrap();
        assert!(output.contains("rbac_permission_checks_total"));
        assert!(output.contains("rbac_admin_operations_total"));
    }

    #[test]
    fn test_audit_failure_counter_increments() {
        let before = MetricsRecorder::audit_failures("metrics_test");
        MetricsRecorder::record_audit_failure("metrics_test", 2);
        assert_eq!(MetricsRecorder::audit_failures("metrics_test"), before + 2);
    }
}
