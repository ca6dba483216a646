//! Shared metrics recording for cache stores.

use std::time::Instant;

/// Records operation metrics for store operations.
///
/// This function records two metrics for each operation:
/// 1. `storage_operations_total` - Counter for operation count by status
/// 2. `storage_operation_duration_ms` - Histogram for operation latency
///
/// # Arguments
///
/// * `backend` - Backend name (e.g., "sqlite", "memory")
/// * `operation` - Operation name (e.g., "count", "find_first", "insert")
/// * `start` - Operation start time from `Instant::now()`
/// * `status` - Operation status ("success" or "error")
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_operation_metrics_without_recorder() {
        // No global recorder is installed in unit tests; recording must be a no-op
        let start = Instant::now();
        record_operation_metrics("sqlite", "count", start, "success");
        record_operation_metrics("memory", "find_first", start, "error");
    }
}
