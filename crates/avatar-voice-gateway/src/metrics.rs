//! Prometheus metrics recording and endpoint.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {e}"))
}

/// Record a `/say` request with its outcome and duration.
pub fn record_say(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    metrics::counter!("gateway_say_total", &labels).increment(1);
    metrics::histogram!("gateway_say_duration_seconds", &labels).record(duration_secs);
}

/// Record the result of a `/delete_tts` batch.
pub fn record_cleanup(deleted: usize, failed: usize) {
    metrics::counter!("gateway_files_deleted_total").increment(deleted as u64);
    metrics::counter!("gateway_delete_failures_total").increment(failed as u64);
}
