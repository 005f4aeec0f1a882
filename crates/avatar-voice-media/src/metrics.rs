//! Pipeline metrics, recorded through the `metrics` facade.

/// Record a finished synthesis request.
pub fn record_fetch(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    metrics::counter!("tts_fetch_total", &labels).increment(1);
    metrics::histogram!("tts_fetch_duration_seconds", &labels).record(duration_secs);
}

/// Record a clip handed to the player.
pub fn record_playback() {
    metrics::counter!("tts_playback_total").increment(1);
}

/// Record a finished cleanup request.
pub fn record_cleanup(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    metrics::counter!("tts_cleanup_total", &labels).increment(1);
}

/// Record the current number of buffered clips.
pub fn record_ready_depth(depth: usize) {
    metrics::gauge!("tts_ready_depth").set(depth as f64);
}
