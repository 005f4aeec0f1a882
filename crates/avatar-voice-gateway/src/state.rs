//! Gateway shared state.

use std::path::PathBuf;
use std::sync::Arc;

use avatar_voice_core::config::Config;

use crate::upstream::UpstreamSynth;

/// Shared state accessible from all handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub upstream: UpstreamSynth,
    /// Where `/say` stores clips and `/delete_tts` removes them.
    pub tts_dir: PathBuf,
    #[cfg(feature = "metrics")]
    pub metrics: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let upstream = UpstreamSynth::from_config(&config)?;
        let tts_dir = config.tts_dir();
        Ok(Self {
            config,
            upstream,
            tts_dir,
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    /// Serve the given recorder's output at `/metrics`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
