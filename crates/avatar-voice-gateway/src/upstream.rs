//! Client for the upstream speech synthesizer.

use std::time::Duration;

use bytes::Bytes;
use serde_json::json;
use tracing::debug;

use avatar_voice_core::config::Config;
use avatar_voice_core::error::{Result, VoiceError};

/// Posts `{"text": ...}` to the synthesizer and returns the audio body.
pub struct UpstreamSynth {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl UpstreamSynth {
    pub fn new(
        url: impl Into<String>,
        api_key: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| VoiceError::Other(anyhow::anyhow!("HTTP client setup failed: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let gateway = config.gateway.clone().unwrap_or_default();
        let api_key = gateway.resolve_upstream_api_key();
        Self::new(gateway.upstream_url, api_key, config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn synthesize(&self, text: &str) -> Result<Bytes> {
        debug!(url = %self.url, chars = text.chars().count(), "Calling upstream synthesizer");

        let mut req = self.client.post(&self.url).json(&json!({ "text": text }));
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await.map_err(|e| unavailable(text, e))?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(VoiceError::SynthesisFailed {
                status: status.as_u16(),
                text: text.to_string(),
            });
        }

        resp.bytes().await.map_err(|e| unavailable(text, e))
    }
}

fn unavailable(text: &str, e: reqwest::Error) -> VoiceError {
    let reason = if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    };
    VoiceError::SynthesisUnavailable {
        text: text.to_string(),
        reason,
    }
}
