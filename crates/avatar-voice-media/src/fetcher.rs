//! Audio fetching: one synthesis request per utterance.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use avatar_voice_core::config::Config;
use avatar_voice_core::error::{Result, VoiceError};
use avatar_voice_core::protocol::{FILENAME_HEADER, SAY_PATH};

use crate::audio::{AudioResources, ReadyAudio};

/// Turns text into playable audio. Implementations perform no retries.
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, text: &str) -> Result<ReadyAudio>;
}

/// Fetches audio from `GET <endpoint>/say?text=...`.
pub struct HttpAudioFetcher {
    client: reqwest::Client,
    endpoint: String,
    resources: AudioResources,
}

impl HttpAudioFetcher {
    /// Create a fetcher; `timeout` bounds each request end to end.
    pub fn new(
        endpoint: impl Into<String>,
        timeout: Option<Duration>,
        resources: AudioResources,
    ) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            resources,
        })
    }

    pub fn from_config(config: &Config, resources: AudioResources) -> Result<Self> {
        Self::new(config.tts_endpoint(), config.request_timeout(), resources)
    }

    pub fn say_url(&self) -> String {
        format!("{}{SAY_PATH}", self.endpoint)
    }
}

#[async_trait]
impl AudioFetcher for HttpAudioFetcher {
    async fn fetch(&self, text: &str) -> Result<ReadyAudio> {
        debug!(text, url = %self.say_url(), "Requesting synthesis");

        let resp = self
            .client
            .get(self.say_url())
            .query(&[("text", text)])
            .send()
            .await
            .map_err(|e| unavailable(text, &e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VoiceError::SynthesisFailed {
                status: status.as_u16(),
                text: text.to_string(),
            });
        }

        let filename = resp
            .headers()
            .get(FILENAME_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);

        let bytes = resp.bytes().await.map_err(|e| unavailable(text, &e))?;
        let audio = self.resources.acquire(bytes);

        debug!(
            text,
            filename = filename.as_deref().unwrap_or("-"),
            bytes = audio.len(),
            "Synthesis complete"
        );

        Ok(ReadyAudio {
            text: text.to_string(),
            audio,
            filename,
        })
    }
}

pub(crate) fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| VoiceError::Other(anyhow::anyhow!("HTTP client setup failed: {e}")))
}

fn unavailable(text: &str, err: &reqwest::Error) -> VoiceError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else {
        err.to_string()
    };
    VoiceError::SynthesisUnavailable {
        text: text.to_string(),
        reason,
    }
}
