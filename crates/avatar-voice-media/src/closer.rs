//! Server-side cleanup of played clips.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use avatar_voice_core::config::Config;
use avatar_voice_core::error::{Result, VoiceError};
use avatar_voice_core::protocol::{DELETE_PATH, DeleteRequest, DeleteResponse};

use crate::fetcher::build_client;

/// Asks the TTS server to delete temporary files once they have been played.
#[async_trait]
pub trait CleanupClient: Send + Sync {
    async fn delete(&self, files: &[String]) -> Result<DeleteResponse>;
}

/// Posts `{"files": [...]}` to `<endpoint>/delete_tts`.
pub struct HttpCleanupClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpCleanupClient {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.tts_endpoint(), config.request_timeout())
    }

    pub fn delete_url(&self) -> String {
        format!("{}{DELETE_PATH}", self.endpoint)
    }
}

#[async_trait]
impl CleanupClient for HttpCleanupClient {
    async fn delete(&self, files: &[String]) -> Result<DeleteResponse> {
        debug!(count = files.len(), url = %self.delete_url(), "Requesting cleanup");

        let body = DeleteRequest {
            files: files.to_vec(),
        };
        let resp = self
            .client
            .post(self.delete_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| VoiceError::CleanupFailed(e.to_string()))?;

        // 207 (some files missing) still counts as a completed cleanup.
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(VoiceError::CleanupFailed(format!("status {status}: {body}")));
        }

        resp.json::<DeleteResponse>()
            .await
            .map_err(|e| VoiceError::CleanupFailed(format!("invalid response: {e}")))
    }
}
