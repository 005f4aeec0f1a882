//! The playback contract the pipeline hands clips to.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::audio::PlayableAudio;
use crate::wav;

/// Identifies the avatar whose mouth follows the audio.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AvatarRef(String);

impl AvatarRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AvatarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plays audio on an avatar with mouth-sync.
///
/// The returned future resolving is the single completion signal: the
/// pipeline releases the clip and advances only after it resolves. An `Err`
/// is logged and treated as completion.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, audio: &PlayableAudio, avatar: &AvatarRef) -> anyhow::Result<()>;
}

/// Holds the playback slot for as long as the clip would take to play.
///
/// Useful where no audio device or renderer is attached (headless runs, the
/// CLI). WAV clips are timed from their header; anything else is estimated
/// from its size at [`PacedPlayer::FALLBACK_BYTES_PER_SEC`].
pub struct PacedPlayer {
    time_scale: f64,
}

impl PacedPlayer {
    /// 128 kbit/s, a common compressed-speech bitrate.
    pub const FALLBACK_BYTES_PER_SEC: f64 = 16_000.0;

    pub fn new() -> Self {
        Self { time_scale: 1.0 }
    }

    /// Scale every wait, e.g. `0.5` plays twice as fast. Negative values act as 0.
    pub fn with_time_scale(mut self, time_scale: f64) -> Self {
        self.time_scale = time_scale.max(0.0);
        self
    }

    pub fn clip_duration(&self, audio: &PlayableAudio) -> Duration {
        let natural = match wav::parse_header(audio.bytes()) {
            Some(header) => header.duration(),
            None => Duration::from_secs_f64(audio.len() as f64 / Self::FALLBACK_BYTES_PER_SEC),
        };
        natural.mul_f64(self.time_scale)
    }
}

impl Default for PacedPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioPlayer for PacedPlayer {
    async fn play(&self, audio: &PlayableAudio, avatar: &AvatarRef) -> anyhow::Result<()> {
        let duration = self.clip_duration(audio);
        info!(
            id = audio.id(),
            %avatar,
            duration_ms = duration.as_millis() as u64,
            "Speaking"
        );
        tokio::time::sleep(duration).await;
        debug!(id = audio.id(), "Clip finished");
        Ok(())
    }
}
