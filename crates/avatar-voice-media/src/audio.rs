//! Playable audio handles and the records that move through the pipeline.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tracing::trace;

/// Issues [`PlayableAudio`] handles and counts how many are still alive.
#[derive(Debug, Clone, Default)]
pub struct AudioResources {
    live: Arc<AtomicUsize>,
}

impl AudioResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap synthesized bytes in a handle that is released when dropped.
    pub fn acquire(&self, bytes: Bytes) -> PlayableAudio {
        self.live.fetch_add(1, Ordering::SeqCst);
        let id = format!("audio:{}", uuid::Uuid::new_v4().simple());
        trace!(%id, len = bytes.len(), "Playable audio acquired");
        PlayableAudio {
            id,
            bytes,
            live: self.live.clone(),
        }
    }

    /// Number of handles acquired and not yet released.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Exclusive handle to one synthesized clip.
///
/// Not `Clone`: the handle is released exactly once, when it is dropped or
/// passed to [`PlayableAudio::release`].
pub struct PlayableAudio {
    id: String,
    bytes: Bytes,
    live: Arc<AtomicUsize>,
}

impl PlayableAudio {
    /// Locally unique identifier, used as the display name when the server gave none.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn bytes(&self) -> &Bytes {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn release(self) {
        drop(self);
    }
}

impl Drop for PlayableAudio {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
        trace!(id = %self.id, "Playable audio released");
    }
}

impl fmt::Debug for PlayableAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayableAudio")
            .field("id", &self.id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Text waiting in the backlog for synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    /// Fetch attempts already spent on this text.
    pub attempt: u32,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attempt: 0,
        }
    }
}

/// Synthesized audio buffered for playback.
#[derive(Debug)]
pub struct ReadyAudio {
    pub text: String,
    pub audio: PlayableAudio,
    /// Server-side filename, when the endpoint reported one.
    pub filename: Option<String>,
}

impl ReadyAudio {
    /// Name recorded in the play log: the server filename, else the handle id.
    pub fn display_name(&self) -> &str {
        self.filename.as_deref().unwrap_or(self.audio.id())
    }
}
