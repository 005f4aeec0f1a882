//! TTS pipeline: fetch speech for queued text, buffer a few clips ahead,
//! play them in order, and clean up server-side files once the queue drains.

pub mod audio;
pub mod chunker;
pub mod closer;
pub mod fetcher;
pub mod machine;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod player;
pub mod queue;
pub mod wav;

pub use audio::{AudioResources, PlayableAudio, ReadyAudio, Utterance};
pub use closer::{CleanupClient, HttpCleanupClient};
pub use fetcher::{AudioFetcher, HttpAudioFetcher};
pub use machine::{Effect, PipelineEvent, PipelineMachine, PipelinePhase};
pub use player::{AudioPlayer, AvatarRef, PacedPlayer};
pub use queue::{QueueOptions, TtsQueue};
