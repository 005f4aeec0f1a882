//! HTTP gateway for the TTS pipeline.
//!
//! Sits between browser or pipeline clients and an upstream speech
//! synthesizer: `GET /say` synthesizes and keeps a temporary WAV on disk,
//! `POST /delete_tts` reclaims those files once they have been played.

pub mod files;
pub mod handlers;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod server;
pub mod state;
pub mod upstream;

pub use server::{router, start_gateway};
pub use state::GatewayState;
