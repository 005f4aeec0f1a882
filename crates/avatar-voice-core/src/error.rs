use thiserror::Error;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Config error: {0}")]
    Config(String),

    /// Enqueue was called with empty or whitespace-only text.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The synthesis endpoint answered with a non-success status.
    #[error("Synthesis failed with status {status} for {text:?}")]
    SynthesisFailed { status: u16, text: String },

    /// The synthesis endpoint could not be reached, timed out, or the body was unreadable.
    #[error("Synthesis unavailable for {text:?}: {reason}")]
    SynthesisUnavailable { text: String, reason: String },

    #[error("Cleanup failed: {0}")]
    CleanupFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VoiceError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::InvalidInput(_) => "invalid_input",
            Self::SynthesisFailed { .. } => "synthesis_failed",
            Self::SynthesisUnavailable { .. } => "synthesis_unavailable",
            Self::CleanupFailed(_) => "cleanup_failed",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Other(_) => "other",
        }
    }
}

pub type Result<T> = std::result::Result<T, VoiceError>;
