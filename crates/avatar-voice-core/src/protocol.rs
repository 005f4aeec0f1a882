//! HTTP wire protocol shared by the TTS client and the gateway.
//!
//! - `GET /say?text=...` returns raw audio bytes and, optionally, the
//!   server-side filename in [`FILENAME_HEADER`].
//! - `POST /delete_tts` with a [`DeleteRequest`] reclaims those files and
//!   answers with a [`DeleteResponse`].

use serde::{Deserialize, Serialize};

/// Response header carrying the server-assigned filename of a synthesized clip.
pub const FILENAME_HEADER: &str = "X-TTS-Filename";

pub const SAY_PATH: &str = "/say";
pub const DELETE_PATH: &str = "/delete_tts";

/// Batch cleanup request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub files: Vec<String>,
}

/// Outcome of a batch cleanup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub deleted: Vec<String>,
    #[serde(default)]
    pub failed: Vec<FailedFile>,
    #[serde(default)]
    pub code: u16,
}

/// A file the server could not delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_request_shape() {
        let req = DeleteRequest {
            files: vec!["a.wav".into(), "b.wav".into()],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json, serde_json::json!({ "files": ["a.wav", "b.wav"] }));
    }

    #[test]
    fn test_delete_response_tolerates_missing_fields() {
        let resp: DeleteResponse = serde_json::from_str(r#"{"deleted": ["a.wav"]}"#).unwrap();
        assert_eq!(resp.deleted, vec!["a.wav".to_string()]);
        assert!(resp.failed.is_empty());
        assert!(resp.status.is_empty());
    }
}
