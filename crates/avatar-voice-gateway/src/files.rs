//! Temporary clip files under the gateway's TTS directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use avatar_voice_core::protocol::FailedFile;

/// Generate a unique clip filename, e.g. `tts_20250101_120000_1a2b3c4d.wav`.
pub fn output_filename() -> String {
    let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("tts_{ts}_{}.wav", &id[..8])
}

/// A bare filename that cannot escape the TTS directory.
pub fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
        && Path::new(name).file_name().is_some_and(|f| f == name)
}

/// Write a synthesized clip and return its path.
pub async fn store_clip(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(name);
    tokio::fs::write(&path, bytes).await?;
    debug!(path = %path.display(), size = bytes.len(), "Stored clip");
    Ok(path)
}

/// Delete each listed file from `dir`, returning (deleted, failed).
///
/// Entries that are not strings or not bare filenames are reported as
/// invalid and never touch the filesystem.
pub async fn delete_clips(dir: &Path, files: &[Value]) -> (Vec<String>, Vec<FailedFile>) {
    let mut deleted = Vec::new();
    let mut failed = Vec::new();

    for entry in files {
        let name = match entry.as_str() {
            Some(name) if is_safe_filename(name) => name,
            _ => {
                let file = entry
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| entry.to_string());
                warn!(%file, "Rejected cleanup entry");
                failed.push(FailedFile {
                    file,
                    error: "invalid filename".into(),
                });
                continue;
            }
        };

        match tokio::fs::remove_file(dir.join(name)).await {
            Ok(()) => deleted.push(name.to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => failed.push(FailedFile {
                file: name.to_string(),
                error: "File not found".into(),
            }),
            Err(e) => failed.push(FailedFile {
                file: name.to_string(),
                error: e.to_string(),
            }),
        }
    }

    (deleted, failed)
}
