//! HTTP handlers for `/say`, `/delete_tts`, and `/health`.

use std::sync::Arc;
#[cfg(feature = "metrics")]
use std::time::Instant;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use avatar_voice_core::protocol::{DeleteResponse, FILENAME_HEADER};

use crate::files;
use crate::state::GatewayState;

#[derive(Debug, Deserialize)]
pub struct SayParams {
    pub text: Option<String>,
}

/// `GET /say?text=...`: synthesize, keep a copy on disk, return the audio.
pub async fn say(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<SayParams>,
) -> Response {
    let Some(text) = params.text.filter(|t| !t.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "Please provide ?text=...").into_response();
    };

    #[cfg(feature = "metrics")]
    let started = Instant::now();

    let audio = match state.upstream.synthesize(&text).await {
        Ok(audio) => audio,
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Upstream synthesis failed");
            #[cfg(feature = "metrics")]
            crate::metrics::record_say("upstream_error", started.elapsed().as_secs_f64());
            return (StatusCode::INTERNAL_SERVER_ERROR, "TTS error").into_response();
        }
    };

    let filename = files::output_filename();
    if let Err(e) = files::store_clip(&state.tts_dir, &filename, &audio).await {
        error!(error = %e, dir = %state.tts_dir.display(), "Failed to store clip");
        #[cfg(feature = "metrics")]
        crate::metrics::record_say("storage_error", started.elapsed().as_secs_f64());
        return (StatusCode::INTERNAL_SERVER_ERROR, "TTS error").into_response();
    }

    info!(%filename, size = audio.len(), "Synthesized clip");
    #[cfg(feature = "metrics")]
    crate::metrics::record_say("ok", started.elapsed().as_secs_f64());

    let filename_header = match (
        header::HeaderName::try_from(FILENAME_HEADER),
        HeaderValue::from_str(&filename),
    ) {
        (Ok(name), Ok(value)) => (name, value),
        (Err(e), _) => {
            error!(error = %e, "Filename header name is invalid");
            return (StatusCode::INTERNAL_SERVER_ERROR, "TTS error").into_response();
        }
        (_, Err(e)) => {
            error!(error = %e, "Generated filename is not a valid header value");
            return (StatusCode::INTERNAL_SERVER_ERROR, "TTS error").into_response();
        }
    };

    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
            filename_header,
            (
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                HeaderValue::from_static(FILENAME_HEADER),
            ),
        ],
        audio,
    )
        .into_response()
}

/// `POST /delete_tts` with `{"files": [...]}`: remove played clips.
///
/// The body is parsed by hand so malformed requests get the documented
/// error messages rather than the extractor's rejection.
pub async fn delete_tts(State(state): State<Arc<GatewayState>>, body: Bytes) -> Response {
    if !tokio::fs::try_exists(&state.tts_dir).await.unwrap_or(false) {
        warn!(dir = %state.tts_dir.display(), "Cleanup requested but TTS directory is missing");
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "message": "TTS directory not found" })),
        )
            .into_response();
    }

    let files = match serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|mut v| v.get_mut("files").map(Value::take))
    {
        Some(files) => files,
        None => return bad_request("A 'files' list is required"),
    };
    let files = match files {
        Value::Array(files) if !files.is_empty() => files,
        _ => return bad_request("'files' must be a non-empty list"),
    };

    let (deleted, failed) = files::delete_clips(&state.tts_dir, &files).await;

    #[cfg(feature = "metrics")]
    crate::metrics::record_cleanup(deleted.len(), failed.len());

    let (status, code) = if failed.is_empty() {
        ("success", StatusCode::OK)
    } else {
        ("partial_failed", StatusCode::MULTI_STATUS)
    };
    info!(
        requested = files.len(),
        deleted = deleted.len(),
        failed = failed.len(),
        "Cleanup handled"
    );

    (
        code,
        Json(DeleteResponse {
            status: status.into(),
            deleted,
            failed,
            code: code.as_u16(),
        }),
    )
        .into_response()
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "status": "error", "message": message, "code": 400 })),
    )
        .into_response()
}

pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `GET /metrics` in Prometheus text format.
#[cfg(feature = "metrics")]
pub async fn metrics(State(state): State<Arc<GatewayState>>) -> Response {
    match state.metrics {
        Some(ref handle) => handle.render().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
