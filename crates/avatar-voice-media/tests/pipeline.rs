//! Pipeline integration tests against a local mock TTS server.
//!
//! Run with: `cargo test -p avatar-voice-media --test pipeline`

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;

use avatar_voice_core::error::VoiceError;
use avatar_voice_core::protocol::{DeleteRequest, FILENAME_HEADER};
use avatar_voice_media::{
    AudioFetcher, AudioPlayer, AudioResources, AvatarRef, CleanupClient, HttpAudioFetcher,
    HttpCleanupClient, PlayableAudio, QueueOptions, TtsQueue,
};

#[derive(Default)]
struct MockTts {
    counter: AtomicUsize,
    /// filename -> text it was synthesized from
    files: Mutex<HashMap<String, String>>,
    delete_requests: Mutex<Vec<Vec<String>>>,
}

async fn say(
    State(tts): State<Arc<MockTts>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let text = params.get("text").cloned().unwrap_or_default();
    if text.is_empty() {
        return (StatusCode::BAD_REQUEST, HeaderMap::new(), Vec::new());
    }
    if text.contains("fail") {
        return (StatusCode::INTERNAL_SERVER_ERROR, HeaderMap::new(), b"TTS error".to_vec());
    }
    if text.contains("slow") {
        // Outlasts any client deadline used below and never registers a file.
        tokio::time::sleep(Duration::from_secs(10)).await;
        return (StatusCode::OK, HeaderMap::new(), text.into_bytes());
    }
    if text.contains("unnamed") {
        return (StatusCode::OK, HeaderMap::new(), text.into_bytes());
    }

    let n = tts.counter.fetch_add(1, Ordering::SeqCst);
    let filename = format!("tts_{n}.wav");
    tts.files
        .lock()
        .unwrap()
        .insert(filename.clone(), text.clone());

    let mut headers = HeaderMap::new();
    headers.insert(FILENAME_HEADER, HeaderValue::from_str(&filename).unwrap());
    (StatusCode::OK, headers, text.into_bytes())
}

async fn delete_tts(
    State(tts): State<Arc<MockTts>>,
    Json(req): Json<DeleteRequest>,
) -> impl IntoResponse {
    tts.delete_requests.lock().unwrap().push(req.files.clone());

    let mut files = tts.files.lock().unwrap();
    let mut deleted = Vec::new();
    let mut failed = Vec::new();
    for file in req.files {
        if files.remove(&file).is_some() {
            deleted.push(file);
        } else {
            failed.push(json!({ "file": file, "error": "File not found" }));
        }
    }

    let (status, code) = if failed.is_empty() {
        ("success", StatusCode::OK)
    } else {
        ("partial_failed", StatusCode::MULTI_STATUS)
    };
    (
        code,
        Json(json!({
            "status": status,
            "deleted": deleted,
            "failed": failed,
            "code": code.as_u16(),
        })),
    )
}

async fn start_mock_tts() -> (Arc<MockTts>, String) {
    let tts = Arc::new(MockTts::default());
    let app = Router::new()
        .route("/say", get(say))
        .route("/delete_tts", post(delete_tts))
        .with_state(tts.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    (tts, format!("http://{addr}"))
}

#[derive(Default)]
struct RecordingPlayer {
    played: Mutex<Vec<String>>,
}

#[async_trait]
impl AudioPlayer for RecordingPlayer {
    async fn play(&self, audio: &PlayableAudio, _avatar: &AvatarRef) -> anyhow::Result<()> {
        self.played
            .lock()
            .unwrap()
            .push(String::from_utf8_lossy(audio.bytes()).into_owned());
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(())
    }
}

struct Pipeline {
    queue: TtsQueue,
    resources: AudioResources,
    player: Arc<RecordingPlayer>,
}

fn start_pipeline(endpoint: &str) -> Pipeline {
    start_pipeline_with_timeout(endpoint, Duration::from_secs(5))
}

fn start_pipeline_with_timeout(endpoint: &str, timeout: Duration) -> Pipeline {
    let resources = AudioResources::new();
    let timeout = Some(timeout);
    let fetcher = Arc::new(HttpAudioFetcher::new(endpoint, timeout, resources.clone()).unwrap());
    let cleanup = Arc::new(HttpCleanupClient::new(endpoint, timeout).unwrap());
    let player = Arc::new(RecordingPlayer::default());

    let (queue, _handle) = TtsQueue::start(
        QueueOptions::default(),
        fetcher,
        player.clone(),
        cleanup,
    );
    Pipeline {
        queue,
        resources,
        player,
    }
}

async fn flush(queue: &TtsQueue) {
    tokio::time::timeout(Duration::from_secs(10), queue.flush())
        .await
        .expect("pipeline did not drain");
}

#[tokio::test]
async fn test_end_to_end_plays_and_cleans_up() {
    let (tts, endpoint) = start_mock_tts().await;
    let pipeline = start_pipeline(&endpoint);

    pipeline.queue.enqueue("Hello");
    pipeline.queue.enqueue("World");
    flush(&pipeline.queue).await;

    assert_eq!(*pipeline.player.played.lock().unwrap(), vec!["Hello", "World"]);
    assert_eq!(
        *tts.delete_requests.lock().unwrap(),
        vec![vec!["tts_0.wav".to_string(), "tts_1.wav".to_string()]]
    );
    assert!(tts.files.lock().unwrap().is_empty());
    assert_eq!(pipeline.resources.live(), 0);
}

#[tokio::test]
async fn test_end_to_end_skips_failed_synthesis() {
    let (tts, endpoint) = start_mock_tts().await;
    let pipeline = start_pipeline(&endpoint);

    for text in ["one", "this will fail", "three"] {
        pipeline.queue.enqueue(text);
    }
    flush(&pipeline.queue).await;

    assert_eq!(*pipeline.player.played.lock().unwrap(), vec!["one", "three"]);
    assert_eq!(tts.delete_requests.lock().unwrap().len(), 1);
    assert_eq!(tts.delete_requests.lock().unwrap()[0].len(), 2);
}

#[tokio::test]
async fn test_end_to_end_skips_synthesis_past_deadline() {
    let (tts, endpoint) = start_mock_tts().await;
    let pipeline = start_pipeline_with_timeout(&endpoint, Duration::from_millis(200));

    for text in ["one", "a slow one", "three"] {
        pipeline.queue.enqueue(text);
    }
    flush(&pipeline.queue).await;

    assert_eq!(*pipeline.player.played.lock().unwrap(), vec!["one", "three"]);
    assert_eq!(
        *tts.delete_requests.lock().unwrap(),
        vec![vec!["tts_0.wav".to_string(), "tts_1.wav".to_string()]]
    );
    assert_eq!(pipeline.resources.live(), 0);
}

#[tokio::test]
async fn test_fetcher_times_out_as_unavailable() {
    let (_tts, endpoint) = start_mock_tts().await;
    let fetcher = HttpAudioFetcher::new(
        &endpoint,
        Some(Duration::from_millis(200)),
        AudioResources::new(),
    )
    .unwrap();

    let err = fetcher.fetch("slow").await.unwrap_err();
    assert!(matches!(err, VoiceError::SynthesisUnavailable { .. }));
}

#[tokio::test]
async fn test_missing_filename_header_cleans_up_by_audio_id() {
    let (tts, endpoint) = start_mock_tts().await;
    let pipeline = start_pipeline(&endpoint);

    pipeline.queue.enqueue("named");
    pipeline.queue.enqueue("unnamed");
    flush(&pipeline.queue).await;

    assert_eq!(*pipeline.player.played.lock().unwrap(), vec!["named", "unnamed"]);
    let requests = tts.delete_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let batch = &requests[0];
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0], "tts_0.wav");
    assert!(batch[1].starts_with("audio:"), "fallback name was {:?}", batch[1]);
    // The server deleted the named file and reported the unknown one as failed.
    assert!(tts.files.lock().unwrap().is_empty());
    assert_eq!(pipeline.resources.live(), 0);
}

#[tokio::test]
async fn test_each_drain_sends_its_own_cleanup() {
    let (tts, endpoint) = start_mock_tts().await;
    let pipeline = start_pipeline(&endpoint);

    pipeline.queue.enqueue("first batch");
    flush(&pipeline.queue).await;
    pipeline.queue.enqueue("second batch");
    flush(&pipeline.queue).await;

    assert_eq!(
        *tts.delete_requests.lock().unwrap(),
        vec![vec!["tts_0.wav".to_string()], vec!["tts_1.wav".to_string()]]
    );
}

#[tokio::test]
async fn test_fetcher_reports_filename_and_status() {
    let (_tts, endpoint) = start_mock_tts().await;
    let resources = AudioResources::new();
    let fetcher = HttpAudioFetcher::new(&endpoint, None, resources.clone()).unwrap();

    let ready = fetcher.fetch("Grüße & more?").await.unwrap();
    assert_eq!(ready.filename.as_deref(), Some("tts_0.wav"));
    assert_eq!(ready.audio.bytes().as_ref(), "Grüße & more?".as_bytes());
    assert_eq!(resources.live(), 1);
    drop(ready);
    assert_eq!(resources.live(), 0);

    let err = fetcher.fetch("please fail").await.unwrap_err();
    assert!(matches!(err, VoiceError::SynthesisFailed { status: 500, .. }));
}

#[tokio::test]
async fn test_cleanup_partial_failure_is_a_response() {
    let (_tts, endpoint) = start_mock_tts().await;
    let client = HttpCleanupClient::new(&endpoint, None).unwrap();

    let report = client
        .delete(&["missing.wav".to_string()])
        .await
        .unwrap();
    assert_eq!(report.status, "partial_failed");
    assert_eq!(report.code, 207);
    assert_eq!(report.failed[0].file, "missing.wav");
    assert_eq!(report.failed[0].error, "File not found");
}
