//! `avatar-voice speak`: feed text through a TTS pipeline and wait for it to drain.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use avatar_voice_core::config::Config;
use avatar_voice_media::chunker::SentenceChunker;
use avatar_voice_media::{
    AudioResources, HttpAudioFetcher, HttpCleanupClient, PacedPlayer, QueueOptions, TtsQueue,
};

pub struct SpeakArgs {
    pub texts: Vec<String>,
    pub endpoint: Option<String>,
    pub depth: Option<usize>,
    pub sentences: bool,
}

/// Routes input into the queue, whole or split into sentences.
struct Feeder<'a> {
    queue: &'a TtsQueue,
    chunker: Option<SentenceChunker>,
}

impl Feeder<'_> {
    fn feed(&mut self, text: &str) {
        match self.chunker {
            Some(ref mut chunker) => {
                // Line breaks inside a paragraph are not sentence breaks.
                let delta = if text.trim().is_empty() {
                    "\n".to_string()
                } else {
                    format!("{text} ")
                };
                for sentence in chunker.push(&delta) {
                    self.queue.enqueue(sentence);
                }
            }
            None => {
                if !text.trim().is_empty() {
                    self.queue.enqueue(text);
                }
            }
        }
    }

    fn finish(&mut self) {
        if let Some(rest) = self.chunker.as_mut().and_then(SentenceChunker::finish) {
            self.queue.enqueue(rest);
        }
    }
}

pub async fn run(config: &Config, args: SpeakArgs) -> anyhow::Result<()> {
    let endpoint = args.endpoint.unwrap_or_else(|| config.tts_endpoint());
    let mut options = QueueOptions::from_config(config);
    if let Some(depth) = args.depth {
        options.target_depth = depth;
    }

    let resources = AudioResources::new();
    let fetcher = Arc::new(HttpAudioFetcher::new(
        &endpoint,
        config.request_timeout(),
        resources.clone(),
    )?);
    let cleanup = Arc::new(HttpCleanupClient::new(&endpoint, config.request_timeout())?);
    let player = Arc::new(PacedPlayer::new());

    info!(%endpoint, avatar = %options.avatar, "Speaking through TTS pipeline");
    let (queue, handle) = TtsQueue::start(options, fetcher, player, cleanup);

    let mut feeder = Feeder {
        queue: &queue,
        chunker: args.sentences.then(SentenceChunker::new),
    };
    if args.texts.is_empty() {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            feeder.feed(&line);
        }
    } else {
        for text in &args.texts {
            feeder.feed(text);
        }
    }
    feeder.finish();

    tokio::select! {
        _ = queue.flush() => {}
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, abandoning remaining utterances");
            queue.shutdown();
        }
    }

    drop(queue);
    handle.await?;

    if resources.live() > 0 {
        warn!(live = resources.live(), "Audio handles still held at exit");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use avatar_voice_core::error::Result;
    use avatar_voice_core::protocol::DeleteResponse;
    use avatar_voice_media::{
        AudioFetcher, AudioPlayer, AvatarRef, CleanupClient, PlayableAudio, ReadyAudio,
    };

    use super::*;

    struct EchoFetcher(AudioResources);

    #[async_trait]
    impl AudioFetcher for EchoFetcher {
        async fn fetch(&self, text: &str) -> Result<ReadyAudio> {
            Ok(ReadyAudio {
                text: text.to_string(),
                audio: self.0.acquire(text.as_bytes().to_vec().into()),
                filename: None,
            })
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    #[async_trait]
    impl AudioPlayer for Recorder {
        async fn play(&self, audio: &PlayableAudio, _avatar: &AvatarRef) -> anyhow::Result<()> {
            self.0
                .lock()
                .unwrap()
                .push(String::from_utf8_lossy(audio.bytes()).into_owned());
            Ok(())
        }
    }

    struct NoCleanup;

    #[async_trait]
    impl CleanupClient for NoCleanup {
        async fn delete(&self, _files: &[String]) -> Result<DeleteResponse> {
            Ok(DeleteResponse::default())
        }
    }

    async fn spoken(sentences: bool, input: &[&str]) -> Vec<String> {
        let player = Arc::new(Recorder::default());
        let (queue, _handle) = TtsQueue::start(
            QueueOptions::default(),
            Arc::new(EchoFetcher(AudioResources::new())),
            player.clone(),
            Arc::new(NoCleanup),
        );

        let mut feeder = Feeder {
            queue: &queue,
            chunker: sentences.then(SentenceChunker::new),
        };
        for line in input {
            feeder.feed(line);
        }
        feeder.finish();
        tokio::time::timeout(Duration::from_secs(5), queue.flush())
            .await
            .unwrap();

        let played = player.0.lock().unwrap().clone();
        played
    }

    #[tokio::test]
    async fn test_lines_are_utterances() {
        let played = spoken(false, &["Hello there.", "", "  ", "Second line"]).await;
        assert_eq!(played, vec!["Hello there.", "Second line"]);
    }

    #[tokio::test]
    async fn test_sentence_mode_rejoins_wrapped_lines() {
        let played = spoken(
            true,
            &["This sentence is", "wrapped. And this", "one ends here", "", "New paragraph"],
        )
        .await;
        assert_eq!(
            played,
            vec![
                "This sentence is wrapped.",
                "And this one ends here",
                "New paragraph"
            ]
        );
    }
}
