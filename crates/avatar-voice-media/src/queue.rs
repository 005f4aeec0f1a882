//! The TTS queue: the public enqueue surface and the task that drives a
//! [`PipelineMachine`].
//!
//! One driver task owns all pipeline state. Fetches, playbacks, and cleanup
//! requests run as their own tasks and report back over a channel, so state
//! changes are serialized without locks and each pipeline is independent.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use avatar_voice_core::config::Config;
use avatar_voice_core::error::VoiceError;

use crate::audio::ReadyAudio;
use crate::closer::CleanupClient;
use crate::fetcher::AudioFetcher;
use crate::machine::{Effect, PipelineEvent, PipelineMachine};
use crate::player::{AudioPlayer, AvatarRef};

/// Tuning for one queue.
#[derive(Debug, Clone)]
pub struct QueueOptions {
    pub target_depth: usize,
    pub max_retries: u32,
    pub avatar: AvatarRef,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            target_depth: 3,
            max_retries: 0,
            avatar: AvatarRef::new("default"),
        }
    }
}

impl QueueOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            target_depth: config.target_depth(),
            max_retries: config.max_retries(),
            avatar: AvatarRef::new(config.avatar()),
        }
    }
}

enum Command {
    Enqueue(String),
    Flush(oneshot::Sender<()>),
}

/// Handle to a running TTS queue. Cheap to clone.
///
/// When every handle is dropped the driver finishes what is already queued
/// and exits; [`TtsQueue::shutdown`] stops it immediately.
#[derive(Clone)]
pub struct TtsQueue {
    commands: mpsc::UnboundedSender<Command>,
    cancel: CancellationToken,
}

impl TtsQueue {
    /// Spawn the driver task for a new, empty pipeline.
    pub fn start(
        options: QueueOptions,
        fetcher: Arc<dyn AudioFetcher>,
        player: Arc<dyn AudioPlayer>,
        cleanup: Arc<dyn CleanupClient>,
    ) -> (Self, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let driver = Driver {
            machine: PipelineMachine::new(options.target_depth, options.max_retries),
            fetcher,
            player,
            cleanup,
            avatar: options.avatar,
            events: event_tx,
            cancel: cancel.clone(),
            waiters: Vec::new(),
            commands_closed: false,
        };

        let handle = tokio::spawn(async move {
            info!(
                avatar = %driver.avatar,
                target_depth = driver.machine.target_depth(),
                "TTS queue started"
            );
            driver.run(command_rx, event_rx).await;
            info!("TTS queue stopped");
        });

        (
            Self {
                commands: command_tx,
                cancel,
            },
            handle,
        )
    }

    /// Queue one utterance for speech. Never fails: empty text and a stopped
    /// queue are logged and ignored.
    pub fn enqueue(&self, text: impl Into<String>) {
        let text = text.into();
        if text.trim().is_empty() {
            let error = VoiceError::InvalidInput("utterance text is empty".into());
            warn!(%error, "Enqueue expects a non-empty string");
            return;
        }
        if self.commands.send(Command::Enqueue(text)).is_err() {
            warn!("TTS queue is stopped, dropping utterance");
        }
    }

    /// Wait until everything queued so far has played and its cleanup
    /// request has completed. Returns early if the queue stops.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Flush(tx)).is_err() {
            return;
        }
        let _ = rx.await;
    }

    /// Stop the driver and abandon in-flight work.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

struct Driver {
    machine: PipelineMachine,
    fetcher: Arc<dyn AudioFetcher>,
    player: Arc<dyn AudioPlayer>,
    cleanup: Arc<dyn CleanupClient>,
    avatar: AvatarRef,
    events: mpsc::UnboundedSender<PipelineEvent>,
    cancel: CancellationToken,
    waiters: Vec<oneshot::Sender<()>>,
    commands_closed: bool,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<PipelineEvent>,
    ) {
        let cancel = self.cancel.clone();
        loop {
            if self.commands_closed && self.machine.is_quiescent() {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("TTS queue cancelled");
                    break;
                }
                command = commands.recv(), if !self.commands_closed => match command {
                    Some(Command::Enqueue(text)) => self.dispatch(PipelineEvent::EnqueueText(text)),
                    Some(Command::Flush(waiter)) => self.add_waiter(waiter),
                    None => {
                        debug!("All queue handles dropped, finishing queued work");
                        self.commands_closed = true;
                    }
                },
                Some(event) = events.recv() => self.dispatch(event),
            }
        }
    }

    fn dispatch(&mut self, event: PipelineEvent) {
        for effect in self.machine.handle(event) {
            self.execute(effect);
        }

        #[cfg(feature = "metrics")]
        crate::metrics::record_ready_depth(self.machine.ready_len());

        if self.machine.is_quiescent() {
            for waiter in self.waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn add_waiter(&mut self, waiter: oneshot::Sender<()>) {
        if self.machine.is_quiescent() {
            let _ = waiter.send(());
        } else {
            self.waiters.push(waiter);
        }
    }

    fn execute(&self, effect: Effect) {
        let events = self.events.clone();
        match effect {
            Effect::Fetch(utterance) => {
                let fetcher = self.fetcher.clone();
                self.spawn(async move {
                    let started = Instant::now();
                    let text = utterance.text.clone();
                    let result = isolate(async move { fetcher.fetch(&text).await })
                        .await
                        .unwrap_or_else(|e| {
                            Err(VoiceError::Other(anyhow::anyhow!("fetcher panicked: {e}")))
                        });
                    let elapsed = started.elapsed();

                    #[cfg(feature = "metrics")]
                    crate::metrics::record_fetch(
                        if result.is_ok() { "ok" } else { "error" },
                        elapsed.as_secs_f64(),
                    );

                    let event = match result {
                        Ok(audio) => {
                            debug!(
                                text = %utterance.text,
                                elapsed_ms = elapsed.as_millis() as u64,
                                "Fetch succeeded"
                            );
                            PipelineEvent::FetchSucceeded(audio)
                        }
                        Err(error) => PipelineEvent::FetchFailed { utterance, error },
                    };
                    let _ = events.send(event);
                });
            }
            Effect::Play(ready) => {
                let player = self.player.clone();
                let avatar = self.avatar.clone();
                self.spawn(async move {
                    #[cfg(feature = "metrics")]
                    crate::metrics::record_playback();

                    let ReadyAudio { text, audio, .. } = ready;
                    let outcome = isolate(async move {
                        let result = player.play(&audio, &avatar).await;
                        audio.release();
                        result
                    })
                    .await;
                    // A panicking player drops the clip while unwinding, which releases it.
                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(%text, error = %e, "Playback failed"),
                        Err(e) => error!(%text, error = %e, "Player panicked"),
                    }
                    info!(%text, "Finished utterance");
                    let _ = events.send(PipelineEvent::PlaybackFinished);
                });
            }
            Effect::Cleanup(files) => {
                let cleanup = self.cleanup.clone();
                self.spawn(async move {
                    let batch = files.clone();
                    let result = isolate(async move { cleanup.delete(&batch).await })
                        .await
                        .unwrap_or_else(|e| {
                            Err(VoiceError::CleanupFailed(format!("cleanup client panicked: {e}")))
                        });
                    match result {
                        Ok(report) => {
                            #[cfg(feature = "metrics")]
                            crate::metrics::record_cleanup("ok");
                            info!(
                                requested = files.len(),
                                deleted = ?report.deleted,
                                failed = report.failed.len(),
                                "Cleanup complete"
                            );
                        }
                        Err(e) => {
                            #[cfg(feature = "metrics")]
                            crate::metrics::record_cleanup("error");
                            warn!(count = files.len(), error = %e, "Cleanup request failed");
                        }
                    }
                    let _ = events.send(PipelineEvent::CleanupFinished);
                });
            }
        }
    }

    /// Run an effect task that stops when the queue is cancelled.
    fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = task => {}
            }
        });
    }
}

/// Run a collaborator call on its own task so that a panic comes back as an
/// error and the completion event is still sent.
async fn isolate<T, F>(call: F) -> Result<T, tokio::task::JoinError>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(call).await
}
