//! Pipeline state machine.
//!
//! [`PipelineMachine`] owns the backlog, the ready buffer, the single-flight
//! flags, and the play log. It consumes [`PipelineEvent`]s and answers with
//! [`Effect`]s for the caller to run; it never performs I/O itself, so every
//! scheduling decision can be exercised without a runtime.
//!
//! Scheduling rules:
//! - At most one fetch is in flight. A generation pass is a chain of single
//!   fetches that continues while the ready buffer is below the target depth
//!   and the backlog (read live) is non-empty.
//! - At most one clip plays. Clips play strictly in the order they entered the
//!   ready buffer, which is the order their text was enqueued.
//! - When nothing is buffered, nothing is pending, and no fetch is in flight at
//!   the moment playback would advance, the play log is handed to cleanup in
//!   one batch and cleared.

use std::collections::VecDeque;

use tracing::{debug, error, info, warn};

use avatar_voice_core::error::VoiceError;

use crate::audio::{ReadyAudio, Utterance};

/// Observable phase of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelinePhase {
    Idle,
    Generating,
    Playing,
    GeneratingAndPlaying,
    /// Only a cleanup request is outstanding.
    Draining,
}

#[derive(Debug)]
pub enum PipelineEvent {
    EnqueueText(String),
    FetchSucceeded(ReadyAudio),
    FetchFailed {
        utterance: Utterance,
        error: VoiceError,
    },
    PlaybackFinished,
    DrainDetected,
    CleanupFinished,
}

/// Work the machine asks its driver to perform.
#[derive(Debug)]
pub enum Effect {
    /// Synthesize this utterance and report back with `FetchSucceeded`/`FetchFailed`.
    Fetch(Utterance),
    /// Play this clip, release it, then report `PlaybackFinished`.
    Play(ReadyAudio),
    /// Delete these server files, then report `CleanupFinished`.
    Cleanup(Vec<String>),
}

pub struct PipelineMachine {
    target_depth: usize,
    max_retries: u32,
    backlog: VecDeque<Utterance>,
    ready: VecDeque<ReadyAudio>,
    generating: bool,
    playing: bool,
    play_log: Vec<String>,
    cleanups_in_flight: usize,
}

impl PipelineMachine {
    /// `target_depth` is clamped to at least 1.
    pub fn new(target_depth: usize, max_retries: u32) -> Self {
        Self {
            target_depth: target_depth.max(1),
            max_retries,
            backlog: VecDeque::new(),
            ready: VecDeque::new(),
            generating: false,
            playing: false,
            play_log: Vec::new(),
            cleanups_in_flight: 0,
        }
    }

    /// Apply one event and return the effects it produced, in execution order.
    pub fn handle(&mut self, event: PipelineEvent) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.apply(event, &mut effects);
        effects
    }

    pub fn phase(&self) -> PipelinePhase {
        match (self.generating, self.playing) {
            (true, true) => PipelinePhase::GeneratingAndPlaying,
            (true, false) => PipelinePhase::Generating,
            (false, true) => PipelinePhase::Playing,
            (false, false) if self.cleanups_in_flight > 0 => PipelinePhase::Draining,
            (false, false) => PipelinePhase::Idle,
        }
    }

    pub fn target_depth(&self) -> usize {
        self.target_depth
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Display names played since the last drain.
    pub fn play_log(&self) -> &[String] {
        &self.play_log
    }

    /// Nothing pending, buffered, in flight, or playing.
    pub fn is_drained(&self) -> bool {
        self.backlog.is_empty() && self.ready.is_empty() && !self.generating && !self.playing
    }

    /// Drained and no cleanup request outstanding.
    pub fn is_quiescent(&self) -> bool {
        self.is_drained() && self.cleanups_in_flight == 0
    }

    fn apply(&mut self, event: PipelineEvent, effects: &mut Vec<Effect>) {
        match event {
            PipelineEvent::EnqueueText(text) => {
                if text.trim().is_empty() {
                    warn!("Ignoring empty utterance");
                    return;
                }
                self.backlog.push_back(Utterance::new(text));
                debug!(backlog = self.backlog.len(), "Utterance enqueued");

                self.refill(effects);
                if !self.playing && !self.ready.is_empty() {
                    self.play_next(effects);
                }
            }
            PipelineEvent::FetchSucceeded(audio) => {
                self.generating = false;
                debug!(
                    text = %audio.text,
                    name = audio.display_name(),
                    ready = self.ready.len() + 1,
                    "Audio buffered"
                );
                self.ready.push_back(audio);

                // Start right away so the next fetch overlaps this playback.
                if !self.playing {
                    self.play_next(effects);
                }
                self.refill(effects);
            }
            PipelineEvent::FetchFailed {
                mut utterance,
                error,
            } => {
                self.generating = false;
                if utterance.attempt < self.max_retries {
                    utterance.attempt += 1;
                    warn!(
                        text = %utterance.text,
                        attempt = utterance.attempt,
                        kind = error.kind(),
                        %error,
                        "Synthesis failed, retrying"
                    );
                    self.backlog.push_front(utterance);
                } else {
                    error!(
                        text = %utterance.text,
                        kind = error.kind(),
                        %error,
                        "Synthesis failed, skipping utterance"
                    );
                }

                self.refill(effects);
                if !self.playing {
                    self.play_next(effects);
                }
            }
            PipelineEvent::PlaybackFinished => {
                self.playing = false;
                self.play_next(effects);
                // After the pop, so a full buffer frees a slot for the next fetch.
                self.refill(effects);
            }
            PipelineEvent::DrainDetected => {
                if !self.is_drained() {
                    debug!(phase = ?self.phase(), "Drain check skipped, pipeline busy");
                    return;
                }
                if self.play_log.is_empty() {
                    debug!("Pipeline drained, nothing to clean up");
                    return;
                }
                let files = std::mem::take(&mut self.play_log);
                info!(count = files.len(), "Pipeline drained, requesting cleanup");
                self.cleanups_in_flight += 1;
                effects.push(Effect::Cleanup(files));
            }
            PipelineEvent::CleanupFinished => {
                self.cleanups_in_flight = self.cleanups_in_flight.saturating_sub(1);
            }
        }
    }

    /// Start the next fetch of a generation pass, unless one is in flight,
    /// the buffer is full, or there is nothing to fetch.
    fn refill(&mut self, effects: &mut Vec<Effect>) {
        if self.generating || self.ready.len() >= self.target_depth {
            return;
        }
        let Some(utterance) = self.backlog.pop_front() else {
            return;
        };
        self.generating = true;
        debug!(
            text = %utterance.text,
            attempt = utterance.attempt,
            ready = self.ready.len(),
            "Generating audio"
        );
        effects.push(Effect::Fetch(utterance));
    }

    fn play_next(&mut self, effects: &mut Vec<Effect>) {
        let Some(audio) = self.ready.pop_front() else {
            self.playing = false;
            if self.backlog.is_empty() && !self.generating {
                self.apply(PipelineEvent::DrainDetected, effects);
            } else {
                self.refill(effects);
            }
            return;
        };

        self.playing = true;
        info!(text = %audio.text, name = audio.display_name(), "Playing utterance");
        self.play_log.push(audio.display_name().to_string());
        effects.push(Effect::Play(audio));
    }
}
