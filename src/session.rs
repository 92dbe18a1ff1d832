//! Session state machine
//!
//! Ties trigger-key presses to transitions between idle, recording, and
//! playing, while every incoming event keeps flowing through the thru
//! router for live monitoring.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, info};

use crate::filter::MuteRange;
use crate::midi::{format_event_line, EventKind, MidiEvent, RawEvent};
use crate::player::{spawn_playback, PlaybackHandle};
use crate::recorder::Recorder;
use crate::router::ThruRouter;
use crate::sink::OutputSink;

/// Session lifecycle states cycled by the trigger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Recording,
    Playing,
}

/// Knobs for one session, resolved from config at startup.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    /// Channel every outgoing event is remapped to (1..=16)
    pub output_channel: u8,
    /// NoteOn key that cycles Idle → Recording → Playing → Idle
    pub trigger_key: u8,
    pub mute: MuteRange,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            output_channel: 1,
            trigger_key: 29,
            mute: MuteRange::default(),
        }
    }
}

/// Owns the event pipeline state: the thru router, the current recording,
/// and the handle of the live playback task. One instance per session, no
/// ambient globals; the input driver calls [`SessionController::on_event`]
/// once per message, strictly serialized.
pub struct SessionController {
    settings: SessionSettings,
    state: SessionState,
    router: ThruRouter,
    recorder: Recorder,
    playback: Option<PlaybackHandle>,
    sink: Arc<dyn OutputSink>,
    runtime: Handle,
}

impl SessionController {
    pub fn new(settings: SessionSettings, sink: Arc<dyn OutputSink>, runtime: Handle) -> Self {
        Self {
            settings,
            state: SessionState::Idle,
            router: ThruRouter::new(Arc::clone(&sink), settings.output_channel),
            recorder: Recorder::new(),
            playback: None,
            sink,
            runtime,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Handle one incoming event. Runs on the input delivery context and
    /// must return before the next event can be delivered: nothing in
    /// here blocks, sleeps, or waits on the playback task.
    pub fn on_event(&mut self, raw: RawEvent, at_ms: u64) {
        let event = MidiEvent::decode(raw);
        let silent = self.settings.mute.is_silent(&event);

        // live monitoring runs in every state; only muted keys are withheld
        let remapped = if silent {
            debug!("muted: {}", event);
            None
        } else {
            Some(self.router.forward(raw))
        };

        if event.kind == EventKind::NoteOn && event.key == Some(self.settings.trigger_key) {
            self.on_trigger(raw, at_ms);
        } else if self.state == SessionState::Recording {
            if let Some(remapped) = remapped {
                self.recorder.append(remapped, at_ms);
            }
        }

        info!("{}", format_event_line(self.marker(), &event, at_ms));
    }

    /// Detach the live playback handle, if any. The shutdown path cancels
    /// and awaits it outside the controller lock.
    pub fn take_playback(&mut self) -> Option<PlaybackHandle> {
        self.playback.take()
    }

    fn on_trigger(&mut self, raw: RawEvent, at_ms: u64) {
        match self.state {
            SessionState::Idle => {
                self.recorder.start();
                self.state = SessionState::Recording;
                debug!("recording started at {}ms", at_ms);
            }
            SessionState::Recording => {
                // the trigger press itself becomes the sentinel so the loop
                // duration covers the full phrase
                let sentinel = self.router.remap(raw);
                let buffer = self.recorder.stop(sentinel, at_ms);
                debug!("recording stopped, {} events captured", buffer.len() - 1);

                // a new session always invalidates the previous one first
                if let Some(previous) = self.playback.take() {
                    previous.cancel();
                }
                self.playback = Some(spawn_playback(
                    &self.runtime,
                    buffer,
                    Arc::clone(&self.sink),
                ));
                self.state = SessionState::Playing;
            }
            SessionState::Playing => {
                if let Some(playback) = self.playback.take() {
                    playback.cancel();
                }
                self.state = SessionState::Idle;
                debug!("playback cancelled at {}ms", at_ms);
            }
        }
    }

    fn marker(&self) -> &'static str {
        match self.state {
            SessionState::Idle => "",
            SessionState::Recording => "recording",
            SessionState::Playing => "playing",
        }
    }
}
