//! Phrase recorder
//!
//! Accumulates timestamped events while recording; the finished buffer ends
//! with a sentinel event that defines the loop duration.

use tracing::warn;

use crate::midi::{MidiEvent, RawEvent};

/// One captured event, channel already remapped to the output channel.
/// Timestamps are stream-relative milliseconds, non-decreasing within one
/// recording.
#[derive(Debug, Clone, Copy)]
pub struct TimedEvent {
    pub raw: RawEvent,
    pub at_ms: u64,
}

impl TimedEvent {
    /// Decoded view, recomputed on demand (decode is a pure bit transform).
    pub fn event(&self) -> MidiEvent {
        MidiEvent::decode(self.raw)
    }
}

/// A finished recording: events in arrival order, the last entry being the
/// sentinel that marks the loop's total duration and is never replayed.
#[derive(Debug, Clone, Default)]
pub struct RecordingBuffer {
    events: Vec<TimedEvent>,
}

impl RecordingBuffer {
    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the sentinel (the loop end), if any event was captured.
    pub fn loop_end_ms(&self) -> Option<u64> {
        self.events.last().map(|event| event.at_ms)
    }
}

enum State {
    Idle,
    Recording(Vec<TimedEvent>),
}

/// Event recorder: `Idle` until [`Recorder::start`], then captures appended
/// events until [`Recorder::stop`] seals the buffer with a sentinel.
pub struct Recorder {
    state: State,
}

impl Recorder {
    pub fn new() -> Self {
        Self { state: State::Idle }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, State::Recording(_))
    }

    /// Begin a new recording, discarding any prior buffer.
    pub fn start(&mut self) {
        self.state = State::Recording(Vec::with_capacity(256));
    }

    /// Capture one event. The caller passes events already remapped to the
    /// output channel and already mute-filtered. Ignored with a warning
    /// outside the recording state.
    pub fn append(&mut self, raw: RawEvent, at_ms: u64) {
        match &mut self.state {
            State::Recording(events) => events.push(TimedEvent { raw, at_ms }),
            State::Idle => warn!("recorder append while idle, event dropped"),
        }
    }

    /// Seal the recording: the given event becomes the terminal sentinel
    /// (used purely for loop-duration timing), and the finished buffer is
    /// returned. An empty capture is valid and yields a zero-length loop.
    pub fn stop(&mut self, sentinel: RawEvent, at_ms: u64) -> RecordingBuffer {
        let mut events = match std::mem::replace(&mut self.state, State::Idle) {
            State::Recording(events) => events,
            State::Idle => {
                warn!("recorder stop while idle");
                Vec::new()
            }
        };
        events.push(TimedEvent {
            raw: sentinel,
            at_ms,
        });
        RecordingBuffer { events }
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
