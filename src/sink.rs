//! Output sink abstraction
//!
//! One trait between the event pipeline and whatever receives the events:
//! a real midir output device, or the console for hardware-free runs.

use anyhow::{Context, Result};
use midir::MidiOutputConnection;
use parking_lot::Mutex;
use tracing::info;

use crate::midi::{MidiEvent, RawEvent};

/// Destination for outgoing events.
///
/// `emit` is fire-and-forget: no acknowledgment, no backpressure. It must
/// not block or sleep, since it runs on the input callback context as well
/// as on the playback task; implementations serialize writes internally.
pub trait OutputSink: Send + Sync {
    fn emit(&self, raw: RawEvent) -> Result<()>;
}

/// midir-backed sink. The connection sits behind a mutex because both the
/// input callback and the playback task write to it; neither holds the lock
/// longer than one short-message send.
pub struct MidirOutputSink {
    conn: Mutex<MidiOutputConnection>,
}

impl MidirOutputSink {
    pub fn new(conn: MidiOutputConnection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }
}

impl OutputSink for MidirOutputSink {
    fn emit(&self, raw: RawEvent) -> Result<()> {
        let bytes = raw.to_bytes();
        self.conn
            .lock()
            .send(&bytes)
            .context("failed to send MIDI message")
    }
}

/// Console sink: logs each event instead of transmitting it. Useful for
/// exercising the pipeline without an output device attached.
pub struct ConsoleSink;

impl OutputSink for ConsoleSink {
    fn emit(&self, raw: RawEvent) -> Result<()> {
        info!("out: {}", MidiEvent::decode(raw));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::EventKind;

    #[test]
    fn console_sink_accepts_events() {
        let sink = ConsoleSink;
        let raw = RawEvent::pack(EventKind::NoteOn, 1, 60, 100);

        assert!(sink.emit(raw).is_ok());
    }
}
