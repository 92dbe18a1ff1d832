//! Thru routing
//!
//! Forwards live events to the output sink with the channel remapped to the
//! configured output channel.

use std::sync::Arc;

use tracing::warn;

use crate::midi::RawEvent;
use crate::sink::OutputSink;

/// Live-through forwarding leg of the pipeline.
///
/// Runs on the input callback context: it never blocks or sleeps, and send
/// failures are logged rather than propagated into the driver callback.
pub struct ThruRouter {
    sink: Arc<dyn OutputSink>,
    output_channel: u8,
}

impl ThruRouter {
    pub fn new(sink: Arc<dyn OutputSink>, output_channel: u8) -> Self {
        Self {
            sink,
            output_channel,
        }
    }

    /// Remap to the output channel without emitting (sentinel capture and
    /// recording use the same remapping as the live path).
    pub fn remap(&self, raw: RawEvent) -> RawEvent {
        raw.with_channel(self.output_channel)
    }

    /// Remap and emit immediately. Returns the remapped word so the caller
    /// can record exactly what was sent.
    pub fn forward(&self, raw: RawEvent) -> RawEvent {
        let out = self.remap(raw);
        if let Err(e) = self.sink.emit(out) {
            warn!("thru send failed: {:#}", e);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::EventKind;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CapturingSink {
        sent: Mutex<Vec<RawEvent>>,
    }

    impl OutputSink for CapturingSink {
        fn emit(&self, raw: RawEvent) -> anyhow::Result<()> {
            self.sent.lock().push(raw);
            Ok(())
        }
    }

    #[test]
    fn forwards_with_the_output_channel() {
        let sink = Arc::new(CapturingSink::default());
        let router = ThruRouter::new(sink.clone(), 1);

        let raw = RawEvent::pack(EventKind::NoteOn, 7, 60, 100);
        let out = router.forward(raw);

        let sent = sink.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], out);
        assert_eq!(sent[0].channel(), 1);
        assert_eq!(sent[0].kind(), EventKind::NoteOn);
    }

    #[test]
    fn send_failure_does_not_propagate() {
        struct FailingSink;
        impl OutputSink for FailingSink {
            fn emit(&self, _raw: RawEvent) -> anyhow::Result<()> {
                anyhow::bail!("device gone")
            }
        }

        let router = ThruRouter::new(Arc::new(FailingSink), 1);
        // must not panic on the callback context
        router.forward(RawEvent::pack(EventKind::NoteOn, 1, 60, 100));
    }
}
