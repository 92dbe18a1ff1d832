//! Mute filter
//!
//! Classifies decoded events as silenced or passable based on a fixed
//! key range.

use crate::midi::{EventKind, MidiEvent};

/// Inclusive key interval whose NoteOn/NoteOff events are suppressed from
/// both thru-forwarding and recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MuteRange {
    pub low: u8,
    pub high: u8,
}

impl MuteRange {
    pub fn new(low: u8, high: u8) -> Self {
        Self { low, high }
    }

    /// True only for NoteOn/NoteOff whose key lies in the closed range.
    /// ControlChange, ProgramChange, and Unknown events are never silenced,
    /// whatever their data bytes hold.
    pub fn is_silent(&self, event: &MidiEvent) -> bool {
        if event.kind != EventKind::NoteOn && event.kind != EventKind::NoteOff {
            return false;
        }
        match event.key {
            Some(key) => key >= self.low && key <= self.high,
            None => false,
        }
    }
}

impl Default for MuteRange {
    fn default() -> Self {
        Self { low: 29, high: 35 }
    }
}
