//! MIDI message codec
//!
//! Decodes raw packed short-message words into structured events and
//! re-encodes them for transmission, plus the event log-line formatting.

use std::fmt;

/// A raw packed MIDI short message as delivered by the input driver.
///
/// Byte layout: status in the low byte (type nibble high, channel nibble
/// low), first data byte in bits 8..15, second data byte in bits 16..23.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent(pub u32);

/// MIDI message types handled by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOff,
    NoteOn,
    ControlChange,
    ProgramChange,
    Unknown,
}

impl RawEvent {
    /// Pack a structured message into a raw word.
    ///
    /// `Unknown` packs with an unassigned status nibble (0xA) so it decodes
    /// back to `Unknown`. Channel is 1-based and wraps modulo 16.
    pub fn pack(kind: EventKind, channel: u8, data1: u8, data2: u8) -> Self {
        let nibble: u32 = match kind {
            EventKind::NoteOff => 0x8,
            EventKind::NoteOn => 0x9,
            EventKind::ControlChange => 0xB,
            EventKind::ProgramChange => 0xC,
            EventKind::Unknown => 0xA,
        };
        let status = (nibble << 4) | (channel.wrapping_sub(1) & 0xF) as u32;
        RawEvent(status | ((data1 & 0x7F) as u32) << 8 | ((data2 & 0x7F) as u32) << 16)
    }

    /// Pack a wire byte slice into a raw word. Returns `None` for empty input.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let status = *data.first()? as u32;
        let d1 = data.get(1).copied().unwrap_or(0) as u32;
        let d2 = data.get(2).copied().unwrap_or(0) as u32;
        Some(RawEvent(status | d1 << 8 | d2 << 16))
    }

    /// Unpack into wire bytes with the correct length for the status
    /// (Program Change carries one data byte, the rest carry two).
    pub fn to_bytes(self) -> Vec<u8> {
        let status = (self.0 & 0xFF) as u8;
        let d1 = ((self.0 >> 8) & 0x7F) as u8;
        let d2 = ((self.0 >> 16) & 0x7F) as u8;
        match self.kind() {
            EventKind::ProgramChange => vec![status, d1],
            _ => vec![status, d1, d2],
        }
    }

    /// Channel of the message, exposed 1-based (1..=16).
    pub fn channel(self) -> u8 {
        ((self.0 & 0xF) as u8) + 1
    }

    /// Message type from the high nibble of the status byte.
    pub fn kind(self) -> EventKind {
        match (self.0 & 0xF0) >> 4 {
            0x8 => EventKind::NoteOff,
            0x9 => EventKind::NoteOn,
            0xB => EventKind::ControlChange,
            0xC => EventKind::ProgramChange,
            _ => EventKind::Unknown,
        }
    }

    /// Return a copy remapped to `channel` (1-based), leaving every other
    /// bit untouched. Out-of-range channels wrap modulo 16 by masking;
    /// this is deliberate, not validated.
    pub fn with_channel(self, channel: u8) -> Self {
        RawEvent((self.0 & !0xF) | (channel.wrapping_sub(1) & 0xF) as u32)
    }

    fn first_data_byte(self) -> u8 {
        ((self.0 >> 8) & 0x7F) as u8
    }

    fn second_data_byte(self) -> u8 {
        ((self.0 >> 16) & 0x7F) as u8
    }
}

/// A decoded MIDI event. Derived purely from a [`RawEvent`]; remapping the
/// channel goes through [`RawEvent::with_channel`] and produces a new word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent {
    /// 1-based channel (1..=16)
    pub channel: u8,
    pub kind: EventKind,
    /// Note key (NoteOn/NoteOff) or controller number (ControlChange)
    pub key: Option<u8>,
    /// Velocity (notes) or controller value (ControlChange)
    pub value: Option<u8>,
}

impl MidiEvent {
    /// Decode a raw packed word.
    pub fn decode(raw: RawEvent) -> Self {
        let kind = raw.kind();
        let key = match kind {
            EventKind::NoteOn | EventKind::NoteOff | EventKind::ControlChange => {
                Some(raw.first_data_byte())
            }
            _ => None,
        };
        let value = match kind {
            EventKind::NoteOn | EventKind::NoteOff | EventKind::ControlChange => {
                Some(raw.second_data_byte())
            }
            _ => None,
        };
        MidiEvent {
            channel: raw.channel(),
            kind,
            key,
            value,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EventKind::NoteOff => "Off",
            EventKind::NoteOn => "On",
            EventKind::ControlChange => "CCh",
            EventKind::ProgramChange => "PCh",
            EventKind::Unknown => "X",
        };
        f.write_str(label)
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ch:{}", self.kind, self.channel)?;
        if let Some(key) = self.key {
            write!(f, " k:{}", key)?;
        }
        if let Some(value) = self.value {
            write!(f, " v:{}", value)?;
        }
        Ok(())
    }
}

/// Column header matching [`format_event_line`], logged once at startup.
pub fn event_line_header() -> String {
    format!(
        "{:9} {:>2} | {:4} | {:>3} | {:>3} | ms",
        "", "Ch", "Type", "Key", "Vel"
    )
}

/// Format one processed event for the session log:
/// `[state-marker] channel | type | key | velocity | timestamp`.
///
/// `marker` is `"recording"`, `"playing"`, or `""` for idle passthrough.
/// Absent key/velocity render as blank fields, never a placeholder number.
pub fn format_event_line(marker: &str, event: &MidiEvent, at_ms: u64) -> String {
    let key = event.key.map(|k| k.to_string()).unwrap_or_default();
    let value = event.value.map(|v| v.to_string()).unwrap_or_default();
    format!(
        "{:9} {:>2} | {:4} | {:>3} | {:>3} | {}",
        marker,
        event.channel,
        event.kind.to_string(),
        key,
        value,
        at_ms
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_note_on() {
        // 0x90 = Note On ch 1, key 60, velocity 100
        let raw = RawEvent(0x90 | 60 << 8 | 100 << 16);
        let event = MidiEvent::decode(raw);

        assert_eq!(event.channel, 1);
        assert_eq!(event.kind, EventKind::NoteOn);
        assert_eq!(event.key, Some(60));
        assert_eq!(event.value, Some(100));
    }

    #[test]
    fn decode_note_off() {
        let raw = RawEvent::pack(EventKind::NoteOff, 3, 35, 0);
        let event = MidiEvent::decode(raw);

        assert_eq!(event.channel, 3);
        assert_eq!(event.kind, EventKind::NoteOff);
        assert_eq!(event.key, Some(35));
        assert_eq!(event.value, Some(0));
    }

    #[test]
    fn decode_control_change() {
        let raw = RawEvent::pack(EventKind::ControlChange, 16, 7, 127);
        let event = MidiEvent::decode(raw);

        assert_eq!(event.channel, 16);
        assert_eq!(event.kind, EventKind::ControlChange);
        assert_eq!(event.key, Some(7));
        assert_eq!(event.value, Some(127));
    }

    #[test]
    fn decode_program_change_has_no_key_or_value() {
        let raw = RawEvent::pack(EventKind::ProgramChange, 2, 12, 0);
        let event = MidiEvent::decode(raw);

        assert_eq!(event.kind, EventKind::ProgramChange);
        assert_eq!(event.key, None);
        assert_eq!(event.value, None);
    }

    #[test]
    fn decode_unknown_status_nibble() {
        // 0xA0 (poly pressure) is not handled and must classify as Unknown
        let raw = RawEvent(0xA0 | 60 << 8 | 50 << 16);
        let event = MidiEvent::decode(raw);

        assert_eq!(event.kind, EventKind::Unknown);
        assert_eq!(event.key, None);
        assert_eq!(event.value, None);
    }

    #[test]
    fn with_channel_touches_only_the_channel_nibble() {
        let raw = RawEvent::pack(EventKind::NoteOn, 5, 64, 99);
        let remapped = raw.with_channel(1);

        assert_eq!(remapped.channel(), 1);
        assert_eq!(remapped.0 & !0xF, raw.0 & !0xF);
    }

    #[test]
    fn with_channel_wraps_modulo_16() {
        let raw = RawEvent::pack(EventKind::NoteOn, 1, 0, 0);
        // 17 wraps to 1, 0 wraps to 16 (masking, not validation)
        assert_eq!(raw.with_channel(17).channel(), 1);
        assert_eq!(raw.with_channel(0).channel(), 16);
    }

    #[test]
    fn program_change_wire_form_is_two_bytes() {
        let raw = RawEvent::pack(EventKind::ProgramChange, 1, 12, 0);
        assert_eq!(raw.to_bytes(), vec![0xC0, 12]);

        let raw = RawEvent::pack(EventKind::NoteOn, 1, 60, 100);
        assert_eq!(raw.to_bytes(), vec![0x90, 60, 100]);
    }

    #[test]
    fn from_bytes_round_trips_wire_form() {
        let raw = RawEvent::from_bytes(&[0x92, 60, 100]).unwrap();
        assert_eq!(raw.channel(), 3);
        assert_eq!(raw.kind(), EventKind::NoteOn);
        assert_eq!(raw.to_bytes(), vec![0x92, 60, 100]);

        assert_eq!(RawEvent::from_bytes(&[]), None);
    }

    #[test]
    fn event_line_renders_blank_fields_for_absent_data() {
        let event = MidiEvent::decode(RawEvent::pack(EventKind::ProgramChange, 1, 5, 0));
        let line = format_event_line("", &event, 1234);

        assert!(line.contains("PCh"));
        assert!(line.ends_with("| 1234"));
        // no numeric placeholder for the absent key/velocity
        assert!(!line.contains("-1"));

        let event = MidiEvent::decode(RawEvent::pack(EventKind::NoteOn, 1, 60, 100));
        let line = format_event_line("recording", &event, 50);
        assert!(line.starts_with("recording"));
        assert!(line.contains(" 60 |"));
        assert!(line.contains("100 |"));
    }

    fn known_kind() -> impl Strategy<Value = EventKind> {
        prop_oneof![
            Just(EventKind::NoteOff),
            Just(EventKind::NoteOn),
            Just(EventKind::ControlChange),
            Just(EventKind::ProgramChange),
        ]
    }

    proptest! {
        #[test]
        fn pack_decode_round_trip(
            kind in known_kind(),
            channel in 1u8..=16,
            data1 in 0u8..=127,
            data2 in 0u8..=127,
        ) {
            let raw = RawEvent::pack(kind, channel, data1, data2);
            let event = MidiEvent::decode(raw);

            prop_assert_eq!(event.kind, kind);
            prop_assert_eq!(event.channel, channel);
            match kind {
                EventKind::ProgramChange => {
                    prop_assert_eq!(event.key, None);
                    prop_assert_eq!(event.value, None);
                }
                _ => {
                    prop_assert_eq!(event.key, Some(data1));
                    prop_assert_eq!(event.value, Some(data2));
                }
            }
        }

        #[test]
        fn remap_is_idempotent(
            kind in known_kind(),
            channel in 1u8..=16,
            target in 1u8..=16,
            data1 in 0u8..=127,
            data2 in 0u8..=127,
        ) {
            let raw = RawEvent::pack(kind, channel, data1, data2);
            let once = raw.with_channel(target);
            let twice = once.with_channel(target);

            prop_assert_eq!(once, twice);
            prop_assert_eq!(once.channel(), target);
        }
    }
}
