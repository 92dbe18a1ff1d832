//! MIDI device discovery and handles
//!
//! Enumerates ports, pairs an output device to the chosen input, and opens
//! the connections. All failures here are reported once at startup; there
//! is no reconnection.

use colored::*;
use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use thiserror::Error;
use tracing::{debug, info};

use crate::midi::RawEvent;

const CLIENT_NAME: &str = "loopthru";

/// Device boundary errors. All of them terminate startup; none can occur
/// once the run loop is entered.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("no MIDI input ports available")]
    NoInputs,
    #[error("input port '{0}' not found")]
    InputNotFound(String),
    #[error("no output device matching input '{0}' (set midi.output_port explicitly)")]
    NoMatchingOutput(String),
    #[error("output port '{0}' not found")]
    OutputNotFound(String),
    #[error("MIDI init failed: {0}")]
    Init(#[from] midir::InitError),
    #[error("failed to connect input port: {0}")]
    ConnectInput(String),
    #[error("failed to connect output port: {0}")]
    ConnectOutput(String),
}

/// Case-insensitive substring match, the Windows-friendly way port names
/// are looked up. Returns the index of the first match.
fn find_by_pattern(names: &[String], pattern: &str) -> Option<usize> {
    let pattern = pattern.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&pattern))
}

/// Lowercase a port name and drop direction words, so "Foo MIDI In" and
/// "Foo MIDI Out" compare equal.
fn normalize(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .filter(|word| !matches!(*word, "in" | "out" | "input" | "output"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Pair an output to the chosen input device by name. midir exposes no
/// manufacturer/product ids, so the match is by normalized name: exact
/// first, then shared-substring either way.
fn find_matching_output(names: &[String], input_name: &str) -> Option<usize> {
    let input = normalize(input_name);
    if let Some(i) = names.iter().position(|n| normalize(n) == input) {
        return Some(i);
    }
    names.iter().position(|n| {
        let n = normalize(n);
        n.contains(&input) || input.contains(&n)
    })
}

pub fn list_input_ports() -> Result<Vec<String>, PortError> {
    let midi_in = MidiInput::new(CLIENT_NAME)?;
    Ok(midi_in
        .ports()
        .iter()
        .filter_map(|port| midi_in.port_name(port).ok())
        .collect())
}

pub fn list_output_ports() -> Result<Vec<String>, PortError> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    Ok(midi_out
        .ports()
        .iter()
        .filter_map(|port| midi_out.port_name(port).ok())
        .collect())
}

/// Print all available ports (`--list-ports`).
pub fn print_ports() -> Result<(), PortError> {
    println!("\n{}", "=== MIDI Input Ports ===".bold().cyan());
    for (i, name) in list_input_ports()?.iter().enumerate() {
        println!("  {}: {}", i, name);
    }

    println!("\n{}", "=== MIDI Output Ports ===".bold().cyan());
    for (i, name) in list_output_ports()?.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    println!();
    Ok(())
}

/// Resolve the input port name before anything is opened: empty pattern
/// picks the first available port.
pub fn resolve_input(pattern: &str) -> Result<String, PortError> {
    let names = list_input_ports()?;
    if names.is_empty() {
        return Err(PortError::NoInputs);
    }
    if pattern.is_empty() {
        return Ok(names[0].clone());
    }
    find_by_pattern(&names, pattern)
        .map(|i| names[i].clone())
        .ok_or_else(|| PortError::InputNotFound(pattern.to_string()))
}

/// Open the output connection. An explicit `pattern` wins; otherwise the
/// output is auto-paired to `input_name`. Fails before opening anything
/// when no device matches.
pub fn open_output(
    pattern: &str,
    input_name: &str,
) -> Result<(MidiOutputConnection, String), PortError> {
    let midi_out = MidiOutput::new(CLIENT_NAME)?;
    let ports = midi_out.ports();
    // keep ports and names index-aligned: a port with an unreadable name
    // is not a candidate
    let candidates: Vec<(usize, String)> = ports
        .iter()
        .enumerate()
        .filter_map(|(i, port)| midi_out.port_name(port).ok().map(|name| (i, name)))
        .collect();
    let names: Vec<String> = candidates.iter().map(|(_, name)| name.clone()).collect();

    let index = if pattern.is_empty() {
        find_matching_output(&names, input_name)
            .ok_or_else(|| PortError::NoMatchingOutput(input_name.to_string()))?
    } else {
        find_by_pattern(&names, pattern)
            .ok_or_else(|| PortError::OutputNotFound(pattern.to_string()))?
    };

    let (port_index, name) = candidates[index].clone();
    debug!("pairing output '{}'", name);

    let conn = midi_out
        .connect(&ports[port_index], CLIENT_NAME)
        .map_err(|e| PortError::ConnectOutput(e.to_string()))?;
    Ok((conn, name))
}

/// Open the input connection and register the event handler.
///
/// The handler runs on the driver's delivery context, one invocation per
/// message in arrival order. Raw bytes are packed into a [`RawEvent`] and
/// midir's microsecond timestamps are rebased to milliseconds relative to
/// the first delivered message (stream start).
pub fn open_input<F>(
    name: &str,
    mut handler: F,
) -> Result<(MidiInputConnection<()>, String), PortError>
where
    F: FnMut(RawEvent, u64) + Send + 'static,
{
    let midi_in = MidiInput::new(CLIENT_NAME)?;
    let ports = midi_in.ports();
    let candidates: Vec<(usize, String)> = ports
        .iter()
        .enumerate()
        .filter_map(|(i, port)| midi_in.port_name(port).ok().map(|n| (i, n)))
        .collect();
    let names: Vec<String> = candidates.iter().map(|(_, n)| n.clone()).collect();

    let index = find_by_pattern(&names, name)
        .ok_or_else(|| PortError::InputNotFound(name.to_string()))?;
    let (port_index, port_name) = candidates[index].clone();
    let port = &ports[port_index];

    info!("opening input '{}'", port_name);

    let mut origin_us: Option<u64> = None;
    let conn = midi_in
        .connect(
            port,
            CLIENT_NAME,
            move |timestamp_us, data, _| {
                let origin = *origin_us.get_or_insert(timestamp_us);
                let at_ms = timestamp_us.saturating_sub(origin) / 1_000;
                if let Some(raw) = RawEvent::from_bytes(data) {
                    handler(raw, at_ms);
                } else {
                    debug!("dropped empty input message");
                }
            },
            (),
        )
        .map_err(|e| PortError::ConnectInput(e.to_string()))?;

    Ok((conn, port_name))
}
