//! Configuration management
//!
//! Loads the YAML configuration file; every field carries a default so a
//! missing or partial file still yields a runnable setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub midi: MidiConfig,
    #[serde(default)]
    pub looper: LooperConfig,
}

/// MIDI port configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MidiConfig {
    /// Input port pattern, case-insensitive substring match; empty picks
    /// the first available port
    #[serde(default)]
    pub input_port: String,
    /// Output port pattern; empty auto-pairs an output to the chosen input
    /// by device name
    #[serde(default)]
    pub output_port: String,
    /// Channel all outgoing events are remapped to (1..=16)
    #[serde(default = "default_output_channel")]
    pub output_channel: u8,
}

/// Mute range and loop trigger configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LooperConfig {
    /// NoteOn key cycling Idle → Recording → Playing → Idle
    #[serde(default = "default_trigger_key")]
    pub trigger_key: u8,
    /// Inclusive lower bound of the muted key range
    #[serde(default = "default_mute_low")]
    pub mute_low: u8,
    /// Inclusive upper bound of the muted key range
    #[serde(default = "default_mute_high")]
    pub mute_high: u8,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: String::new(),
            output_port: String::new(),
            output_channel: default_output_channel(),
        }
    }
}

impl Default for LooperConfig {
    fn default() -> Self {
        Self {
            trigger_key: default_trigger_key(),
            mute_low: default_mute_low(),
            mute_high: default_mute_high(),
        }
    }
}

fn default_output_channel() -> u8 {
    1
}

fn default_trigger_key() -> u8 {
    29
}

fn default_mute_low() -> u8 {
    29
}

fn default_mute_high() -> u8 {
    35
}

impl AppConfig {
    /// Load and parse a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: AppConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load the config, falling back to defaults when the file is absent.
    /// Parse errors still fail; a broken file should not be silently
    /// replaced by defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn full_config_parses() {
        let yaml = r#"
midi:
  input_port: "UM-One"
  output_port: "UM-One"
  output_channel: 2
looper:
  trigger_key: 36
  mute_low: 36
  mute_high: 40
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.midi.input_port, "UM-One");
        assert_eq!(config.midi.output_channel, 2);
        assert_eq!(config.looper.trigger_key, 36);
        assert_eq!(config.looper.mute_low, 36);
        assert_eq!(config.looper.mute_high, 40);
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let yaml = "midi:\n  input_port: \"Keystation\"\n";
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.midi.input_port, "Keystation");
        assert_eq!(config.midi.output_channel, 1);
        assert_eq!(config.looper.trigger_key, 29);
        assert_eq!(config.looper.mute_low, 29);
        assert_eq!(config.looper.mute_high, 35);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = AppConfig::load_or_default("/nonexistent/loopthru.yaml").unwrap();

        assert!(config.midi.input_port.is_empty());
        assert_eq!(config.looper.trigger_key, 29);
    }

    #[test]
    fn load_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "looper:\n  trigger_key: 48").unwrap();

        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.looper.trigger_key, 48);
    }

    #[test]
    fn broken_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "midi: [not a mapping").unwrap();

        assert!(AppConfig::load_or_default(file.path()).is_err());
    }
}
