//! Configuration management for Looper GW
//!
//! Handles loading, parsing and validation of the YAML configuration file.
//! Every field has a default, so an empty file (or no file) is a valid setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use crate::midi::parse_note;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub pedals: PedalConfig,
    pub osc: OscConfig,
    pub session: SessionConfig,
}

/// MIDI port configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct MidiConfig {
    /// Pedal board input port (substring match)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_port: Option<String>,
    /// Virtual output port the looper listens to for notes
    pub virtual_output: String,
    /// Port receiving LED and display CCs; stdout when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_output: Option<String>,
    /// Outbound MIDI channel (1-16)
    pub channel: u8,
    /// First note of the pedal layout, as a number or a note name
    pub base_note: NoteSpec,
    /// Octave number given to middle C (60) in note names
    pub octave_middle_c: i32,
}

/// Note given either as a MIDI number or a name like "E3"
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum NoteSpec {
    Number(i64),
    Name(String),
}

/// Controller numbers of the pedal board in I/O mode
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PedalConfig {
    pub press_cc: u8,
    pub release_cc: u8,
    pub led_on_cc: u8,
    pub led_off_cc: u8,
    pub display_tens_cc: u8,
    pub display_ones_cc: u8,
}

/// OSC endpoints of the looping engine
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct OscConfig {
    pub engine_host: String,
    pub receive_port: u16,
    pub send_port: u16,
    /// Pre-registered remote LED display
    #[serde(skip_serializing_if = "Option::is_none")]
    pub led_send_port: Option<u16>,
}

/// Session timing
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub tick_ms: u64,
    pub heartbeat_reset: i32,
    /// Counter value below which the session is declared lost
    pub heartbeat_loss: i32,
    /// Poll interval requested for per-loop state updates
    pub auto_update_ms: i32,
    pub modal_indicator_policy: ModalIndicatorPolicy,
}

/// How a shared modal indicator reacts when a loop leaves the modal state
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModalIndicatorPolicy {
    /// Turn the indicator off as soon as any loop leaves the state
    #[default]
    ClearOnExit,
    /// Keep it lit while at least one loop is still in the state
    RefCounted,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            input_port: None,
            virtual_output: default_virtual_output(),
            controller_output: None,
            channel: 1,
            base_note: NoteSpec::Number(64),
            octave_middle_c: 3,
        }
    }
}

impl Default for PedalConfig {
    fn default() -> Self {
        Self {
            press_cc: 104,
            release_cc: 105,
            led_on_cc: 106,
            led_off_cc: 107,
            display_tens_cc: 113,
            display_ones_cc: 114,
        }
    }
}

impl Default for OscConfig {
    fn default() -> Self {
        Self {
            engine_host: "127.0.0.1".to_string(),
            receive_port: 9000,
            send_port: 9951,
            led_send_port: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_ms: 200,
            heartbeat_reset: 5,
            heartbeat_loss: -5,
            auto_update_ms: 100,
            modal_indicator_policy: ModalIndicatorPolicy::ClearOnExit,
        }
    }
}

impl MidiConfig {
    /// Resolved base note number
    pub fn base_note(&self) -> Result<u8> {
        match &self.base_note {
            NoteSpec::Number(n) if (0..=127).contains(n) => Ok(*n as u8),
            NoteSpec::Number(n) => anyhow::bail!("base_note {} is out of range (0-127)", n),
            NoteSpec::Name(name) => parse_note(name, self.octave_middle_c)
                .with_context(|| format!("base_note '{}' is not a note name", name)),
        }
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the file if present, otherwise fall back to defaults
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate YAML text
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // serde_yaml reads an empty document as unit, not as an empty map
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.midi.channel) {
            anyhow::bail!("MIDI channel {} is invalid (must be 1-16)", self.midi.channel);
        }
        self.midi.base_note()?;

        if self.midi.virtual_output.is_empty() {
            anyhow::bail!("MIDI virtual_output cannot be empty");
        }

        let ccs = [
            ("press_cc", self.pedals.press_cc),
            ("release_cc", self.pedals.release_cc),
            ("led_on_cc", self.pedals.led_on_cc),
            ("led_off_cc", self.pedals.led_off_cc),
            ("display_tens_cc", self.pedals.display_tens_cc),
            ("display_ones_cc", self.pedals.display_ones_cc),
        ];
        for (name, cc) in ccs {
            if cc > 127 {
                anyhow::bail!("Pedal {} {} is invalid (must be 0-127)", name, cc);
            }
        }
        if self.pedals.press_cc == self.pedals.release_cc {
            anyhow::bail!("Pedal press_cc and release_cc must differ");
        }

        if self.osc.engine_host.is_empty() {
            anyhow::bail!("OSC engine_host cannot be empty");
        }
        for (name, port) in [
            ("receive_port", Some(self.osc.receive_port)),
            ("send_port", Some(self.osc.send_port)),
            ("led_send_port", self.osc.led_send_port),
        ] {
            if port == Some(0) {
                anyhow::bail!("OSC {} cannot be 0", name);
            }
        }

        if self.session.tick_ms == 0 {
            anyhow::bail!("Session tick_ms must be positive");
        }
        if self.session.heartbeat_reset <= 0 {
            anyhow::bail!("Session heartbeat_reset must be positive");
        }
        if self.session.heartbeat_loss >= 0 {
            anyhow::bail!("Session heartbeat_loss must be negative");
        }
        if self.session.auto_update_ms <= 0 {
            anyhow::bail!("Session auto_update_ms must be positive");
        }

        Ok(())
    }
}

// Default value functions
fn default_virtual_output() -> String {
    "loop4r_control_out".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = AppConfig::from_yaml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.midi.base_note().unwrap(), 64);
        assert_eq!(config.osc.receive_port, 9000);
        assert_eq!(config.osc.send_port, 9951);
        assert_eq!(config.session.tick_ms, 200);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
midi:
  input_port: "FCB1010"
  base_note: "C3"
osc:
  led_send_port: 9001
session:
  modal_indicator_policy: ref_counted
"#;
        let config = AppConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.midi.input_port.as_deref(), Some("FCB1010"));
        assert_eq!(config.midi.base_note().unwrap(), 60);
        assert_eq!(config.midi.channel, 1);
        assert_eq!(config.osc.led_send_port, Some(9001));
        assert_eq!(config.pedals.press_cc, 104);
        assert_eq!(
            config.session.modal_indicator_policy,
            ModalIndicatorPolicy::RefCounted
        );
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let err = AppConfig::from_yaml("midi:\n  channel: 17\n").unwrap_err();
        assert!(format!("{:#}", err).contains("channel 17"));
    }

    #[test]
    fn test_invalid_base_note_rejected() {
        assert!(AppConfig::from_yaml("midi:\n  base_note: 300\n").is_err());
        assert!(AppConfig::from_yaml("midi:\n  base_note: \"Q7\"\n").is_err());
    }

    #[test]
    fn test_identical_press_release_rejected() {
        let yaml = "pedals:\n  press_cc: 20\n  release_cc: 20\n";
        assert!(AppConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_positive_loss_threshold_rejected() {
        assert!(AppConfig::from_yaml("session:\n  heartbeat_loss: 3\n").is_err());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "osc:\n  receive_port: 9100\n  send_port: 9200").unwrap();

        let config = AppConfig::load(file.path()).await.unwrap();
        assert_eq!(config.osc.receive_port, 9100);
        assert_eq!(config.osc.send_port, 9200);
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");

        let config = AppConfig::load_or_default(&path).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(AppConfig::load(&path).await.is_err());
    }
}
