//! Reactor configuration types
//!
//! This module defines the settings the reactor needs once it is running.
//! Loading them from disk is the application's job; the reactor only
//! validates what it is given.

use crate::types::{Category, Channel, ReactorError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the signal reactor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactorConfig {
    /// Highest head-unit volume level (maps to 0 attenuation)
    pub max_vol: i64,

    /// Seconds the vehicle must stay powered off before shutdown
    pub veh_off_wait: u64,

    /// DSP inputs carrying the head-unit audio
    pub main_inputs: InputPair,

    /// DSP inputs carrying the notification tones
    pub notify_inputs: InputPair,

    /// Level (on the head-unit scale) applied to the notification inputs at start-up
    #[serde(default = "default_notify_level")]
    pub notify_level: i64,

    /// Level (on the head-unit scale) applied to the main inputs while in reverse
    #[serde(default = "default_reverse_level")]
    pub reverse_level: i64,

    /// Sound resource naming
    #[serde(default)]
    pub sounds: SoundConfig,
}

fn default_notify_level() -> i64 {
    20
}

fn default_reverse_level() -> i64 {
    5
}

/// Left/right DSP input indices for one audio path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPair {
    pub left: u8,
    pub right: u8,
}

impl InputPair {
    pub fn new(left: u8, right: u8) -> Self {
        Self { left, right }
    }

    /// Both inputs
    pub fn both(&self) -> Vec<u8> {
        vec![self.left, self.right]
    }

    /// The input(s) a channel addresses: one side, or both for center
    pub fn for_channel(&self, channel: Channel) -> Vec<u8> {
        match channel {
            Channel::Left => vec![self.left],
            Channel::Right => vec![self.right],
            Channel::Center => self.both(),
        }
    }
}

/// Naming convention for the sound resources of each category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundConfig {
    /// Directory the sound files live in (empty = names are used as-is)
    #[serde(default)]
    pub directory: PathBuf,

    #[serde(default = "default_beep")]
    pub beep: String,

    /// Prefix, followed by `{level}-{CHANNEL}`
    #[serde(default = "default_proximity")]
    pub proximity: String,

    /// Prefix, followed by `{CHANNEL}`
    #[serde(default = "default_traffic")]
    pub traffic: String,

    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_beep() -> String {
    "beep".to_string()
}

fn default_proximity() -> String {
    "prox".to_string()
}

fn default_traffic() -> String {
    "traffic".to_string()
}

fn default_extension() -> String {
    "flac".to_string()
}

impl Default for SoundConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            beep: default_beep(),
            proximity: default_proximity(),
            traffic: default_traffic(),
            extension: default_extension(),
        }
    }
}

impl SoundConfig {
    /// Resolve the resource identifier for a playback request
    ///
    /// The level only matters for proximity warnings and the channel is
    /// ignored for beeps.
    pub fn resource(&self, category: Category, channel: Channel, level: i64) -> PathBuf {
        let name = match category {
            Category::Beep => format!("{}.{}", self.beep, self.extension),
            Category::Proximity => {
                format!("{}{}-{}.{}", self.proximity, level, channel, self.extension)
            }
            Category::Traffic => format!("{}{}.{}", self.traffic, channel, self.extension),
        };
        self.directory.join(name)
    }
}

impl ReactorConfig {
    /// Create a configuration with default levels and sound names
    pub fn new(max_vol: i64, veh_off_wait: u64, main_inputs: InputPair, notify_inputs: InputPair) -> Self {
        Self {
            max_vol,
            veh_off_wait,
            main_inputs,
            notify_inputs,
            notify_level: default_notify_level(),
            reverse_level: default_reverse_level(),
            sounds: SoundConfig::default(),
        }
    }

    /// Builder method: set the start-up notification level
    pub fn with_notify_level(mut self, level: i64) -> Self {
        self.notify_level = level;
        self
    }

    /// Builder method: set the level applied while reversing
    pub fn with_reverse_level(mut self, level: i64) -> Self {
        self.reverse_level = level;
        self
    }

    /// Builder method: set the sound naming convention
    pub fn with_sounds(mut self, sounds: SoundConfig) -> Self {
        self.sounds = sounds;
        self
    }

    /// Check the settings the reactor relies on
    pub fn validate(&self) -> Result<()> {
        if self.max_vol <= 0 {
            return Err(ReactorError::InvalidConfig(format!(
                "max_vol must be greater than 0, got {}",
                self.max_vol
            )));
        }
        if self.veh_off_wait == 0 {
            return Err(ReactorError::InvalidConfig(
                "veh_off_wait must be at least 1 second".to_string(),
            ));
        }
        for (name, level) in [
            ("notify_level", self.notify_level),
            ("reverse_level", self.reverse_level),
        ] {
            if !(0..=self.max_vol).contains(&level) {
                return Err(ReactorError::InvalidConfig(format!(
                    "{} must be within 0..={}, got {}",
                    name, self.max_vol, level
                )));
            }
        }
        if self.sounds.extension.is_empty() {
            return Err(ReactorError::InvalidConfig(
                "sound file extension must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReactorConfig {
        ReactorConfig::new(30, 60, InputPair::new(1, 2), InputPair::new(3, 4))
    }

    #[test]
    fn test_valid_config() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_rejects_non_positive_max_vol() {
        let mut cfg = config();
        cfg.max_vol = 0;
        assert!(matches!(cfg.validate(), Err(ReactorError::InvalidConfig(_))));
        cfg.max_vol = -5;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_level_above_max() {
        let cfg = config().with_reverse_level(31);
        assert!(cfg.validate().is_err());
        let cfg = config().with_notify_level(-1);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_input_pair_for_channel() {
        let pair = InputPair::new(3, 4);
        assert_eq!(pair.for_channel(Channel::Left), vec![3]);
        assert_eq!(pair.for_channel(Channel::Right), vec![4]);
        assert_eq!(pair.for_channel(Channel::Center), vec![3, 4]);
    }

    #[test]
    fn test_sound_resource_naming() {
        let sounds = SoundConfig {
            directory: PathBuf::from("/opt/sounds"),
            ..SoundConfig::default()
        };
        assert_eq!(
            sounds.resource(Category::Beep, Channel::Left, 9),
            PathBuf::from("/opt/sounds/beep.flac")
        );
        assert_eq!(
            sounds.resource(Category::Proximity, Channel::Right, 3),
            PathBuf::from("/opt/sounds/prox3-RIGHT.flac")
        );
        assert_eq!(
            sounds.resource(Category::Traffic, Channel::Left, 0),
            PathBuf::from("/opt/sounds/trafficLEFT.flac")
        );
    }

    #[test]
    fn test_config_deserialization_defaults() {
        let json = r#"{
            "max_vol": 30,
            "veh_off_wait": 120,
            "main_inputs": {"left": 0, "right": 1},
            "notify_inputs": {"left": 2, "right": 3}
        }"#;
        let cfg: ReactorConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.notify_level, 20);
        assert_eq!(cfg.reverse_level, 5);
        assert_eq!(cfg.sounds.extension, "flac");
    }
}
