//! Core types for the CAN audio reactor
//!
//! This module defines the values that flow between the update source, the
//! reactor and its collaborators: decoded signal updates, the positional
//! channels and playback categories, and the crate-wide error type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Timestamp type used throughout the reactor
pub type Timestamp = DateTime<Utc>;

/// Result type for reactor operations
pub type Result<T> = std::result::Result<T, ReactorError>;

/// Errors that can occur in the reactor and its adapters
#[derive(Debug, thiserror::Error)]
pub enum ReactorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("DSP transport error: {0}")]
    DspTransport(String),

    #[error("Playback pipeline error: {0}")]
    Playback(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Bus error: {0}")]
    Bus(String),
}

/// One decoded bus frame: signal name → integer value
///
/// Produced once per received frame. An update carrying no recognised
/// signal names is a silent no-op for the reactor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalUpdate {
    signals: BTreeMap<String, i64>,
}

impl SignalUpdate {
    /// Create an empty update
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: add a signal value
    pub fn with(mut self, name: impl Into<String>, value: i64) -> Self {
        self.insert(name, value);
        self
    }

    /// Set a signal value, replacing any earlier value for the same name
    pub fn insert(&mut self, name: impl Into<String>, value: i64) {
        self.signals.insert(name.into(), value);
    }

    /// Look up a signal value by name
    pub fn get(&self, name: &str) -> Option<i64> {
        self.signals.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    /// Iterate over (name, value) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.signals.iter().map(|(name, value)| (name.as_str(), *value))
    }
}

impl<S: Into<String>> FromIterator<(S, i64)> for SignalUpdate {
    fn from_iter<T: IntoIterator<Item = (S, i64)>>(iter: T) -> Self {
        let mut update = SignalUpdate::new();
        for (name, value) in iter {
            update.insert(name, value);
        }
        update
    }
}

/// Positional zone targeted by a warning or by notification muting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Channel {
    Left,
    Right,
    Center,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Left, Channel::Right, Channel::Center];

    /// Name used in sound resource identifiers and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Left => "LEFT",
            Channel::Right => "RIGHT",
            Channel::Center => "CENTER",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Channel::Left => 0,
            Channel::Right => 1,
            Channel::Center => 2,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback class, each with its own exclusivity slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Beep,
    Proximity,
    Traffic,
}

impl Category {
    /// A pure tone plays over whatever the notification path is doing
    pub fn is_pure_tone(&self) -> bool {
        matches!(self, Category::Beep)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Beep => write!(f, "Beep"),
            Category::Proximity => write!(f, "Proximity"),
            Category::Traffic => write!(f, "Traffic"),
        }
    }
}

/// Last observed vehicle power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VehiclePower {
    Off,
    On,
    #[default]
    Unknown,
}

impl VehiclePower {
    /// Map the raw `HU_VehiclePwr` value (0 = off, 2 = on)
    pub fn from_raw(value: i64) -> Self {
        match value {
            0 => VehiclePower::Off,
            2 => VehiclePower::On,
            _ => VehiclePower::Unknown,
        }
    }
}

impl fmt::Display for VehiclePower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VehiclePower::Off => write!(f, "OFF"),
            VehiclePower::On => write!(f, "ON"),
            VehiclePower::Unknown => write!(f, "UNKNOWN"),
        }
    }
}
