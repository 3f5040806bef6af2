//! Signal database
//!
//! Message and signal definitions keyed by CAN ID, and the frame → update
//! decoding built on top of them.
//!
//! IDs follow the DBC convention: extended (29-bit) frames carry
//! [`EXTENDED_ID_FLAG`] in bit 31, so standard 0x400 and extended 0x400 are
//! different messages.

use super::extract;
use crate::types::{Result, SignalUpdate};
use std::collections::HashMap;
use std::path::Path;

/// Bit 31 of a message ID marks an extended frame
pub const EXTENDED_ID_FLAG: u32 = 0x8000_0000;

/// A CAN message definition
#[derive(Debug, Clone)]
pub struct MessageDefinition {
    /// CAN message ID, with [`EXTENDED_ID_FLAG`] set for extended frames
    pub id: u32,
    pub name: String,
    pub signals: Vec<SignalDefinition>,
    /// Multiplexer signal name (if multiplexed)
    pub multiplexer_signal: Option<String>,
}

/// A CAN signal definition
#[derive(Debug, Clone)]
pub struct SignalDefinition {
    pub name: String,
    /// Start bit in the CAN frame (LSB for Intel, MSB for Motorola)
    pub start_bit: u16,
    /// Length in bits
    pub length: u16,
    pub byte_order: ByteOrder,
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Multiplexer info (None if not multiplexed)
    pub multiplexer_info: Option<MultiplexerInfo>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Signed,
    Unsigned,
}

/// Multiplexer information for multiplexed signals
#[derive(Debug, Clone)]
pub struct MultiplexerInfo {
    /// Multiplexer value(s) for which this signal is present
    pub multiplexer_values: Vec<u64>,
}

/// Decodes raw frames using the loaded message definitions
#[derive(Debug, Default)]
pub struct SignalDatabase {
    messages: HashMap<u32, MessageDefinition>,
}

impl SignalDatabase {
    /// Create a new empty signal database
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every message from a DBC file
    pub fn from_dbc_file(path: &Path) -> Result<Self> {
        let mut db = Self::new();
        for message in super::dbc::parse_dbc_file(path)? {
            db.add_message(message);
        }
        Ok(db)
    }

    /// Load every message from DBC text
    pub fn from_dbc_str(content: &str) -> Result<Self> {
        let mut db = Self::new();
        for message in super::dbc::parse_dbc(content.as_bytes(), "<memory>")? {
            db.add_message(message);
        }
        Ok(db)
    }

    /// Add a message; a later definition for the same ID replaces the earlier one
    pub fn add_message(&mut self, message: MessageDefinition) {
        if let Some(old) = self.messages.insert(message.id, message) {
            log::warn!(
                "Duplicate definition for CAN ID 0x{:X} ({}), keeping the newer one",
                old.id,
                old.name
            );
        }
    }

    pub fn num_messages(&self) -> usize {
        self.messages.len()
    }

    pub fn num_signals(&self) -> usize {
        self.messages.values().map(|m| m.signals.len()).sum()
    }

    /// Decode a raw frame into a signal update
    ///
    /// `can_id` must carry [`EXTENDED_ID_FLAG`] for extended frames.
    /// Returns `None` for unknown IDs and for frames from which no signal
    /// could be extracted. Physical values are rounded to integers.
    pub fn decode(&self, can_id: u32, data: &[u8]) -> Option<SignalUpdate> {
        let message = self.messages.get(&can_id)?;

        let multiplexer_value = message.multiplexer_signal.as_ref().and_then(|mux_name| {
            message
                .signals
                .iter()
                .find(|s| &s.name == mux_name)
                .and_then(|s| extract::raw_value(data, s))
                .map(|raw| raw as u64)
        });

        let mut update = SignalUpdate::new();
        for signal in &message.signals {
            if let Some(ref mux) = signal.multiplexer_info {
                match multiplexer_value {
                    Some(value) if mux.multiplexer_values.contains(&value) => {}
                    _ => continue,
                }
            }
            match extract::raw_value(data, signal) {
                Some(raw) => update.insert(signal.name.clone(), extract::physical_value(raw, signal)),
                None => log::trace!(
                    "Signal '{}' does not fit in {} byte frame 0x{:X}",
                    signal.name,
                    data.len(),
                    can_id
                ),
            }
        }

        if update.is_empty() {
            None
        } else {
            Some(update)
        }
    }
}
