//! Frame decoding
//!
//! Turns raw CAN frames into [`SignalUpdate`](crate::types::SignalUpdate)s
//! using message and signal definitions loaded from a DBC file. Frames the
//! database does not describe are dropped silently.

pub mod database;
pub mod dbc;
mod extract;

pub use database::{
    ByteOrder, EXTENDED_ID_FLAG, MessageDefinition, MultiplexerInfo, SignalDatabase, SignalDefinition,
    ValueType,
};
