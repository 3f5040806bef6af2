//! Bit-level signal extraction

use super::database::{ByteOrder, SignalDefinition, ValueType};

/// Extract the raw (sign-extended) value of `signal` from frame data
///
/// Returns `None` when the signal does not fit inside `data`.
pub(crate) fn raw_value(data: &[u8], signal: &SignalDefinition) -> Option<i64> {
    let start_bit = signal.start_bit as usize;
    let length = signal.length as usize;
    if length == 0 || length > 64 {
        return None;
    }

    let raw = match signal.byte_order {
        ByteOrder::LittleEndian => extract_little_endian(data, start_bit, length)?,
        ByteOrder::BigEndian => extract_big_endian(data, start_bit, length)?,
    };

    Some(match signal.value_type {
        ValueType::Unsigned => raw as i64,
        ValueType::Signed => sign_extend(raw, length),
    })
}

/// Apply factor and offset, rounding to the nearest integer
pub(crate) fn physical_value(raw: i64, signal: &SignalDefinition) -> i64 {
    if signal.factor == 1.0 && signal.offset == 0.0 {
        return raw;
    }
    (signal.offset + signal.factor * raw as f64).round() as i64
}

/// Intel layout: start bit is the LSB, bits ascend through the frame
fn extract_little_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
    let mut result: u64 = 0;
    for i in 0..length {
        let bit_pos = start_bit + i;
        let byte = *data.get(bit_pos / 8)?;
        let bit = (byte >> (bit_pos % 8)) & 0x01;
        result |= (bit as u64) << i;
    }
    Some(result)
}

/// Motorola layout: start bit is the MSB, bits descend within a byte and
/// continue at bit 7 of the next byte
fn extract_big_endian(data: &[u8], start_bit: usize, length: usize) -> Option<u64> {
    let mut result: u64 = 0;
    let mut bit_pos = start_bit;
    for _ in 0..length {
        let byte = *data.get(bit_pos / 8)?;
        let bit_in_byte = bit_pos % 8;
        let bit = (byte >> bit_in_byte) & 0x01;
        result = (result << 1) | bit as u64;
        bit_pos = if bit_in_byte == 0 { bit_pos + 15 } else { bit_pos - 1 };
    }
    Some(result)
}

fn sign_extend(value: u64, bit_length: usize) -> i64 {
    if bit_length >= 64 {
        return value as i64;
    }
    let sign_bit = 1u64 << (bit_length - 1);
    if value & sign_bit != 0 {
        (value | (!0u64 << bit_length)) as i64
    } else {
        value as i64
    }
}
