//! DBC file parser
//!
//! Parses Vector DBC files and converts them into the signal database format.

use super::database::{ByteOrder, MessageDefinition, MultiplexerInfo, SignalDefinition, ValueType};
use crate::types::{ReactorError, Result};
use std::path::Path;

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Loading CANBUS database file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|e| {
        ReactorError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc");

    parse_dbc(&bytes, source)
}

/// Parse DBC content
pub fn parse_dbc(bytes: &[u8], source: &str) -> Result<Vec<MessageDefinition>> {
    // Vector tools often write Windows-1252; re-encode as Latin-1 so the parser sees UTF-8
    let content = match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            log::warn!("DBC file {} is not UTF-8, trying Latin-1 encoding", source);
            bytes.iter().map(|&b| b as char).collect()
        }
    };

    let dbc = can_dbc::DBC::from_slice(content.as_bytes()).map_err(|e| {
        ReactorError::DbcParseError(format!("Failed to parse DBC file {}: {:?}", source, e))
    })?;

    let messages = dbc
        .messages()
        .iter()
        .map(convert_message)
        .collect::<Result<Vec<_>>>()?;

    log::info!("Parsed {} messages from {}", messages.len(), source);
    Ok(messages)
}

fn convert_message(dbc_msg: &can_dbc::Message) -> Result<MessageDefinition> {
    let multiplexer_signal = dbc_msg
        .signals()
        .iter()
        .find(|s| {
            matches!(
                s.multiplexer_indicator(),
                can_dbc::MultiplexIndicator::Multiplexor
                    | can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(_)
            )
        })
        .map(|s| s.name().to_string());

    let signals = dbc_msg
        .signals()
        .iter()
        .map(|s| convert_signal(s, multiplexer_signal.as_deref()))
        .collect::<Result<Vec<_>>>()?;

    Ok(MessageDefinition {
        // DBC IDs already carry the extended flag in bit 31
        id: dbc_msg.message_id().0,
        name: dbc_msg.message_name().to_string(),
        signals,
        multiplexer_signal,
    })
}

fn convert_signal(
    dbc_sig: &can_dbc::Signal,
    multiplexer_signal: Option<&str>,
) -> Result<SignalDefinition> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let multiplexer_info = match *dbc_sig.multiplexer_indicator() {
        can_dbc::MultiplexIndicator::MultiplexedSignal(switch_value)
        | can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(switch_value) => {
            if multiplexer_signal.is_none() {
                return Err(ReactorError::DbcParseError(format!(
                    "Multiplexed signal '{}' but no multiplexer found",
                    dbc_sig.name()
                )));
            }
            Some(MultiplexerInfo {
                multiplexer_values: vec![switch_value],
            })
        }
        _ => None,
    };

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: *dbc_sig.start_bit() as u16,
        length: *dbc_sig.signal_size() as u16,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        multiplexer_info,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{SignalDatabase, EXTENDED_ID_FLAG};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEAD_UNIT_DBC: &str = r#"
VERSION ""

NS_ :

BS_:

BU_: HU PAS AMP

BO_ 997 HU_Status: 8 HU
 SG_ HU_VolumeStatus : 0|6@1+ (1,0) [0|63] "" AMP
 SG_ HU_MuteStatus : 6|1@1+ (1,0) [0|1] "" AMP
 SG_ HU_VehiclePwr : 8|2@1+ (1,0) [0|3] "" AMP

BO_ 1056 PAS_Alarm: 8 PAS
 SG_ Pas_Spkr_Flh_Alarm : 0|4@1+ (1,0) [0|15] "" AMP
 SG_ Pas_Spkr_Frh_Alarm : 4|4@1+ (1,0) [0|15] "" AMP

BO_ 2147484672 Ext_Status: 8 HU
 SG_ C_InhibitR : 7|8@0+ (1,0) [0|255] "" AMP
"#;

    #[test]
    fn test_parse_dbc_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(HEAD_UNIT_DBC.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let messages = parse_dbc_file(temp_file.path()).unwrap();
        assert_eq!(messages.len(), 3);

        let status = &messages[0];
        assert_eq!(status.id, 997);
        assert_eq!(status.name, "HU_Status");
        assert_eq!(status.signals.len(), 3);
        assert_eq!(status.signals[0].length, 6);
        assert_eq!(status.signals[0].byte_order, ByteOrder::LittleEndian);

        assert_eq!(messages[2].id, 1024 | EXTENDED_ID_FLAG);
        assert_eq!(messages[2].signals[0].byte_order, ByteOrder::BigEndian);
    }

    #[test]
    fn test_decode_from_dbc() {
        let db = SignalDatabase::from_dbc_str(HEAD_UNIT_DBC).unwrap();
        assert_eq!(db.num_messages(), 3);
        assert_eq!(db.num_signals(), 6);

        let update = db.decode(997, &[0x14, 0x02, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(update.get("HU_VolumeStatus"), Some(20));
        assert_eq!(update.get("HU_MuteStatus"), Some(0));
        assert_eq!(update.get("HU_VehiclePwr"), Some(2));

        let update = db.decode(1056, &[0x31, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert_eq!(update.get("Pas_Spkr_Flh_Alarm"), Some(1));
        assert_eq!(update.get("Pas_Spkr_Frh_Alarm"), Some(3));

        let update = db
            .decode(1024 | EXTENDED_ID_FLAG, &[0x01, 0, 0, 0, 0, 0, 0, 0])
            .unwrap();
        assert_eq!(update.get("C_InhibitR"), Some(1));
        assert!(db.decode(1024, &[0x01, 0, 0, 0, 0, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_parse_multiplexed_signals() {
        let dbc_content = r#"
VERSION ""

NS_ :

BS_:

BU_: ECU1

BO_ 512 MultiplexedMsg: 8 ECU1
 SG_ Mode M : 0|8@1+ (1,0) [0|3] "" ECU1
 SG_ SignalA m0 : 8|16@1+ (1,0) [0|100] "%" ECU1
 SG_ SignalB m1 : 8|16@1+ (0.1,0) [0|1000] "mV" ECU1
"#;

        let messages = parse_dbc(dbc_content.as_bytes(), "muxed.dbc").unwrap();
        let msg = &messages[0];
        assert_eq!(msg.multiplexer_signal, Some("Mode".to_string()));

        let sig_a = msg.signals.iter().find(|s| s.name == "SignalA").unwrap();
        assert_eq!(
            sig_a.multiplexer_info.as_ref().unwrap().multiplexer_values,
            vec![0]
        );
    }

    #[test]
    fn test_missing_file_is_error() {
        let result = parse_dbc_file(Path::new("/nonexistent/bus.dbc"));
        assert!(matches!(result, Err(ReactorError::DbcParseError(_))));
    }
}
