//! # Wire Record Decoder
//!
//! Decodes producer config and event records.

use bytes::Buf;

use super::protocol::*;
use crate::error::CodecError;

/// Decode a device config record
///
/// # Arguments
///
/// * `record` - Exactly [`CONFIG_RECORD_SIZE`] bytes as sent by the producer
///
/// # Returns
///
/// * `Result<DeviceConfig, CodecError>` - Decoded layout, or error if malformed
///
/// # Errors
///
/// Returns error if:
/// - The record is not exactly [`CONFIG_RECORD_SIZE`] bytes
/// - The declared button or axis count exceeds the table capacity
pub fn decode_config(record: &[u8]) -> Result<DeviceConfig, CodecError> {
    if record.len() != CONFIG_RECORD_SIZE {
        return Err(CodecError::ConfigSize {
            expected: CONFIG_RECORD_SIZE,
            actual: record.len(),
        });
    }

    let name = decode_name(&record[..NAME_LEN]);

    let mut counts = &record[NUM_BUTTONS_OFFSET..BUTTON_MAP_OFFSET];
    let num_buttons = counts.get_u16_le() as usize;
    let num_axes = counts.get_u16_le() as usize;

    if num_buttons > MAX_BUTTONS {
        return Err(CodecError::ConfigCapacity {
            field: "num_buttons",
            count: num_buttons,
            capacity: MAX_BUTTONS,
        });
    }
    if num_axes > MAX_AXES {
        return Err(CodecError::ConfigCapacity {
            field: "num_axes",
            count: num_axes,
            capacity: MAX_AXES,
        });
    }

    let mut buttons = &record[BUTTON_MAP_OFFSET..];
    let button_map = (0..num_buttons).map(|_| buttons.get_u16_le()).collect();

    let axis_map = record[AXIS_MAP_OFFSET..AXIS_MAP_OFFSET + num_axes].to_vec();

    Ok(DeviceConfig {
        name,
        button_map,
        axis_map,
    })
}

/// Decode one event record
///
/// # Arguments
///
/// * `record` - Exactly [`EVENT_RECORD_SIZE`] bytes
///
/// # Errors
///
/// Returns error if the record is not exactly 8 bytes long
///
/// # Examples
///
/// ```
/// use gamepad_bridge::wire::decoder::decode_event;
///
/// let event = decode_event(&[0x10, 0, 0, 0, 0x01, 0x00, 0x01, 0x02]).unwrap();
/// assert_eq!(event.timestamp, 16);
/// assert_eq!(event.value, 1);
/// assert_eq!(event.kind, 0x01);
/// assert_eq!(event.index, 2);
/// ```
pub fn decode_event(record: &[u8]) -> Result<InputEvent, CodecError> {
    if record.len() != EVENT_RECORD_SIZE {
        return Err(CodecError::EventSize {
            expected: EVENT_RECORD_SIZE,
            actual: record.len(),
        });
    }

    let mut buf = record;
    Ok(InputEvent {
        timestamp: buf.get_u32_le(),
        value: buf.get_i16_le(),
        kind: buf.get_u8(),
        index: buf.get_u8(),
    })
}

/// Name field: cut at the first NUL, lossy UTF-8, whitespace trimmed.
fn decode_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encoder::encode_config;

    fn standard_config() -> DeviceConfig {
        DeviceConfig {
            name: "Xbox 360 Controller (Vendor: 045e Product: 028e)".to_string(),
            button_map: vec![
                0x130, 0x131, 0x133, 0x134, 0x136, 0x137, 0x13a, 0x13b, 0x13c, 0x13d, 0x13e,
            ],
            axis_map: vec![0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x10, 0x11],
        }
    }

    #[test]
    fn test_decode_config_standard_layout() {
        let config = standard_config();
        let record = encode_config(&config).unwrap();
        assert_eq!(record.len(), CONFIG_RECORD_SIZE);

        let decoded = decode_config(&record).unwrap();
        assert_eq!(decoded, config);
        assert_eq!(decoded.num_buttons(), 11);
        assert_eq!(decoded.num_axes(), 8);
    }

    #[test]
    fn test_decode_config_reads_fixed_offsets() {
        let mut record = vec![0u8; CONFIG_RECORD_SIZE];
        record[..3].copy_from_slice(b"pad");
        record[256..258].copy_from_slice(&2u16.to_le_bytes());
        record[258..260].copy_from_slice(&1u16.to_le_bytes());
        record[260..262].copy_from_slice(&0x130u16.to_le_bytes());
        record[262..264].copy_from_slice(&0x13eu16.to_le_bytes());
        record[1284] = 0x10;

        let config = decode_config(&record).unwrap();
        assert_eq!(config.name, "pad");
        assert_eq!(config.button_map, vec![0x130, 0x13e]);
        assert_eq!(config.axis_map, vec![0x10]);
    }

    #[test]
    fn test_decode_config_wrong_size() {
        let result = decode_config(&[0u8; 1024]);
        assert_eq!(
            result,
            Err(CodecError::ConfigSize { expected: CONFIG_RECORD_SIZE, actual: 1024 })
        );

        assert!(decode_config(&[0u8; CONFIG_RECORD_SIZE + 1]).is_err());
    }

    #[test]
    fn test_decode_config_count_over_capacity() {
        let mut record = vec![0u8; CONFIG_RECORD_SIZE];
        record[256..258].copy_from_slice(&513u16.to_le_bytes());
        assert!(matches!(
            decode_config(&record),
            Err(CodecError::ConfigCapacity { field: "num_buttons", count: 513, .. })
        ));

        let mut record = vec![0u8; CONFIG_RECORD_SIZE];
        record[258..260].copy_from_slice(&65u16.to_le_bytes());
        assert!(matches!(
            decode_config(&record),
            Err(CodecError::ConfigCapacity { field: "num_axes", count: 65, .. })
        ));
    }

    #[test]
    fn test_decode_config_at_capacity() {
        let mut record = vec![0u8; CONFIG_RECORD_SIZE];
        record[256..258].copy_from_slice(&(MAX_BUTTONS as u16).to_le_bytes());
        record[258..260].copy_from_slice(&(MAX_AXES as u16).to_le_bytes());
        record[CONFIG_RECORD_SIZE - 1] = 0x3f;

        let config = decode_config(&record).unwrap();
        assert_eq!(config.num_buttons(), MAX_BUTTONS);
        assert_eq!(config.num_axes(), MAX_AXES);
        assert_eq!(config.axis_map[MAX_AXES - 1], 0x3f);
    }

    #[test]
    fn test_decode_name_trims_padding() {
        let mut field = [0u8; NAME_LEN];
        field[..9].copy_from_slice(b" Gamepad ");
        assert_eq!(decode_name(&field), "Gamepad");

        assert_eq!(decode_name(&[0u8; NAME_LEN]), "");
        assert_eq!(decode_name(&[b'a'; NAME_LEN]).len(), NAME_LEN);
    }

    #[test]
    fn test_decode_event_field_order() {
        // time=1000, value=-32767, kind=axis|init, index=7
        let record = [0xe8, 0x03, 0x00, 0x00, 0x01, 0x80, 0x82, 0x07];
        let event = decode_event(&record).unwrap();

        assert_eq!(event.timestamp, 1000);
        assert_eq!(event.value, -32767);
        assert_eq!(event.kind, 0x82);
        assert_eq!(event.index, 7);
        assert!(event.is_init());
    }

    #[test]
    fn test_decode_event_recovers_encoded_fields() {
        let samples = [
            InputEvent { timestamp: 0, value: 0, kind: KIND_SYNC, index: 0 },
            InputEvent { timestamp: u32::MAX, value: i16::MIN, kind: 0xff, index: 0xff },
            InputEvent { timestamp: 123_456, value: 32767, kind: KIND_AXIS, index: 5 },
            InputEvent { timestamp: 42, value: 1, kind: KIND_BUTTON | KIND_INIT_FLAG, index: 10 },
        ];
        for event in samples {
            assert_eq!(decode_event(&event.encode()).unwrap(), event);
        }
    }

    #[test]
    fn test_decode_event_wrong_size() {
        assert_eq!(
            decode_event(&[0u8; 5]),
            Err(CodecError::EventSize { expected: 8, actual: 5 })
        );
        assert!(decode_event(&[0u8; 9]).is_err());
        assert!(decode_event(&[]).is_err());
    }
}
