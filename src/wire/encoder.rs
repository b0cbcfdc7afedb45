//! # Wire Record Encoder
//!
//! Encodes producer records: the inverse of the decoder. The bridge itself
//! only reads these records; the encoders serve tests and producer-side
//! tooling.

use bytes::BufMut;

use super::protocol::*;
use crate::error::CodecError;

impl InputEvent {
    /// Encode this event as an 8-byte wire record.
    ///
    /// This is the exact inverse of [`decode_event`](super::decoder::decode_event).
    pub fn encode(&self) -> [u8; EVENT_RECORD_SIZE] {
        let mut record = [0u8; EVENT_RECORD_SIZE];
        let mut buf = &mut record[..];
        buf.put_u32_le(self.timestamp);
        buf.put_i16_le(self.value);
        buf.put_u8(self.kind);
        buf.put_u8(self.index);
        record
    }
}

/// Encode a device config record the way the producer does
///
/// # Arguments
///
/// * `config` - Device layout to encode
///
/// # Returns
///
/// * `Result<Vec<u8>, CodecError>` - [`CONFIG_RECORD_SIZE`] bytes
///
/// # Errors
///
/// Returns error if the maps exceed the table capacity
pub fn encode_config(config: &DeviceConfig) -> Result<Vec<u8>, CodecError> {
    if config.num_buttons() > MAX_BUTTONS {
        return Err(CodecError::ConfigCapacity {
            field: "num_buttons",
            count: config.num_buttons(),
            capacity: MAX_BUTTONS,
        });
    }
    if config.num_axes() > MAX_AXES {
        return Err(CodecError::ConfigCapacity {
            field: "num_axes",
            count: config.num_axes(),
            capacity: MAX_AXES,
        });
    }

    let mut record = vec![0u8; CONFIG_RECORD_SIZE];

    let name = config.name.as_bytes();
    let name_len = name.len().min(NAME_LEN);
    record[..name_len].copy_from_slice(&name[..name_len]);

    let mut counts = &mut record[NUM_BUTTONS_OFFSET..BUTTON_MAP_OFFSET];
    counts.put_u16_le(config.num_buttons() as u16);
    counts.put_u16_le(config.num_axes() as u16);

    let mut buttons = &mut record[BUTTON_MAP_OFFSET..AXIS_MAP_OFFSET];
    for &code in &config.button_map {
        buttons.put_u16_le(code);
    }

    record[AXIS_MAP_OFFSET..AXIS_MAP_OFFSET + config.num_axes()].copy_from_slice(&config.axis_map);

    Ok(record)
}
