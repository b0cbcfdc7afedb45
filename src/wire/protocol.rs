//! # Wire Protocol Constants and Types
//!
//! Record layouts shared with the producer. The producer packs the config
//! record with native C alignment (`255s H H 512H 64B`), so a single padding
//! byte follows the name field.
//!
//! ## Config record
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 255 | device name, NUL padded |
//! | 255 | 1 | alignment padding |
//! | 256 | 2 | button count (u16 LE) |
//! | 258 | 2 | axis count (u16 LE) |
//! | 260 | 512 x 2 | button map (u16 LE each) |
//! | 1284 | 64 x 1 | axis map (u8 each) |
//!
//! ## Event record
//!
//! `time: u32 LE, value: i16 LE, kind: u8, index: u8`

/// Length of the NUL padded name field
pub const NAME_LEN: usize = 255;

/// Offset of the button count field
pub const NUM_BUTTONS_OFFSET: usize = 256;

/// Offset of the axis count field
pub const NUM_AXES_OFFSET: usize = 258;

/// Offset of the button map table
pub const BUTTON_MAP_OFFSET: usize = 260;

/// Width of one button map entry in bytes
pub const BUTTON_MAP_ENTRY_SIZE: usize = 2;

/// Maximum number of buttons the config record can carry
pub const MAX_BUTTONS: usize = 512;

/// Offset of the axis map table
pub const AXIS_MAP_OFFSET: usize = BUTTON_MAP_OFFSET + MAX_BUTTONS * BUTTON_MAP_ENTRY_SIZE;

/// Maximum number of axes the config record can carry
pub const MAX_AXES: usize = 64;

/// Total config record size, independent of the declared counts
pub const CONFIG_RECORD_SIZE: usize = AXIS_MAP_OFFSET + MAX_AXES;

/// Event record size
pub const EVENT_RECORD_SIZE: usize = 8;

/// Wire kind: synchronization marker
pub const KIND_SYNC: u8 = 0x00;

/// Wire kind: button
pub const KIND_BUTTON: u8 = 0x01;

/// Wire kind: axis
pub const KIND_AXIS: u8 = 0x02;

/// Replay/init flag, masked off before dispatch
pub const KIND_INIT_FLAG: u8 = 0x80;

/// Device layout announced by the producer at the start of a connection.
///
/// The maps are stored with exactly `num_buttons` / `num_axes` entries, so the
/// valid index ranges are the lengths of the vectors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Display name, trimmed of NUL padding
    pub name: String,

    /// Logical button index to kernel key code
    pub button_map: Vec<u16>,

    /// Logical axis index to kernel absolute axis code
    pub axis_map: Vec<u8>,
}

impl DeviceConfig {
    /// Number of buttons declared by the producer
    pub fn num_buttons(&self) -> usize {
        self.button_map.len()
    }

    /// Number of axes declared by the producer
    pub fn num_axes(&self) -> usize {
        self.axis_map.len()
    }
}

/// Event kind after the init flag has been masked off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Synchronization marker
    Sync,
    /// Button press or release
    Button,
    /// Axis motion
    Axis,
}

impl EventKind {
    /// Interprets a wire kind byte, ignoring the init flag.
    ///
    /// Returns `None` for kinds this bridge does not understand.
    ///
    /// # Examples
    ///
    /// ```
    /// use gamepad_bridge::wire::protocol::EventKind;
    ///
    /// assert_eq!(EventKind::from_wire(0x81), Some(EventKind::Button));
    /// assert_eq!(EventKind::from_wire(0x00), Some(EventKind::Sync));
    /// assert_eq!(EventKind::from_wire(0x04), None);
    /// ```
    pub fn from_wire(raw: u8) -> Option<Self> {
        match raw & !KIND_INIT_FLAG {
            KIND_SYNC => Some(EventKind::Sync),
            KIND_BUTTON => Some(EventKind::Button),
            KIND_AXIS => Some(EventKind::Axis),
            _ => None,
        }
    }
}

/// One decoded event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputEvent {
    /// Producer-side milliseconds; advisory only
    pub timestamp: u32,

    /// Button 0/1, or axis magnitude in -32767..=32767
    pub value: i16,

    /// Raw kind byte, init flag included
    pub kind: u8,

    /// Logical button or axis index
    pub index: u8,
}

impl InputEvent {
    /// True when the producer marked this event as initial-state replay
    pub fn is_init(&self) -> bool {
        self.kind & KIND_INIT_FLAG != 0
    }

    /// Kind byte with the init flag removed
    pub fn masked_kind(&self) -> u8 {
        self.kind & !KIND_INIT_FLAG
    }
}
