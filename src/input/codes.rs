//! # Kernel Input Codes
//!
//! Event types and codes used when talking to the input subsystem, plus the
//! default gamepad layout used by stable slots.
//!
//! ## Default layout
//!
//! | Index | Button | Axis |
//! |-------|--------|------|
//! | 0 | BTN_A (BTN_SOUTH) | ABS_X |
//! | 1 | BTN_B (BTN_EAST) | ABS_Y |
//! | 2 | BTN_X (BTN_NORTH) | ABS_Z |
//! | 3 | BTN_Y (BTN_WEST) | ABS_RX |
//! | 4 | BTN_TL | ABS_RY |
//! | 5 | BTN_TR | ABS_RZ |
//! | 6 | BTN_SELECT | ABS_HAT0X |
//! | 7 | BTN_START | ABS_HAT0Y |
//! | 8 | BTN_MODE | |
//! | 9 | BTN_THUMBL | |
//! | 10 | BTN_THUMBR | |

use evdev::{AbsoluteAxisType, EventType, Key, Synchronization};

use crate::wire::protocol::DeviceConfig;

/// Range metadata declared for one absolute axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsRange {
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
}

/// Synchronization event type
pub const EV_SYN: u16 = EventType::SYNCHRONIZATION.0;

/// Key/button event type
pub const EV_KEY: u16 = EventType::KEY.0;

/// Absolute axis event type
pub const EV_ABS: u16 = EventType::ABSOLUTE.0;

/// Synchronization code closing one atomic batch
pub const SYN_REPORT: u16 = Synchronization::SYN_REPORT.0;

/// First hat axis code (ABS_HAT0X)
pub const ABS_HAT_FIRST: u16 = AbsoluteAxisType::ABS_HAT0X.0;

/// Last hat axis code (ABS_HAT3Y)
pub const ABS_HAT_LAST: u16 = AbsoluteAxisType::ABS_HAT3Y.0;

/// Highest key code the kernel accepts (KEY_MAX)
pub const KEY_CODE_MAX: u16 = 0x2ff;

/// Highest absolute axis code the kernel accepts (ABS_MAX)
pub const ABS_CODE_MAX: u16 = 0x3f;

/// Analog axis range (symmetric around zero)
pub const ABS_LIMIT: i32 = 32767;

/// Range declared for analog axes
pub const ANALOG_RANGE: AbsRange = AbsRange {
    min: -ABS_LIMIT,
    max: ABS_LIMIT,
    fuzz: 16,
    flat: 128,
};

/// Range declared for hat (D-pad) axes
pub const HAT_RANGE: AbsRange = AbsRange {
    min: -1,
    max: 1,
    fuzz: 0,
    flat: 0,
};

/// Name of the stable-mode default device
pub const DEFAULT_DEVICE_NAME: &str = "Virtual Gamepad";

/// Returns true when `code` is a hat (D-pad) axis.
///
/// # Examples
///
/// ```
/// use gamepad_bridge::input::codes::is_hat_axis;
///
/// assert!(is_hat_axis(0x10));  // ABS_HAT0X
/// assert!(is_hat_axis(0x17));  // ABS_HAT3Y
/// assert!(!is_hat_axis(0x00)); // ABS_X
/// ```
pub fn is_hat_axis(code: u16) -> bool {
    (ABS_HAT_FIRST..=ABS_HAT_LAST).contains(&code)
}

/// Range metadata to declare for an absolute axis code
pub fn axis_range(code: u16) -> AbsRange {
    if is_hat_axis(code) {
        HAT_RANGE
    } else {
        ANALOG_RANGE
    }
}

/// Default button table (11 buttons, Xbox style)
pub fn default_button_map() -> Vec<u16> {
    [
        Key::BTN_SOUTH,
        Key::BTN_EAST,
        Key::BTN_NORTH,
        Key::BTN_WEST,
        Key::BTN_TL,
        Key::BTN_TR,
        Key::BTN_SELECT,
        Key::BTN_START,
        Key::BTN_MODE,
        Key::BTN_THUMBL,
        Key::BTN_THUMBR,
    ]
    .iter()
    .map(|key| key.code())
    .collect()
}

/// Default axis table (8 axes: two sticks, two triggers, one hat)
pub fn default_axis_map() -> Vec<u8> {
    [
        AbsoluteAxisType::ABS_X,
        AbsoluteAxisType::ABS_Y,
        AbsoluteAxisType::ABS_Z,
        AbsoluteAxisType::ABS_RX,
        AbsoluteAxisType::ABS_RY,
        AbsoluteAxisType::ABS_RZ,
        AbsoluteAxisType::ABS_HAT0X,
        AbsoluteAxisType::ABS_HAT0Y,
    ]
    .iter()
    .map(|axis| axis.0 as u8)
    .collect()
}

/// Synthetic config used by stable slots, which create their device before
/// any producer has connected.
pub fn default_device_config() -> DeviceConfig {
    DeviceConfig {
        name: DEFAULT_DEVICE_NAME.to_string(),
        button_map: default_button_map(),
        axis_map: default_axis_map(),
    }
}
