//! # Device Identity
//!
//! Derives the kernel-visible name and bus/vendor/product/version of a
//! virtual device from the name string the producer sends.
//!
//! Browsers report gamepads as e.g.
//! `"Xbox 360 Controller (STANDARD GAMEPAD Vendor: 045e Product: 028e)"`;
//! when the vendor/product pair is present it is reused so the host sees the
//! same identity as the client.

use std::sync::OnceLock;

use evdev::{BusType, InputId};
use regex::Regex;

use crate::input::codes::DEFAULT_DEVICE_NAME;

/// Longest device name accepted by the uinput builder, in bytes
pub const MAX_NAME_LEN: usize = 78;

/// Bus/vendor/product/version identity of a virtual device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub bustype: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl From<DeviceIdentity> for InputId {
    fn from(identity: DeviceIdentity) -> Self {
        InputId::new(
            BusType(identity.bustype),
            identity.vendor,
            identity.product,
            identity.version,
        )
    }
}

/// Generic gamepad vendor (Microsoft)
pub const DEFAULT_VENDOR: u16 = 0x045e;

/// Generic gamepad product (Xbox 360 pad)
pub const DEFAULT_PRODUCT: u16 = 0x028e;

/// Generic gamepad version
pub const DEFAULT_VERSION: u16 = 0x0114;

/// Identity used when the name carries no vendor/product
pub const DEFAULT_IDENTITY: DeviceIdentity = DeviceIdentity {
    bustype: BusType::BUS_USB.0,
    vendor: DEFAULT_VENDOR,
    product: DEFAULT_PRODUCT,
    version: DEFAULT_VERSION,
};

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(.*?)\s*(?:\(.*?Vendor:\s*(\w+)\s*Product:\s*(\w+)\))?$")
            .expect("static pattern is valid")
    })
}

/// Splits a producer name into a display name and a device identity.
///
/// # Arguments
///
/// * `raw` - Name as decoded from the config record
///
/// # Returns
///
/// * `(String, DeviceIdentity)` - Display name (never empty, at most
///   [`MAX_NAME_LEN`] bytes) and identity
///
/// # Examples
///
/// ```
/// use gamepad_bridge::device::identity::parse_identity;
///
/// let (name, id) = parse_identity("Pad (Vendor: 054c Product: 0ce6)");
/// assert_eq!(name, "Pad");
/// assert_eq!(id.vendor, 0x054c);
/// assert_eq!(id.product, 0x0ce6);
/// ```
pub fn parse_identity(raw: &str) -> (String, DeviceIdentity) {
    let raw = raw.trim_end_matches('\0').trim();
    let mut identity = DEFAULT_IDENTITY;
    let mut name = raw.to_string();

    if let Some(caps) = name_pattern().captures(raw) {
        if let Some(display) = caps.get(1) {
            name = display.as_str().trim().to_string();
        }

        let vendor = caps.get(2).and_then(|m| u16::from_str_radix(m.as_str(), 16).ok());
        let product = caps.get(3).and_then(|m| u16::from_str_radix(m.as_str(), 16).ok());
        if let (Some(vendor), Some(product)) = (vendor, product) {
            identity.vendor = vendor;
            identity.product = product;
        }
    }

    if name.is_empty() {
        name = DEFAULT_DEVICE_NAME.to_string();
    }
    truncate_name(&mut name);

    (name, identity)
}

/// Cuts `name` to [`MAX_NAME_LEN`] bytes on a character boundary.
fn truncate_name(name: &mut String) {
    if name.len() <= MAX_NAME_LEN {
        return;
    }
    let mut end = MAX_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name.truncate(end);
}
