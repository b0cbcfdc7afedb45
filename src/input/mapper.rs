//! # Code Mapper Module
//!
//! Maps decoded wire events to kernel `(type, code, value)` triples using the
//! layout announced by the producer for the current connection.
//!
//! ## Rules
//!
//! | Wire kind | Kernel event | Notes |
//! |-----------|--------------|-------|
//! | sync (0x00) | EV_SYN / SYN_REPORT | injected alone |
//! | button (0x01) | EV_KEY / `button_map[index]` | index < num_buttons |
//! | axis (0x02) | EV_ABS / `axis_map[index]` | index < num_axes, hats clamped to -1/0/1 |
//!
//! The init flag (0x80) is ignored. Any other kind is an error.
//!
//! ## Usage
//!
//! ```
//! use gamepad_bridge::input::codes::{default_device_config, EV_KEY};
//! use gamepad_bridge::input::mapper::CodeMapper;
//! use gamepad_bridge::wire::protocol::InputEvent;
//!
//! let mapper = CodeMapper::new(default_device_config());
//! let press = InputEvent { timestamp: 0, value: 1, kind: 0x01, index: 0 };
//!
//! let kernel = mapper.map(&press).unwrap();
//! assert_eq!(kernel.event_type, EV_KEY);
//! assert_eq!(kernel.code, 0x130);
//! assert_eq!(kernel.value, 1);
//! ```

use super::codes::{is_hat_axis, EV_ABS, EV_KEY, EV_SYN, SYN_REPORT};
use crate::error::MapError;
use crate::wire::protocol::{DeviceConfig, EventKind, InputEvent};

/// One event ready for kernel injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelEvent {
    /// Kernel event type (EV_SYN, EV_KEY, EV_ABS)
    pub event_type: u16,
    /// Kernel event code
    pub code: u16,
    /// Event value
    pub value: i32,
}

impl KernelEvent {
    /// A SYN_REPORT marker
    pub const fn sync() -> Self {
        Self {
            event_type: EV_SYN,
            code: SYN_REPORT,
            value: 0,
        }
    }

    /// True for synchronization markers
    pub fn is_sync(&self) -> bool {
        self.event_type == EV_SYN
    }
}

/// Immutable logical-to-kernel mapping for one connection epoch.
///
/// Holds nothing but the [`DeviceConfig`] it was built from, so mapping one
/// event can never affect the next.
#[derive(Debug, Clone)]
pub struct CodeMapper {
    config: DeviceConfig,
}

impl CodeMapper {
    /// Builds a mapper from the producer's device layout.
    #[must_use]
    pub fn new(config: DeviceConfig) -> Self {
        Self { config }
    }

    /// The layout this mapper was built from
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Maps one wire event to a kernel event.
    ///
    /// # Arguments
    ///
    /// * `event` - Decoded wire event (init flag may be set)
    ///
    /// # Errors
    ///
    /// - `ButtonOutOfRange` / `AxisOutOfRange`: index beyond the declared count
    /// - `UnknownKind`: kind is not sync, button or axis
    pub fn map(&self, event: &InputEvent) -> Result<KernelEvent, MapError> {
        match EventKind::from_wire(event.kind) {
            Some(EventKind::Sync) => Ok(KernelEvent::sync()),
            Some(EventKind::Button) => self.map_button(event.index, event.value),
            Some(EventKind::Axis) => self.map_axis(event.index, event.value),
            None => Err(MapError::UnknownKind(event.masked_kind())),
        }
    }

    fn map_button(&self, index: u8, value: i16) -> Result<KernelEvent, MapError> {
        let code = self
            .config
            .button_map
            .get(index as usize)
            .copied()
            .ok_or(MapError::ButtonOutOfRange {
                index,
                count: self.config.num_buttons(),
            })?;

        Ok(KernelEvent {
            event_type: EV_KEY,
            code,
            value: value as i32,
        })
    }

    fn map_axis(&self, index: u8, value: i16) -> Result<KernelEvent, MapError> {
        let code = self
            .config
            .axis_map
            .get(index as usize)
            .map(|&code| code as u16)
            .ok_or(MapError::AxisOutOfRange {
                index,
                count: self.config.num_axes(),
            })?;

        // Hats are digital: forward only the direction
        let value = if is_hat_axis(code) {
            value.signum() as i32
        } else {
            value as i32
        };

        Ok(KernelEvent {
            event_type: EV_ABS,
            code,
            value,
        })
    }
}
