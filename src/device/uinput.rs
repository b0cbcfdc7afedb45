//! # uinput Device Controller
//!
//! Materializes virtual gamepads through `/dev/uinput` with
//! `evdev::uinput::VirtualDeviceBuilder`.
//!
//! ## Creation sequence
//!
//! 1. Open the control file
//! 2. Declare a key for every code in the button map
//! 3. Declare an absolute axis (with range metadata) for every code in the
//!    axis map
//! 4. Set name and bus/vendor/product/version, then create the device
//!
//! If any step fails the builder is dropped, which closes the descriptor and
//! discards everything declared so far; nothing stays registered with the
//! kernel. Closing the descriptor of a created device tears it down as well.

use std::io;
use std::path::PathBuf;

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AbsoluteAxisType, AttributeSet, EventType, InputId, Key, UinputAbsSetup};
use tracing::{debug, info, warn};

use super::identity::parse_identity;
use super::VirtualDeviceController;
use crate::error::DeviceError;
use crate::input::codes::{axis_range, ABS_CODE_MAX, KEY_CODE_MAX};
use crate::input::mapper::KernelEvent;
use crate::wire::protocol::DeviceConfig;

/// uinput control file opened by the builder
pub const UINPUT_PATH: &str = "/dev/uinput";

/// Sink for event batches; each batch is terminated with one SYN_REPORT.
trait EventSink {
    fn emit(&mut self, batch: &[evdev::InputEvent]) -> io::Result<()>;
}

impl EventSink for VirtualDevice {
    fn emit(&mut self, batch: &[evdev::InputEvent]) -> io::Result<()> {
        VirtualDevice::emit(self, batch)
    }
}

/// Batch written for one kernel event, before the closing SYN_REPORT.
///
/// A sync event is the SYN_REPORT itself, so its batch is empty.
fn event_batch(event: KernelEvent) -> Vec<evdev::InputEvent> {
    if event.is_sync() {
        Vec::new()
    } else {
        vec![evdev::InputEvent::new(EventType(event.event_type), event.code, event.value)]
    }
}

fn emit_event(sink: &mut impl EventSink, event: KernelEvent) -> Result<(), DeviceError> {
    sink.emit(&event_batch(event)).map_err(DeviceError::Inject)
}

/// Axis declaration for one absolute axis code
fn abs_setup(code: u16) -> UinputAbsSetup {
    let range = axis_range(code);
    UinputAbsSetup::new(
        AbsoluteAxisType(code),
        AbsInfo::new(0, range.min, range.max, range.fuzz, range.flat, 0),
    )
}

/// Key capability set for a button map, skipping codes the kernel cannot hold
fn key_set(button_map: &[u16]) -> AttributeSet<Key> {
    let mut keys = AttributeSet::<Key>::new();
    for &code in button_map {
        if code <= KEY_CODE_MAX {
            keys.insert(Key::new(code));
        } else {
            warn!("Ignoring button code 0x{:x} above KEY_MAX", code);
        }
    }
    keys
}

/// Kernel virtual input device backed by `/dev/uinput`.
///
/// The handle is either absent (`device == None`) or fully created.
#[derive(Default)]
pub struct UinputController {
    device: Option<VirtualDevice>,
    name: String,
}

impl std::fmt::Debug for UinputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UinputController")
            .field("created", &self.device.is_some())
            .field("name", &self.name)
            .finish()
    }
}

impl UinputController {
    /// Creates an absent handle.
    ///
    /// Nothing is opened until [`create`](VirtualDeviceController::create).
    ///
    /// # Examples
    ///
    /// ```
    /// use gamepad_bridge::device::uinput::UinputController;
    /// use gamepad_bridge::device::VirtualDeviceController;
    ///
    /// let controller = UinputController::new();
    /// assert!(!controller.is_created());
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    fn build(name: &str, id: InputId, config: &DeviceConfig) -> Result<VirtualDevice, DeviceError> {
        let control_call = |request: &'static str| move |source: io::Error| DeviceError::ControlCall { request, source };

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(|source| DeviceError::ControlUnavailable {
                path: PathBuf::from(UINPUT_PATH),
                source,
            })?
            .name(name)
            .input_id(id)
            .with_keys(&key_set(&config.button_map))
            .map_err(control_call("UI_SET_KEYBIT"))?;

        for &code in &config.axis_map {
            let code = code as u16;
            if code > ABS_CODE_MAX {
                warn!("Ignoring axis code 0x{:x} above ABS_MAX", code);
                continue;
            }
            builder = builder
                .with_absolute_axis(&abs_setup(code))
                .map_err(control_call("UI_ABS_SETUP"))?;
        }

        builder.build().map_err(control_call("UI_DEV_CREATE"))
    }
}

impl VirtualDeviceController for UinputController {
    fn create(&mut self, config: &DeviceConfig) -> Result<(), DeviceError> {
        if self.device.is_some() {
            return Err(DeviceError::AlreadyCreated);
        }

        let (name, identity) = parse_identity(&config.name);
        let device = Self::build(&name, identity.into(), config)?;

        info!(
            "Created virtual device \"{}\" ({} buttons, {} axes, vendor 0x{:04x}, product 0x{:04x})",
            name,
            config.num_buttons(),
            config.num_axes(),
            identity.vendor,
            identity.product
        );
        self.device = Some(device);
        self.name = name;
        Ok(())
    }

    fn inject(&mut self, event: KernelEvent) -> Result<(), DeviceError> {
        let device = self.device.as_mut().ok_or(DeviceError::NotCreated)?;
        emit_event(device, event)
    }

    fn destroy(&mut self) {
        if self.device.take().is_some() {
            debug!("Destroyed virtual device \"{}\"", self.name);
        }
    }

    fn is_created(&self) -> bool {
        self.device.is_some()
    }
}
