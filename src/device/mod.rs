//! # Virtual Device Module
//!
//! Kernel-level virtual input devices.
//!
//! This module handles:
//! - The [`VirtualDeviceController`] capability (create / inject / destroy)
//! - The uinput-backed implementation
//! - Device identity derived from the producer's name string
//! - Per-slot locking of a device handle

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::DeviceError;
use crate::input::mapper::KernelEvent;
use crate::wire::protocol::DeviceConfig;

pub mod identity;
pub mod uinput;

/// One virtual device handle, serialized by a lock scoped to its slot.
pub type DeviceSlot<C> = Arc<Mutex<C>>;

/// Wraps a controller in a slot lock
pub fn new_slot<C: VirtualDeviceController>(controller: C) -> DeviceSlot<C> {
    Arc::new(Mutex::new(controller))
}

/// Capability to materialize and drive one virtual input device.
///
/// A handle is either absent or fully created:
///
/// ```text
/// Absent --create--> Created --destroy--> Absent
/// ```
///
/// Failed injections do not change the state; only `destroy` leaves
/// `Created`.
#[cfg_attr(test, mockall::automock)]
pub trait VirtualDeviceController: Send + 'static {
    /// Declares capabilities from `config` and materializes the device.
    ///
    /// # Errors
    ///
    /// - `ControlUnavailable`: the control interface cannot be opened (fatal)
    /// - `ControlCall`: a declaration step failed; nothing stays registered
    /// - `AlreadyCreated`: the handle already holds a device
    fn create(&mut self, config: &DeviceConfig) -> Result<(), DeviceError>;

    /// Writes one event followed by a SYN_REPORT.
    ///
    /// A sync event is written on its own, exactly once.
    ///
    /// # Errors
    ///
    /// - `NotCreated`: the handle is absent
    /// - `Inject`: the kernel rejected the write
    fn inject(&mut self, event: KernelEvent) -> Result<(), DeviceError>;

    /// Tears the device down if it exists. No-op on an absent handle.
    fn destroy(&mut self);

    /// True between a successful `create` and the next `destroy`
    fn is_created(&self) -> bool;
}
