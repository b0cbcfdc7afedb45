//! # Error Types
//!
//! Custom error types for Gamepad Bridge using `thiserror`.
//!
//! Errors are grouped by the layer that produces them: the wire codec, the
//! code mapper and the virtual device controller. [`BridgeError`] wraps all of
//! them and is what supervisors and the bridge propagate.

use std::path::PathBuf;

use thiserror::Error;

/// Wire codec errors (malformed producer records)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Config record has the wrong size
    #[error("malformed config record: expected {expected} bytes, got {actual}")]
    ConfigSize { expected: usize, actual: usize },

    /// Config record declares more entries than the wire format can carry
    #[error("malformed config record: {field} = {count} exceeds capacity {capacity}")]
    ConfigCapacity {
        field: &'static str,
        count: usize,
        capacity: usize,
    },

    /// Event record has the wrong size
    #[error("malformed event record: expected {expected} bytes, got {actual}")]
    EventSize { expected: usize, actual: usize },
}

/// Code mapper errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MapError {
    /// Button index outside `0..num_buttons`
    #[error("button index {index} out of range (device has {count} buttons)")]
    ButtonOutOfRange { index: u8, count: usize },

    /// Axis index outside `0..num_axes`
    #[error("axis index {index} out of range (device has {count} axes)")]
    AxisOutOfRange { index: u8, count: usize },

    /// Event kind is not sync, button or axis
    #[error("unknown event kind 0x{0:02x}")]
    UnknownKind(u8),
}

/// Virtual device controller errors
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The virtual-input control file cannot be opened at all
    #[error("cannot open input control interface {path}: {source}")]
    ControlUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A control call failed while building the device
    #[error("{request} failed: {source}")]
    ControlCall {
        request: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// `create` called on a handle that is already created
    #[error("virtual device already created")]
    AlreadyCreated,

    /// Injection attempted on an absent handle
    #[error("virtual device not created")]
    NotCreated,

    /// Writing an event record failed
    #[error("failed to inject event: {0}")]
    Inject(#[source] std::io::Error),
}

impl DeviceError {
    /// Returns true when the handle can no longer accept events.
    ///
    /// A lost device ends the connection epoch; other injection failures only
    /// drop the offending event.
    pub fn is_device_lost(&self) -> bool {
        match self {
            DeviceError::NotCreated => true,
            DeviceError::Inject(e) => matches!(e.raw_os_error(), Some(libc::ENODEV) | Some(libc::EBADF)),
            _ => false,
        }
    }
}

/// Main error type for Gamepad Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Wire format errors
    #[error("wire codec error: {0}")]
    Codec(#[from] CodecError),

    /// Logical to kernel code mapping errors
    #[error("mapping error: {0}")]
    Mapping(#[from] MapError),

    /// Virtual device errors
    #[error("virtual device error: {0}")]
    Device(#[from] DeviceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns true for errors that must terminate the process.
    ///
    /// Only an unusable input control interface is fatal; everything else is
    /// handled by skipping an event or retrying the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Device(DeviceError::ControlUnavailable { .. }))
    }
}

/// Result type alias for Gamepad Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
