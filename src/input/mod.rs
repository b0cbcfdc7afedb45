//! # Input Mapping Module
//!
//! Translation from the producer's logical button/axis indices to Linux
//! kernel input codes.
//!
//! This module handles:
//! - Kernel event type and code constants (via `evdev`)
//! - The default 11-button / 8-axis gamepad layout
//! - Per-connection code mapping with hat axis clamping

pub mod codes;
pub mod mapper;
