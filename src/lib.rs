//! # Gamepad Bridge Library
//!
//! Replay remote virtual gamepads onto Linux kernel input devices.
//!
//! A producer writes gamepad config and event records onto one Unix domain
//! socket per device slot. This library dials those sockets, decodes the
//! records, maps logical button and axis indices to kernel input codes and
//! replays every event on a uinput virtual device, reconnecting whenever the
//! producer goes away.

pub mod bridge;
pub mod config;
pub mod device;
pub mod error;
pub mod input;
pub mod status;
pub mod supervisor;
pub mod wire;
