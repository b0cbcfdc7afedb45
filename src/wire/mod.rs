//! # Wire Protocol Module
//!
//! Byte-exact codec for the records exchanged with the gamepad producer.
//!
//! This module handles:
//! - Decoding the fixed-size device config record (once per connection)
//! - Decoding the 8-byte event records (repeated)
//! - Encoding both records, for tests and producer-side tooling
//!
//! Everything here is pure: no I/O and no state.

pub mod protocol;
pub mod encoder;
pub mod decoder;
