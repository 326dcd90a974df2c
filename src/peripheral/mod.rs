// src/peripheral/mod.rs

//! Device side of the link.
//!
//! Builds the byte stream an intelligent device sends after power-up, so
//! simulators and tests can stand in for real hardware.

mod profile;

pub use profile::{DeviceProfile, ModeProfile, MAX_ANNOUNCE_FRAMES};
