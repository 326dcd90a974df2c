// src/lib.rs

#![no_std]

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod common;
pub mod host;
pub mod peripheral;

// Re-export key types for convenience
pub use common::{
    ConnectionKind, DeviceDescriptor, EngineError, Frame, FrameDecoder, PortFault, PortTransport,
};
pub use host::{Engine, EngineConfig, Phase, PortSnapshot, PortStatus};
pub use peripheral::{DeviceProfile, ModeProfile};
