// src/host/snapshot.rs

//! Owned views of a port handed to consumers.

use crate::common::{
    error::PortFault,
    types::{ConnectionKind, DeviceDescriptor, MAX_MODES},
};
use crate::host::{port::Phase, sample_log::RawSample};

/// Connection status of one port.
#[derive(Debug, Clone, PartialEq)]
pub struct PortStatus {
    pub phase: Phase,
    pub connection: ConnectionKind,
    /// Type id from SYNC, once a device has synced.
    pub device_type: Option<u8>,
    pub bit_rate: u32,
    pub target_bit_rate: u32,
    pub max_bit_rate: u32,
    pub active_mode: u8,
    pub data_errors: u8,
    pub write_pending: bool,
    /// Line breaks seen since power-up.
    pub line_breaks: u32,
    /// Why the port last left normal operation. Cleared on re-INIT.
    pub fault: Option<PortFault>,
}

impl PortStatus {
    /// Port is exchanging data with a negotiated device.
    pub fn is_online(&self) -> bool {
        self.phase == Phase::Data
    }
}

/// Consistent copy of one port's consumer-visible state.
///
/// `version` increases whenever a descriptor or sample changes, so a
/// consumer can skip copies it has already seen.
#[derive(Debug, Clone, PartialEq)]
pub struct PortSnapshot {
    pub port: u8,
    pub version: u32,
    pub status: PortStatus,
    pub descriptors: [DeviceDescriptor; MAX_MODES],
    pub latest: Option<RawSample>,
}

impl PortSnapshot {
    pub fn descriptor(&self, mode: u8) -> Option<&DeviceDescriptor> {
        self.descriptors.get(mode as usize)
    }

    /// Modes whose descriptor was republished since the consumer last
    /// cleared its flag.
    pub fn changed_modes(&self) -> impl Iterator<Item = u8> + '_ {
        self.descriptors
            .iter()
            .enumerate()
            .filter(|(_, d)| d.changed)
            .map(|(m, _)| m as u8)
    }
}
