// src/host/engine.rs

use log::trace;

use crate::common::{
    error::EngineError,
    hal_traits::PortTransport,
    types::{ConnectionKind, DeviceDescriptor},
};
use crate::host::{
    config::EngineConfig,
    port::PortEngine,
    snapshot::{PortSnapshot, PortStatus},
};

/// Host side of `N` sensor ports, advanced by one external periodic tick.
///
/// Ports share nothing but the configuration; a fault on one never reaches
/// another.
#[derive(Debug)]
pub struct Engine<T: PortTransport, const N: usize> {
    ports: [PortEngine<T>; N],
    ticks: u64,
}

impl<T: PortTransport, const N: usize> Engine<T, N> {
    /// Takes one transport per port; port `i` drives `transports[i]`.
    pub fn new(transports: [T; N], config: EngineConfig) -> Self {
        let mut index = 0u8;
        let ports = transports.map(|transport| {
            let port = PortEngine::new(index, transport, config);
            index = index.wrapping_add(1);
            port
        });
        Engine { ports, ticks: 0 }
    }

    /// Advances every port once, in port order.
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
        for port in self.ports.iter_mut() {
            port.tick();
        }
        trace!("tick {} done", self.ticks);
    }

    /// Ticks since construction.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub const fn port_count(&self) -> usize {
        N
    }

    pub fn port(&self, port: usize) -> Result<&PortEngine<T>, EngineError> {
        self.ports.get(port).ok_or(EngineError::InvalidPort(port))
    }

    pub fn port_mut(&mut self, port: usize) -> Result<&mut PortEngine<T>, EngineError> {
        self.ports.get_mut(port).ok_or(EngineError::InvalidPort(port))
    }

    pub fn ports(&self) -> impl Iterator<Item = &PortEngine<T>> + '_ {
        self.ports.iter()
    }

    // --- Consumer interface ---

    pub fn descriptor(&self, port: usize, mode: u8) -> Result<&DeviceDescriptor, EngineError> {
        self.port(port)?.descriptor(mode)
    }

    pub fn clear_changed_flag(&mut self, port: usize, mode: u8) -> Result<(), EngineError> {
        self.port_mut(port)?.clear_changed_flag(mode)
    }

    /// Latest payload logged on `port` and its age in ticks.
    pub fn latest_sample(&self, port: usize) -> Result<Option<(&[u8], u32)>, EngineError> {
        Ok(self.port(port)?.latest_sample())
    }

    pub fn request_mode_change(&mut self, port: usize, mode: u8) -> Result<(), EngineError> {
        self.port_mut(port)?.request_mode_change(mode)
    }

    /// Queues a WRITE for `port`. Rejected while an earlier write is still
    /// waiting to go out.
    pub fn queue_write(&mut self, port: usize, bytes: &[u8]) -> Result<(), EngineError> {
        self.port_mut(port)?.queue_write(bytes)
    }

    pub fn set_connection_kind(
        &mut self,
        port: usize,
        kind: ConnectionKind,
    ) -> Result<(), EngineError> {
        self.port_mut(port)?.set_connection_kind(kind);
        Ok(())
    }

    /// Re-INITs `port` at the start of its next tick.
    pub fn force_reset(&mut self, port: usize) -> Result<(), EngineError> {
        self.port_mut(port)?.force_reset();
        Ok(())
    }

    pub fn status(&self, port: usize) -> Result<PortStatus, EngineError> {
        Ok(self.port(port)?.status())
    }

    pub fn snapshot(&self, port: usize) -> Result<PortSnapshot, EngineError> {
        Ok(self.port(port)?.snapshot())
    }

    /// Snapshot of `port` only if it changed since `seen_version`.
    pub fn snapshot_if_newer(
        &self,
        port: usize,
        seen_version: u32,
    ) -> Result<Option<PortSnapshot>, EngineError> {
        let port = self.port(port)?;
        Ok((port.version() != seen_version).then(|| port.snapshot()))
    }
}
