// src/host/port/io_helpers.rs

use heapless::Vec;
use log::warn;

use super::PortEngine;
use crate::common::{frame::MAX_FRAME_LEN, hal_traits::PortTransport};

/// Bytes queued for transmission and how many have gone out.
#[derive(Debug, Clone, Default)]
pub(crate) struct Outbound {
    buf: Vec<u8, MAX_FRAME_LEN>,
    sent: usize,
}

impl Outbound {
    pub(crate) fn is_idle(&self) -> bool {
        self.sent >= self.buf.len()
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
        self.sent = 0;
    }

    /// Replaces the (idle) buffer with `bytes`. Returns `false` if they do
    /// not fit.
    pub(crate) fn load(&mut self, bytes: &[u8]) -> bool {
        self.clear();
        self.buf.extend_from_slice(bytes).is_ok()
    }

    /// Appends one byte, starting a fresh buffer if the last one is done.
    pub(crate) fn push(&mut self, byte: u8) -> bool {
        if self.is_idle() {
            self.clear();
        }
        self.buf.push(byte).is_ok()
    }

    pub(crate) fn pending(&self) -> &[u8] {
        &self.buf[self.sent.min(self.buf.len())..]
    }
}

/// One attempt at reading from the transport.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum Rx {
    Byte(u8),
    Empty,
    Failed,
}

impl<T: PortTransport> PortEngine<T> {
    pub(super) fn receive(&mut self) -> Rx {
        match self.transport.read_byte() {
            Ok(byte) => Rx::Byte(byte),
            Err(nb::Error::WouldBlock) => Rx::Empty,
            Err(nb::Error::Other(e)) => {
                warn!("port {}: receive error {:?}", self.index, e);
                Rx::Failed
            }
        }
    }

    /// Writes queued bytes until the transport pushes back.
    pub(super) fn drain_outbound(&mut self) {
        while let Some(&byte) = self.outbound.pending().first() {
            match self.transport.write_byte(byte) {
                Ok(()) => self.outbound.sent += 1,
                Err(nb::Error::WouldBlock) => break,
                Err(nb::Error::Other(e)) => {
                    warn!("port {}: transmit error {:?}, dropping frame", self.index, e);
                    self.outbound.clear();
                    break;
                }
            }
        }
    }

    /// Switches the link rate, recording it on success.
    pub(super) fn change_bit_rate(&mut self, bps: u32) -> bool {
        match self.transport.set_bit_rate(bps) {
            Ok(()) => {
                self.bit_rate = bps;
                true
            }
            Err(e) => {
                warn!("port {}: cannot switch to {} bps: {:?}", self.index, bps, e);
                false
            }
        }
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_load_and_idle() {
        let mut out = Outbound::default();
        assert!(out.is_idle());
        assert!(out.load(&[1, 2, 3]));
        assert!(!out.is_idle());
        assert_eq!(out.pending(), &[1, 2, 3]);
        out.sent = 3;
        assert!(out.is_idle());
        assert!(out.pending().is_empty());
    }

    #[test]
    fn test_outbound_push_restarts_when_idle() {
        let mut out = Outbound::default();
        out.load(&[9]);
        out.sent = 1;
        assert!(out.push(7));
        assert_eq!(out.pending(), &[7]);
    }

    #[test]
    fn test_outbound_rejects_oversize() {
        let mut out = Outbound::default();
        assert!(!out.load(&[0u8; MAX_FRAME_LEN + 1]));
    }
}
