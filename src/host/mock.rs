// src/host/mock.rs

//! In-memory transport shared by the host-side tests.

use heapless::{Deque, Vec};

use crate::common::hal_traits::PortTransport;
use crate::peripheral::DeviceProfile;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct MockCommError;

#[derive(Debug, Default)]
pub(crate) struct MockTransport {
    pub rx: Deque<u8, 1024>,
    pub tx: Vec<u8, 1024>,
    pub line_break: bool,
    pub bit_rates: Vec<u32, 16>,
    pub fail_set_rate: bool,
    pub fail_reads: bool,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.rx.push_back(*b).unwrap();
        }
    }

    /// Queues the full power-up announcement of `profile`.
    pub fn feed_announce(&mut self, profile: &DeviceProfile) {
        let mut bytes: Vec<u8, 1024> = Vec::new();
        profile.announce_bytes(&mut bytes).unwrap();
        self.feed(&bytes);
    }

    pub fn take_tx(&mut self) -> Vec<u8, 1024> {
        core::mem::take(&mut self.tx)
    }

    pub fn current_rate(&self) -> Option<u32> {
        self.bit_rates.last().copied()
    }
}

impl PortTransport for MockTransport {
    type Error = MockCommError;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        if self.fail_reads {
            return Err(nb::Error::Other(MockCommError));
        }
        self.rx.pop_front().ok_or(nb::Error::WouldBlock)
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        self.tx.push(byte).map_err(|_| nb::Error::WouldBlock)
    }

    fn is_line_break_asserted(&mut self) -> bool {
        self.line_break
    }

    fn set_bit_rate(&mut self, bps: u32) -> Result<(), Self::Error> {
        if self.fail_set_rate {
            return Err(MockCommError);
        }
        let _ = self.bit_rates.push(bps);
        Ok(())
    }

    // Transmit side only; received bytes stay queued.
    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        Ok(())
    }
}
