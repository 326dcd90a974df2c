// src/host/port/exchange.rs

//! Steady-state DATA exchange and the terminal fallback.

use log::{debug, trace, warn};

use super::{io_helpers::Rx, Phase, PortEngine};
use crate::common::{
    error::{FrameError, PortFault},
    frame::Frame,
    hal_traits::PortTransport,
    header::{CmdId, BYTE_NACK},
    timing::{COLOR_SENSOR_RGB_RAW_MODE, TYPE_COLOR_SENSOR},
};

impl<T: PortTransport> PortEngine<T> {
    /// One DATA tick: decode, mode upkeep, watchdog, writes.
    pub(super) fn exchange(&mut self) {
        // 1. One frame
        match self.read_frame() {
            Some(Ok(Frame::Data { mode, payload })) => self.accept_data(mode, &payload),
            Some(Ok(other)) => trace!("port {}: ignoring {:?} in DATA", self.index, other.class()),
            Some(Err(PortFault::Framing(FrameError::Checksum {
                frame: Frame::Data { mode, payload },
                ..
            }))) if self.checksum_exempt(mode) => self.accept_data(mode, &payload),
            Some(Err(fault)) => self.data_error(fault),
            None => {}
        }
        if self.phase != Phase::Data {
            return;
        }

        // 2. Mode change
        if self.mode_change_pending && self.outbound.is_idle() {
            debug!("port {}: selecting mode {}", self.index, self.active_mode);
            self.outbound.load(&Frame::select(self.active_mode).encode());
            self.mode_change_pending = false;
        }

        // 3. Watchdog
        self.watchdog = self.watchdog.saturating_add(1);
        if self.watchdog >= self.config.watchdog_interval_ticks && self.outbound.is_idle() {
            self.watchdog = 0;
            let serviced = core::mem::replace(&mut self.data_ok, false);
            if !serviced {
                self.data_errors = self.data_errors.saturating_add(1);
                debug!(
                    "port {}: no data for a watchdog interval ({} errors)",
                    self.index, self.data_errors
                );
                if self.data_errors >= self.config.max_data_errors {
                    self.fail(Phase::DataError, PortFault::Watchdog);
                    return;
                }
            }
            self.outbound.load(&[BYTE_NACK]);
        }

        // 4. Consumer write
        if self.outbound.is_idle() {
            if let Some(payload) = self.pending_write.take() {
                match Frame::cmd(CmdId::Write, &payload) {
                    Some(frame) => {
                        self.outbound.load(&frame.encode());
                    }
                    None => warn!("port {}: dropping unencodable write", self.index),
                }
            }
        }
        // 5. Draining happens at the end of every tick.
    }

    /// Reads bytes until one frame completes, the line runs dry, or the
    /// per-tick budget is spent. A receive error drops the partial frame.
    fn read_frame(&mut self) -> Option<Result<Frame, PortFault>> {
        for _ in 0..self.config.max_bytes_per_tick {
            let byte = match self.receive() {
                Rx::Byte(b) => b,
                Rx::Empty => return None,
                Rx::Failed => {
                    self.decoder.reset();
                    return Some(Err(PortFault::Transport));
                }
            };
            match self.decoder.push(byte) {
                Ok(frame) => return Some(Ok(frame)),
                Err(nb::Error::Other(e)) => return Some(Err(e.into())),
                Err(nb::Error::WouldBlock) => {}
            }
        }
        None
    }

    /// The colour sensor sends RGB-RAW with a checksum that never matches;
    /// those frames are taken as they are.
    fn checksum_exempt(&self, mode: u8) -> bool {
        self.negotiator.device_type() == Some(TYPE_COLOR_SENSOR)
            && mode == COLOR_SENSOR_RGB_RAW_MODE
    }

    fn accept_data(&mut self, mode: u8, payload: &[u8]) {
        if mode != self.active_mode {
            trace!(
                "port {}: data for mode {} while mode {} is active",
                self.index,
                mode,
                self.active_mode
            );
            self.mode_change_pending = true;
            return;
        }
        self.samples.record(mode, payload);
        self.data_errors = self.data_errors.saturating_sub(1);
        self.data_ok = true;
        self.bump_version();
    }

    fn data_error(&mut self, fault: PortFault) {
        self.data_errors = self.data_errors.saturating_add(1);
        debug!(
            "port {}: {} ({} consecutive errors)",
            self.index, fault, self.data_errors
        );
        if self.data_errors >= self.config.max_data_errors {
            self.fail(Phase::DataError, PortFault::RuntimeData);
        }
    }

    /// Terminal fallback: echo what arrives, log it line by line, pass
    /// consumer writes through untouched.
    pub(super) fn terminal(&mut self) {
        for _ in 0..self.config.max_bytes_per_tick {
            let byte = match self.receive() {
                Rx::Byte(b) => b,
                Rx::Empty => break,
                Rx::Failed => continue,
            };
            if !self.outbound.push(byte) {
                trace!("port {}: echo buffer full", self.index);
            }
            let end_of_line = byte == b'\n' || byte == b'\r';
            if !end_of_line {
                let _ = self.terminal_line.try_push(byte);
            }
            if end_of_line || self.terminal_line.is_full() {
                self.commit_terminal_line();
            }
        }

        if self.outbound.is_idle() {
            if let Some(payload) = self.pending_write.take() {
                self.outbound.load(&payload);
            }
        }
    }

    fn commit_terminal_line(&mut self) {
        if self.terminal_line.is_empty() {
            return;
        }
        let line = core::mem::take(&mut self.terminal_line);
        self.samples.record(0, &line);
        self.bump_version();
    }
}
