// src/common/codec.rs

//! Incremental frame decoder.
//!
//! Bytes are pushed one at a time; the decoder keeps its partial frame across
//! calls, so a frame split over several scheduler ticks decodes the same as
//! one delivered in a single burst.

use super::checksum::Checksum;
use super::error::FrameError;
use super::frame::{Frame, FrameBytes, Payload, SysByte};
use super::header::{CmdId, Header, InfoField, MessageClass};

#[derive(Debug, Clone)]
pub struct FrameDecoder {
    buf: FrameBytes,
    /// Total length of the frame being collected, check byte included.
    /// Zero while waiting for a header.
    expected: usize,
    sum: Checksum,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        FrameDecoder {
            buf: FrameBytes::new_const(),
            expected: 0,
            sum: Checksum::new(),
        }
    }

    /// Drops any partially collected frame.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.expected = 0;
        self.sum = Checksum::new();
    }

    /// `true` when no frame is in progress.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.expected == 0
    }

    /// Class of the frame currently being collected, if any.
    pub fn pending_class(&self) -> Option<MessageClass> {
        if self.is_idle() {
            None
        } else {
            self.buf.first().map(|b| MessageClass::from_header(*b))
        }
    }

    /// Feeds one byte.
    ///
    /// Returns `Ok(frame)` when a frame completes, `Err(WouldBlock)` when more
    /// bytes are needed (padding included), or `Err(Other(_))` when the frame
    /// is rejected. A rejected frame is discarded and the decoder is ready
    /// for the next header.
    pub fn push(&mut self, byte: u8) -> nb::Result<Frame, FrameError> {
        if self.is_idle() {
            return self.start(byte);
        }

        // Cannot overflow: `expected` never exceeds the buffer capacity.
        self.buf.push(byte);
        if self.buf.len() < self.expected {
            self.sum.update(byte);
            return Err(nb::Error::WouldBlock);
        }

        let calculated = self.sum.value();
        let frame = self.assemble();
        self.reset();
        if byte == calculated {
            Ok(frame)
        } else {
            Err(nb::Error::Other(FrameError::Checksum {
                received: byte,
                calculated,
                frame,
            }))
        }
    }

    /// Feeds bytes until a frame completes or is rejected.
    ///
    /// Returns the number of bytes consumed and the outcome, if any. Bytes
    /// after the completed frame are left for the next call.
    pub fn feed(&mut self, bytes: &[u8]) -> (usize, Option<Result<Frame, FrameError>>) {
        for (i, byte) in bytes.iter().enumerate() {
            match self.push(*byte) {
                Ok(frame) => return (i + 1, Some(Ok(frame))),
                Err(nb::Error::Other(e)) => return (i + 1, Some(Err(e))),
                Err(nb::Error::WouldBlock) => {}
            }
        }
        (bytes.len(), None)
    }

    fn start(&mut self, byte: u8) -> nb::Result<Frame, FrameError> {
        if MessageClass::from_header(byte) == MessageClass::Sys {
            return match SysByte::from_byte(byte) {
                Some(sys) => Ok(Frame::Sys(sys)),
                None => Err(nb::Error::WouldBlock),
            };
        }
        let header = Header::decode(byte).map_err(nb::Error::Other)?;
        self.buf.clear();
        self.buf.push(byte);
        self.sum = Checksum::new();
        self.sum.update(byte);
        self.expected = 1 + header.body_len();
        Err(nb::Error::WouldBlock)
    }

    fn assemble(&self) -> Frame {
        let header_byte = self.buf[0];
        let field = header_byte & super::header::FIELD_MASK;
        let body_end = self.buf.len() - 1;
        let mut payload = Payload::new();
        match MessageClass::from_header(header_byte) {
            MessageClass::Info => {
                let _ = payload.try_extend_from_slice(&self.buf[2..body_end]);
                Frame::Info {
                    mode: field,
                    field: InfoField::from_byte(self.buf[1]),
                    payload,
                }
            }
            MessageClass::Cmd => {
                let _ = payload.try_extend_from_slice(&self.buf[1..body_end]);
                Frame::Cmd {
                    cmd: CmdId::from_field(field),
                    payload,
                }
            }
            // SYS never reaches here; `start` answers it directly.
            MessageClass::Data | MessageClass::Sys => {
                let _ = payload.try_extend_from_slice(&self.buf[1..body_end]);
                Frame::Data {
                    mode: field,
                    payload,
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}
