// src/common/frame.rs

use arrayvec::ArrayVec;

use super::checksum::Checksum;
use super::header::{
    CmdId, Header, InfoField, LengthCode, MessageClass, BYTE_ACK, BYTE_NACK, BYTE_SYNC,
    MAX_PAYLOAD,
};

/// Frame payload storage. Always holds exactly the length-code size once a
/// frame is decoded.
pub type Payload = ArrayVec<u8, MAX_PAYLOAD>;

/// Longest encoded frame: header, INFO field byte, 32 payload bytes, check byte.
pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD + 3;

/// Encoded frame bytes.
pub type FrameBytes = ArrayVec<u8, MAX_FRAME_LEN>;

/// The reserved single-byte SYS messages.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SysByte {
    Sync,
    Nack,
    Ack,
}

impl SysByte {
    /// Classifies a SYS-class byte. Anything but the three reserved values is
    /// padding and yields `None`.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            BYTE_SYNC => Some(SysByte::Sync),
            BYTE_NACK => Some(SysByte::Nack),
            BYTE_ACK => Some(SysByte::Ack),
            _ => None,
        }
    }

    pub const fn byte(self) -> u8 {
        match self {
            SysByte::Sync => BYTE_SYNC,
            SysByte::Nack => BYTE_NACK,
            SysByte::Ack => BYTE_ACK,
        }
    }
}

/// One complete, checksum-verified protocol message.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Sys(SysByte),
    Cmd {
        cmd: CmdId,
        payload: Payload,
    },
    Info {
        mode: u8,
        field: InfoField,
        payload: Payload,
    },
    Data {
        mode: u8,
        payload: Payload,
    },
}

impl Frame {
    /// Builds a CMD frame, zero-padding `data` up to the smallest covering
    /// length code. Returns `None` for empty or oversized data.
    pub fn cmd(cmd: CmdId, data: &[u8]) -> Option<Self> {
        Some(Frame::Cmd {
            cmd,
            payload: padded(data)?,
        })
    }

    pub fn info(mode: u8, field: InfoField, data: &[u8]) -> Option<Self> {
        Some(Frame::Info {
            mode: mode & 0x07,
            field,
            payload: padded(data)?,
        })
    }

    pub fn data(mode: u8, data: &[u8]) -> Option<Self> {
        Some(Frame::Data {
            mode: mode & 0x07,
            payload: padded(data)?,
        })
    }

    /// SELECT command asking the device to switch to `mode`.
    pub fn select(mode: u8) -> Self {
        let mut payload = Payload::new();
        payload.push(mode);
        Frame::Cmd {
            cmd: CmdId::Select,
            payload,
        }
    }

    pub fn class(&self) -> MessageClass {
        match self {
            Frame::Sys(_) => MessageClass::Sys,
            Frame::Cmd { .. } => MessageClass::Cmd,
            Frame::Info { .. } => MessageClass::Info,
            Frame::Data { .. } => MessageClass::Data,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Frame::Sys(_) => &[],
            Frame::Cmd { payload, .. }
            | Frame::Info { payload, .. }
            | Frame::Data { payload, .. } => payload.as_slice(),
        }
    }

    /// Header of a non-SYS frame.
    pub fn header(&self) -> Option<Header> {
        let (class, field) = match self {
            Frame::Sys(_) => return None,
            Frame::Cmd { cmd, .. } => (MessageClass::Cmd, cmd.field()),
            Frame::Info { mode, .. } => (MessageClass::Info, *mode),
            Frame::Data { mode, .. } => (MessageClass::Data, *mode),
        };
        let length = LengthCode::covering(self.payload().len())?;
        Some(Header::new(class, length, field))
    }

    /// Serializes the frame, check byte included.
    pub fn encode(&self) -> FrameBytes {
        let mut out = FrameBytes::new();
        let header = match self.header() {
            Some(h) => h,
            None => {
                if let Frame::Sys(sys) = self {
                    out.push(sys.byte());
                }
                return out;
            }
        };
        out.push(header.encode());
        if let Frame::Info { field, .. } = self {
            out.push(field.byte());
        }
        // Payload is exactly payload_len() long for decoded and built frames.
        for byte in self.payload() {
            out.push(*byte);
        }
        let mut sum = Checksum::new();
        sum.update_slice(&out);
        out.push(sum.value());
        out
    }
}

fn padded(data: &[u8]) -> Option<Payload> {
    let code = LengthCode::covering(data.len())?;
    let mut payload = Payload::new();
    payload.try_extend_from_slice(data).ok()?;
    while payload.len() < code.payload_len() {
        payload.push(0);
    }
    Some(payload)
}
