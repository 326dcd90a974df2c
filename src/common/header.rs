// src/common/header.rs

//! Bit layout of the message header byte.
//!
//! ```text
//!   7 6 | 5 4 3       | 2 1 0
//!  class| length code | field (command id / mode)
//! ```

use super::error::FrameError;

pub const CLASS_MASK: u8 = 0xC0;
pub const LENGTH_MASK: u8 = 0x38;
pub const FIELD_MASK: u8 = 0x07;

/// Largest payload a frame may carry.
pub const MAX_PAYLOAD: usize = 32;

/// Reserved SYS byte values.
pub const BYTE_SYNC: u8 = 0x00;
pub const BYTE_NACK: u8 = 0x02;
pub const BYTE_ACK: u8 = 0x04;

/// The two top bits of a header byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MessageClass {
    Sys,
    Cmd,
    Info,
    Data,
}

impl MessageClass {
    #[inline]
    pub const fn from_header(byte: u8) -> Self {
        match byte & CLASS_MASK {
            0x00 => MessageClass::Sys,
            0x40 => MessageClass::Cmd,
            0x80 => MessageClass::Info,
            _ => MessageClass::Data,
        }
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        match self {
            MessageClass::Sys => 0x00,
            MessageClass::Cmd => 0x40,
            MessageClass::Info => 0x80,
            MessageClass::Data => 0xC0,
        }
    }
}

/// Payload length code. Only codes 0..=5 exist on the wire.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct LengthCode(u8);

impl LengthCode {
    pub const MAX: u8 = 5;

    pub const fn new(code: u8) -> Option<Self> {
        if code <= Self::MAX {
            Some(LengthCode(code))
        } else {
            None
        }
    }

    /// Smallest code whose payload covers `len` bytes, or `None` if `len`
    /// is zero or exceeds [`MAX_PAYLOAD`].
    pub const fn covering(len: usize) -> Option<Self> {
        if len == 0 || len > MAX_PAYLOAD {
            return None;
        }
        let mut code = 0u8;
        while (1usize << code) < len {
            code += 1;
        }
        Some(LengthCode(code))
    }

    #[inline]
    pub const fn code(self) -> u8 {
        self.0
    }

    /// Payload length in bytes: 1, 2, 4, 8, 16 or 32.
    #[inline]
    pub const fn payload_len(self) -> usize {
        1 << self.0
    }
}

/// Command ids carried in the field bits of CMD headers.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CmdId {
    Type,
    Modes,
    Speed,
    Select,
    Write,
    /// Field values 5..=7 have no meaning.
    Unknown(u8),
}

impl CmdId {
    pub const fn from_field(field: u8) -> Self {
        match field & FIELD_MASK {
            0 => CmdId::Type,
            1 => CmdId::Modes,
            2 => CmdId::Speed,
            3 => CmdId::Select,
            4 => CmdId::Write,
            other => CmdId::Unknown(other),
        }
    }

    pub const fn field(self) -> u8 {
        match self {
            CmdId::Type => 0,
            CmdId::Modes => 1,
            CmdId::Speed => 2,
            CmdId::Select => 3,
            CmdId::Write => 4,
            CmdId::Unknown(v) => v & FIELD_MASK,
        }
    }
}

/// INFO field ids, carried in the byte following an INFO header.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum InfoField {
    Name,
    Raw,
    Pct,
    Si,
    Symbol,
    Format,
    Unknown(u8),
}

impl InfoField {
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => InfoField::Name,
            0x01 => InfoField::Raw,
            0x02 => InfoField::Pct,
            0x03 => InfoField::Si,
            0x04 => InfoField::Symbol,
            0x80 => InfoField::Format,
            other => InfoField::Unknown(other),
        }
    }

    pub const fn byte(self) -> u8 {
        match self {
            InfoField::Name => 0x00,
            InfoField::Raw => 0x01,
            InfoField::Pct => 0x02,
            InfoField::Si => 0x03,
            InfoField::Symbol => 0x04,
            InfoField::Format => 0x80,
            InfoField::Unknown(v) => v,
        }
    }

    /// Bit used to track which fields of a mode have arrived.
    pub(crate) const fn flag(self) -> u8 {
        match self {
            InfoField::Name => 0x01,
            InfoField::Raw => 0x02,
            InfoField::Pct => 0x04,
            InfoField::Si => 0x08,
            InfoField::Symbol => 0x10,
            InfoField::Format => 0x20,
            InfoField::Unknown(_) => 0x00,
        }
    }
}

/// A decoded non-SYS header byte.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Header {
    pub class: MessageClass,
    pub length: LengthCode,
    pub field: u8,
}

impl Header {
    pub const fn new(class: MessageClass, length: LengthCode, field: u8) -> Self {
        Header {
            class,
            length,
            field: field & FIELD_MASK,
        }
    }

    /// Decodes a header byte. SYS bytes are not headers; callers classify
    /// them before calling this.
    pub fn decode(byte: u8) -> Result<Self, FrameError> {
        let length = LengthCode::new((byte & LENGTH_MASK) >> 3)
            .ok_or(FrameError::InvalidLength { header: byte })?;
        Ok(Header {
            class: MessageClass::from_header(byte),
            length,
            field: byte & FIELD_MASK,
        })
    }

    #[inline]
    pub const fn encode(&self) -> u8 {
        self.class.bits() | (self.length.code() << 3) | (self.field & FIELD_MASK)
    }

    /// Bytes that follow the header, check byte included.
    #[inline]
    pub const fn body_len(&self) -> usize {
        let extra = match self.class {
            MessageClass::Info => 1,
            _ => 0,
        };
        self.length.payload_len() + extra + 1
    }
}
