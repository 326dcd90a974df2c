// src/common/error.rs

use super::frame::Frame;
use super::header::{CmdId, InfoField};

/// Errors raised by the frame codec while turning bytes into frames.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FrameError {
    /// Header carries a length code outside the 0..=5 table.
    #[error("invalid length code in header {header:#04x}")]
    InvalidLength { header: u8 },

    /// Trailing check byte does not match the running XOR. The rejected frame
    /// is kept so the port can apply its checksum exemption.
    #[error("checksum mismatch: received {received:#04x}, calculated {calculated:#04x}")]
    Checksum {
        received: u8,
        calculated: u8,
        frame: Frame,
    },
}

/// Violations of the capability negotiation rules. Always fatal to the
/// current negotiation attempt.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum NegotiationError {
    #[error("command {0:?} received twice")]
    DuplicateCommand(CmdId),

    #[error("INFO {field:?} for mode {mode} received twice")]
    DuplicateInfo { mode: u8, field: InfoField },

    #[error("requested bit rate {0} outside the supported range")]
    BitRateOutOfRange(u32),

    #[error("device type {0} is not a valid type id")]
    InvalidType(u8),

    #[error("mode {0} is outside the announced mode count")]
    ModeOutOfRange(u8),

    #[error("INFO received before the mode count was announced")]
    ModesUnknown,

    #[error("FORMAT received after every announced mode was finalized")]
    ModesExhausted,

    #[error("FORMAT announces zero data sets")]
    ZeroDataSets,

    #[error("unknown numeric format code {0}")]
    InvalidFormat(u8),

    #[error("invalid mode name")]
    InvalidName,

    #[error("SI symbol longer than 4 bytes")]
    SymbolTooLong,

    #[error("payload too short for {0:?}")]
    PayloadTooShort(InfoField),

    #[error("ACK received before every mode was described")]
    IncompleteDescriptors,
}

/// Errors returned by the consumer-facing engine API.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("port {0} does not exist")]
    InvalidPort(usize),

    #[error("mode {0} is not available on this port")]
    InvalidMode(u8),

    #[error("a write is already outstanding on this port")]
    WriteOutstanding,

    #[error("write payload of {0} bytes does not fit a frame (1..=32)")]
    WritePayloadSize(usize),
}

/// Errors raised while building a peripheral-side device profile.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ProfileError {
    #[error("a device supports at most 8 modes")]
    TooManyModes,

    #[error("views ({views}) exceed the mode count ({modes})")]
    TooManyViews { views: u8, modes: u8 },

    #[error("mode names must start with a letter and fit 11 bytes")]
    InvalidName,

    #[error("SI symbol longer than 4 bytes")]
    SymbolTooLong,

    #[error("a mode must carry at least one data set")]
    ZeroDataSets,

    #[error("data sets need {0} bytes, more than a frame carries")]
    DataTooLarge(usize),

    #[error("mode {0} is not part of this profile")]
    UnknownMode(u8),

    #[error("output buffer too small for the announcement")]
    BufferFull,
}

/// Why a port left normal operation. Surfaced through the port status only;
/// it never propagates to other ports or the scheduler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortFault {
    #[error("framing error: {0}")]
    Framing(FrameError),

    #[error("negotiation error: {0}")]
    Negotiation(NegotiationError),

    #[error("too many consecutive data errors")]
    RuntimeData,

    #[error("watchdog expired without valid data")]
    Watchdog,

    #[error("transport reported an error")]
    Transport,
}

impl From<NegotiationError> for PortFault {
    fn from(e: NegotiationError) -> Self {
        PortFault::Negotiation(e)
    }
}

impl From<FrameError> for PortFault {
    fn from(e: FrameError) -> Self {
        PortFault::Framing(e)
    }
}
