// src/common/mod.rs

// --- Wire format and shared types ---
pub mod checksum;
pub mod codec;
pub mod error;
pub mod frame;
pub mod hal_traits;
pub mod header;
pub mod timing;
pub mod types;

#[cfg(feature = "impl-native")]
pub mod break_pin;

// --- Re-exports ---

pub use checksum::{calculate_checksum, verify_frame, Checksum};
pub use codec::FrameDecoder;
pub use error::{EngineError, FrameError, NegotiationError, PortFault, ProfileError};
pub use frame::{Frame, Payload, SysByte, MAX_FRAME_LEN};
pub use hal_traits::PortTransport;
pub use header::{CmdId, Header, InfoField, LengthCode, MessageClass};
pub use types::{ConnectionKind, DataFormat, DeviceDescriptor, Range};

#[cfg(feature = "impl-native")]
pub use break_pin::BreakPin;
