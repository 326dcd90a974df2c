// src/common/hal_traits.rs

use core::fmt::Debug;

/// Abstraction for one port's serial link, as seen by the protocol engine.
///
/// All calls are made from inside the scheduler tick and must not block.
/// Byte-level UART configuration, pin muxing and electrical details live in
/// the implementation.
pub trait PortTransport {
    /// Associated error type for communication errors.
    type Error: Debug;

    /// Attempts to read a single received byte.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` if nothing is pending. Bytes must
    /// be returned in arrival order.
    fn read_byte(&mut self) -> nb::Result<u8, Self::Error>;

    /// Attempts to queue a single byte for transmission.
    ///
    /// Returns `Err(nb::Error::WouldBlock)` if the transmitter cannot accept
    /// the byte right now; the engine retries on a later tick.
    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error>;

    /// Reports whether the receive line is currently held in the break
    /// (continuous space) condition.
    fn is_line_break_asserted(&mut self) -> bool;

    /// Reconfigures the link to a new bit rate.
    fn set_bit_rate(&mut self, bps: u32) -> Result<(), Self::Error>;

    /// Attempts to complete transmission of everything written so far.
    /// Received bytes are left untouched.
    fn flush(&mut self) -> nb::Result<(), Self::Error>;
}

impl<T: PortTransport + ?Sized> PortTransport for &mut T {
    type Error = T::Error;

    fn read_byte(&mut self) -> nb::Result<u8, Self::Error> {
        (**self).read_byte()
    }

    fn write_byte(&mut self, byte: u8) -> nb::Result<(), Self::Error> {
        (**self).write_byte(byte)
    }

    fn is_line_break_asserted(&mut self) -> bool {
        (**self).is_line_break_asserted()
    }

    fn set_bit_rate(&mut self, bps: u32) -> Result<(), Self::Error> {
        (**self).set_bit_rate(bps)
    }

    fn flush(&mut self) -> nb::Result<(), Self::Error> {
        (**self).flush()
    }
}
