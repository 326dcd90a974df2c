// src/common/break_pin.rs

//! Line-break sensing from the RX pin itself.
//!
//! Many UART peripherals do not report a break condition. Sampling the RX
//! pin as a GPIO gives the same information: an idle line is high, a break
//! holds it low.

use embedded_hal::digital::InputPin;

/// Wraps the RX pin of one port.
#[derive(Debug)]
pub struct BreakPin<P> {
    pin: P,
}

impl<P: InputPin> BreakPin<P> {
    pub fn new(pin: P) -> Self {
        BreakPin { pin }
    }

    /// `true` while the line is held low. Pin read errors count as "no break"
    /// so a flaky GPIO cannot restart the port in a loop.
    pub fn is_asserted(&mut self) -> bool {
        self.pin.is_low().unwrap_or(false)
    }

    pub fn release(self) -> P {
        self.pin
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;

    struct MockPin {
        low: bool,
    }

    impl embedded_hal::digital::ErrorType for MockPin {
        type Error = Infallible;
    }

    impl InputPin for MockPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.low)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Ok(self.low)
        }
    }

    #[test]
    fn test_break_follows_pin_level() {
        let mut brk = BreakPin::new(MockPin { low: false });
        assert!(!brk.is_asserted());
        let mut pin = brk.release();
        pin.low = true;
        let mut brk = BreakPin::new(pin);
        assert!(brk.is_asserted());
    }
}
