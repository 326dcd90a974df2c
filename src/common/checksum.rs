// src/common/checksum.rs

/// Seed of the running frame checksum.
pub const CHECKSUM_SEED: u8 = 0xFF;

/// Running XOR checksum used by every non-SYS frame.
///
/// The checksum covers the header byte, the INFO field byte (if any) and all
/// payload bytes, starting from [`CHECKSUM_SEED`]. The trailing check byte of
/// a frame must equal the final value.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Checksum(u8);

impl Checksum {
    #[inline]
    pub const fn new() -> Self {
        Checksum(CHECKSUM_SEED)
    }

    #[inline]
    pub fn update(&mut self, byte: u8) {
        self.0 ^= byte;
    }

    #[inline]
    pub fn update_slice(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.0 ^= *byte;
        }
    }

    #[inline]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}

/// Calculates the check byte for a complete frame body (header through last
/// payload byte, without the trailing check byte).
#[inline]
pub fn calculate_checksum(body: &[u8]) -> u8 {
    let mut sum = Checksum::new();
    sum.update_slice(body);
    sum.value()
}

/// Verifies a full frame whose last byte is the check byte.
///
/// Returns `Err((received, calculated))` on mismatch. An empty slice cannot
/// carry a check byte and is rejected with both values zero.
pub fn verify_frame(frame_with_check: &[u8]) -> Result<(), (u8, u8)> {
    let Some((received, body)) = frame_with_check.split_last() else {
        return Err((0, 0));
    };
    let calculated = calculate_checksum(body);
    if calculated == *received {
        Ok(())
    } else {
        Err((*received, calculated))
    }
}
