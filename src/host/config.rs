// src/host/config.rs

use crate::common::timing;

/// Tunables shared by every port of an [`Engine`](super::Engine).
///
/// `Default` gives the nominal protocol values from [`timing`]. Tests and
/// simulators shorten the delays to keep scenarios small.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub lowest_bit_rate: u32,
    pub highest_bit_rate: u32,
    pub mid_bit_rate: u32,
    pub terminal_bit_rate: u32,
    pub sync_timeout_ticks: u32,
    pub ack_delay_ticks: u32,
    pub watchdog_interval_ticks: u32,
    pub max_data_errors: u8,
    pub break_detect_ticks: u32,
    pub max_bytes_per_tick: usize,
    pub max_valid_type: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lowest_bit_rate: timing::LOWEST_BIT_RATE,
            highest_bit_rate: timing::HIGHEST_BIT_RATE,
            mid_bit_rate: timing::MID_BIT_RATE,
            terminal_bit_rate: timing::TERMINAL_BIT_RATE,
            sync_timeout_ticks: timing::SYNC_TIMEOUT_TICKS,
            ack_delay_ticks: timing::ACK_DELAY_TICKS,
            watchdog_interval_ticks: timing::WATCHDOG_INTERVAL_TICKS,
            max_data_errors: timing::MAX_DATA_ERRORS,
            break_detect_ticks: timing::BREAK_DETECT_TICKS,
            max_bytes_per_tick: timing::MAX_BYTES_PER_TICK,
            max_valid_type: timing::MAX_VALID_TYPE,
        }
    }
}

impl EngineConfig {
    pub fn with_sync_timeout(mut self, ticks: u32) -> Self {
        self.sync_timeout_ticks = ticks;
        self
    }

    pub fn with_ack_delay(mut self, ticks: u32) -> Self {
        self.ack_delay_ticks = ticks;
        self
    }

    pub fn with_watchdog_interval(mut self, ticks: u32) -> Self {
        self.watchdog_interval_ticks = ticks;
        self
    }

    /// Target rate for a SPEED request received while the link runs at
    /// `current`.
    ///
    /// When the link is already above the lowest rate and the request is at
    /// or below the mid rate, the request is scaled by `current / lowest`;
    /// otherwise it is taken literally.
    pub fn scaled_target_rate(&self, current: u32, requested: u32) -> u32 {
        if current > self.lowest_bit_rate && requested <= self.mid_bit_rate {
            let scaled =
                u64::from(current) * u64::from(requested) / u64::from(self.lowest_bit_rate);
            u32::try_from(scaled).unwrap_or(u32::MAX)
        } else {
            requested
        }
    }

    pub fn rate_in_range(&self, rate: u32) -> bool {
        (self.lowest_bit_rate..=self.highest_bit_rate).contains(&rate)
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_literal_at_lowest_rate() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.scaled_target_rate(2_400, 57_600), 57_600);
        assert_eq!(cfg.scaled_target_rate(2_400, 460_800), 460_800);
    }

    #[test]
    fn test_speed_scaled_above_lowest_rate() {
        let cfg = EngineConfig::default();
        assert_eq!(
            cfg.scaled_target_rate(115_200, 28_800),
            115_200 * 28_800 / 2_400
        );
        assert_eq!(cfg.scaled_target_rate(115_200, 28_800), 1_382_400);
        // Mid threshold itself still scales
        assert_eq!(cfg.scaled_target_rate(4_800, 57_600), 115_200);
    }

    #[test]
    fn test_speed_literal_above_mid() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.scaled_target_rate(115_200, 115_200), 115_200);
    }

    #[test]
    fn test_rate_range() {
        let cfg = EngineConfig::default();
        assert!(cfg.rate_in_range(2_400));
        assert!(cfg.rate_in_range(460_800));
        assert!(!cfg.rate_in_range(1_200));
        assert!(!cfg.rate_in_range(921_600));
    }
}
