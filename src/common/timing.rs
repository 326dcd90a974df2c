// src/common/timing.rs

// Nominal protocol constants. Durations are expressed in scheduler ticks;
// the scheduler runs at a nominal 1 ms period, so one tick ~ 1 ms.
// `EngineConfig::default()` is built from these values.

// === Bit rates ===

/// Every device starts negotiating at this rate after reset.
pub const LOWEST_BIT_RATE: u32 = 2_400;
/// Requested rates above this are rejected.
pub const HIGHEST_BIT_RATE: u32 = 460_800;
/// Pivot of the SPEED scaling rule.
pub const MID_BIT_RATE: u32 = 57_600;
/// Rate used when no device syncs and the port falls back to terminal mode.
pub const TERMINAL_BIT_RATE: u32 = 115_200;

// === Negotiation ===

/// How long SYNC waits for a TYPE frame before assuming a text terminal.
pub const SYNC_TIMEOUT_TICKS: u32 = 2_000;
/// Delay between the device's ACK and our answering ACK.
pub const ACK_DELAY_TICKS: u32 = 10;

// === Steady state ===

/// Keep-alive period in DATA.
pub const WATCHDOG_INTERVAL_TICKS: u32 = 100;
/// Consecutive data errors tolerated before the port is parked.
pub const MAX_DATA_ERRORS: u8 = 6;
/// Time a freshly selected mode needs before its samples are trustworthy.
pub const MODE_SETTLE_MS: u16 = 30;

// === Line ===

/// Consecutive ticks the line must read as break before the port restarts.
pub const BREAK_DETECT_TICKS: u32 = 2;
/// Upper bound on bytes consumed from one port per tick.
pub const MAX_BYTES_PER_TICK: usize = 64;

// === Device types ===

/// Highest device type id accepted during SYNC.
pub const MAX_VALID_TYPE: u8 = 101;
/// Type id of the sentinel descriptor.
pub const TYPE_UNKNOWN: u8 = 125;
/// Colour sensor; its RGB-RAW mode ships with a wrong checksum.
pub const TYPE_COLOR_SENSOR: u8 = 29;
pub const COLOR_SENSOR_RGB_RAW_MODE: u8 = 4;
