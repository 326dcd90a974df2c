// src/common/types.rs

use heapless::Vec;

use super::timing::TYPE_UNKNOWN;

/// Longest mode name a device may announce.
pub const NAME_LEN: usize = 11;
/// Longest SI unit symbol.
pub const SYMBOL_LEN: usize = 4;
/// Modes per device (field bits of INFO/DATA headers).
pub const MAX_MODES: usize = 8;

// --- Numeric format of DATA payloads ---

/// Encoding of each data set in a DATA payload.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DataFormat {
    #[default]
    Int8,
    Int16,
    Int32,
    Float,
}

impl DataFormat {
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(DataFormat::Int8),
            1 => Some(DataFormat::Int16),
            2 => Some(DataFormat::Int32),
            3 => Some(DataFormat::Float),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            DataFormat::Int8 => 0,
            DataFormat::Int16 => 1,
            DataFormat::Int32 => 2,
            DataFormat::Float => 3,
        }
    }

    /// Bytes per data set.
    pub const fn width(self) -> usize {
        match self {
            DataFormat::Int8 => 1,
            DataFormat::Int16 => 2,
            DataFormat::Int32 | DataFormat::Float => 4,
        }
    }
}

/// How a port finds out what is attached to it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ConnectionKind {
    /// Intelligent device negotiating over the serial link.
    #[default]
    Serial,
    /// Nothing attached; the port is shut down.
    None,
}

/// Min/max pair used for raw, percent and SI scaling.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    pub const fn new(min: f32, max: f32) -> Self {
        Range { min, max }
    }

    /// Decodes two little-endian floats (min, max).
    pub fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 8 {
            return None;
        }
        let min = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let max = f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        Some(Range { min, max })
    }

    pub fn to_le_bytes(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&self.min.to_le_bytes());
        out[4..].copy_from_slice(&self.max.to_le_bytes());
        out
    }
}

/// Capability metadata for one mode of an attached device.
///
/// Consumers only ever see complete descriptors or the sentinel returned by
/// [`DeviceDescriptor::unknown`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    pub name: Vec<u8, NAME_LEN>,
    pub device_type: u8,
    pub connection: ConnectionKind,
    /// Total modes the device supports.
    pub modes: u8,
    /// Modes shown in views.
    pub views: u8,
    pub data_sets: u8,
    pub format: DataFormat,
    pub figures: u8,
    pub decimals: u8,
    pub raw: Range,
    pub pct: Range,
    pub si: Range,
    pub symbol: Vec<u8, SYMBOL_LEN>,
    /// Milliseconds after a mode change during which samples are not valid.
    pub invalid_time_ms: u16,
    /// Latched when the descriptor is (re)published; cleared by the consumer.
    pub changed: bool,
}

impl DeviceDescriptor {
    /// Sentinel entry shown while nothing is negotiated.
    pub fn unknown() -> Self {
        DeviceDescriptor {
            name: Vec::new(),
            device_type: TYPE_UNKNOWN,
            connection: ConnectionKind::None,
            modes: 0,
            views: 0,
            data_sets: 0,
            format: DataFormat::Int8,
            figures: 0,
            decimals: 0,
            raw: Range::new(0.0, 1023.0),
            pct: Range::new(0.0, 100.0),
            si: Range::new(0.0, 1023.0),
            symbol: Vec::new(),
            invalid_time_ms: 0,
            changed: false,
        }
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        self.device_type != TYPE_UNKNOWN
    }

    /// Name as text, if it is valid UTF-8.
    pub fn name_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.name).ok()
    }

    pub fn symbol_str(&self) -> Option<&str> {
        core::str::from_utf8(&self.symbol).ok()
    }

    /// Payload bytes a DATA frame of this mode carries.
    pub fn data_len(&self) -> usize {
        self.data_sets as usize * self.format.width()
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Strips trailing NUL padding from a fixed-length text field.
pub(crate) fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}
