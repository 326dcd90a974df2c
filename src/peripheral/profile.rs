// src/peripheral/profile.rs

use heapless::Vec;

use crate::common::{
    error::ProfileError,
    frame::{Frame, SysByte},
    header::{CmdId, InfoField, MAX_PAYLOAD},
    types::{DataFormat, Range, MAX_MODES, NAME_LEN, SYMBOL_LEN},
};

/// Upper bound on frames in one announcement: TYPE, MODES, SPEED, six INFO
/// frames per mode and the closing ACK.
pub const MAX_ANNOUNCE_FRAMES: usize = 3 + 6 * MAX_MODES + 1;

/// What a device announces about one of its modes.
#[derive(Debug, Clone, PartialEq)]
pub struct ModeProfile {
    name: Vec<u8, NAME_LEN>,
    data_sets: u8,
    format: DataFormat,
    figures: u8,
    decimals: u8,
    raw: Option<Range>,
    pct: Option<Range>,
    si: Option<Range>,
    symbol: Option<Vec<u8, SYMBOL_LEN>>,
}

impl ModeProfile {
    pub fn new(name: &str, data_sets: u8, format: DataFormat) -> Result<Self, ProfileError> {
        let bytes = name.as_bytes();
        if !bytes.first().is_some_and(|b| b.is_ascii_alphabetic()) {
            return Err(ProfileError::InvalidName);
        }
        let name = Vec::from_slice(bytes).map_err(|_| ProfileError::InvalidName)?;
        if data_sets == 0 {
            return Err(ProfileError::ZeroDataSets);
        }
        let len = data_sets as usize * format.width();
        if len > MAX_PAYLOAD {
            return Err(ProfileError::DataTooLarge(len));
        }
        Ok(ModeProfile {
            name,
            data_sets,
            format,
            figures: 4,
            decimals: 0,
            raw: None,
            pct: None,
            si: None,
            symbol: None,
        })
    }

    pub fn with_figures(mut self, figures: u8, decimals: u8) -> Self {
        self.figures = figures;
        self.decimals = decimals;
        self
    }

    pub fn with_raw(mut self, range: Range) -> Self {
        self.raw = Some(range);
        self
    }

    pub fn with_pct(mut self, range: Range) -> Self {
        self.pct = Some(range);
        self
    }

    pub fn with_si(mut self, range: Range) -> Self {
        self.si = Some(range);
        self
    }

    pub fn with_symbol(mut self, symbol: &str) -> Result<Self, ProfileError> {
        let symbol =
            Vec::from_slice(symbol.as_bytes()).map_err(|_| ProfileError::SymbolTooLong)?;
        self.symbol = Some(symbol);
        Ok(self)
    }

    /// Payload bytes of one DATA frame in this mode.
    pub fn data_len(&self) -> usize {
        self.data_sets as usize * self.format.width()
    }

    /// INFO frames for this mode in the order a device sends them, FORMAT
    /// last.
    fn info_frames(
        &self,
        mode: u8,
        out: &mut Vec<Frame, MAX_ANNOUNCE_FRAMES>,
    ) -> Result<(), ProfileError> {
        let mut push =
            |field: InfoField, data: &[u8]| push_frame(out, Frame::info(mode, field, data));

        push(InfoField::Name, self.name.as_slice())?;
        if let Some(r) = self.raw {
            push(InfoField::Raw, &r.to_le_bytes())?;
        }
        if let Some(r) = self.pct {
            push(InfoField::Pct, &r.to_le_bytes())?;
        }
        if let Some(r) = self.si {
            push(InfoField::Si, &r.to_le_bytes())?;
        }
        if let Some(s) = self.symbol.as_ref().filter(|s| !s.is_empty()) {
            push(InfoField::Symbol, s.as_slice())?;
        }
        push(
            InfoField::Format,
            &[self.data_sets, self.format.code(), self.figures, self.decimals],
        )
    }
}

// Builders only fail on empty or oversized data, which profiles rule out.
fn push_frame(
    frames: &mut Vec<Frame, MAX_ANNOUNCE_FRAMES>,
    frame: Option<Frame>,
) -> Result<(), ProfileError> {
    let frame = frame.ok_or(ProfileError::BufferFull)?;
    frames.push(frame).map_err(|_| ProfileError::BufferFull)
}

/// A complete device: type id, modes and the rate it asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    device_type: u8,
    modes: Vec<ModeProfile, MAX_MODES>,
    views: Option<u8>,
    speed: Option<u32>,
}

impl DeviceProfile {
    pub fn new(device_type: u8) -> Self {
        DeviceProfile {
            device_type,
            modes: Vec::new(),
            views: None,
            speed: None,
        }
    }

    /// Appends the next mode; modes are numbered in the order added.
    pub fn with_mode(mut self, mode: ModeProfile) -> Result<Self, ProfileError> {
        self.modes.push(mode).map_err(|_| ProfileError::TooManyModes)?;
        Ok(self)
    }

    /// Number of modes shown in views. Defaults to every mode.
    pub fn with_views(mut self, views: u8) -> Self {
        self.views = Some(views);
        self
    }

    /// Bit rate requested through SPEED.
    pub fn with_speed(mut self, bps: u32) -> Self {
        self.speed = Some(bps);
        self
    }

    pub fn device_type(&self) -> u8 {
        self.device_type
    }

    pub fn mode_count(&self) -> u8 {
        self.modes.len() as u8
    }

    pub fn mode(&self, mode: u8) -> Option<&ModeProfile> {
        self.modes.get(mode as usize)
    }

    /// Frames sent after power-up: TYPE, MODES, SPEED, the INFO set of each
    /// mode from the highest down, then ACK.
    pub fn announce(&self) -> Result<Vec<Frame, MAX_ANNOUNCE_FRAMES>, ProfileError> {
        let count = self.mode_count();
        if count == 0 {
            return Err(ProfileError::UnknownMode(0));
        }
        let mut frames = Vec::new();
        push_frame(&mut frames, Frame::cmd(CmdId::Type, &[self.device_type]))?;
        match self.views {
            Some(views) if views == 0 || views > count => {
                return Err(ProfileError::TooManyViews {
                    views,
                    modes: count,
                })
            }
            Some(views) => {
                push_frame(&mut frames, Frame::cmd(CmdId::Modes, &[count - 1, views - 1]))?
            }
            None => push_frame(&mut frames, Frame::cmd(CmdId::Modes, &[count - 1]))?,
        }
        if let Some(bps) = self.speed {
            push_frame(&mut frames, Frame::cmd(CmdId::Speed, &bps.to_le_bytes()))?;
        }
        for (mode, profile) in self.modes.iter().enumerate().rev() {
            profile.info_frames(mode as u8, &mut frames)?;
        }
        push_frame(&mut frames, Some(Frame::Sys(SysByte::Ack)))?;
        Ok(frames)
    }

    /// Encodes the announcement into `out`.
    pub fn announce_bytes<const N: usize>(
        &self,
        out: &mut Vec<u8, N>,
    ) -> Result<(), ProfileError> {
        for frame in self.announce()? {
            out.extend_from_slice(&frame.encode())
                .map_err(|_| ProfileError::BufferFull)?;
        }
        Ok(())
    }

    /// DATA frame for `mode`, zero-padded like the device pads it.
    pub fn data_frame(&self, mode: u8, payload: &[u8]) -> Result<Frame, ProfileError> {
        let profile = self.mode(mode).ok_or(ProfileError::UnknownMode(mode))?;
        if payload.len() > profile.data_len().max(1) {
            return Err(ProfileError::DataTooLarge(payload.len()));
        }
        Frame::data(mode, payload).ok_or(ProfileError::DataTooLarge(payload.len()))
    }
}
