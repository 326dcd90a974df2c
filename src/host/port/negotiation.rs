// src/host/port/negotiation.rs

//! Capability negotiation: turns the CMD/INFO frames a device sends after
//! SYNC into per-mode descriptors.

use log::trace;

use crate::common::{
    error::NegotiationError,
    frame::Frame,
    header::{CmdId, InfoField},
    types::{trim_nul, DataFormat, DeviceDescriptor, Range, MAX_MODES, NAME_LEN, SYMBOL_LEN},
};
use crate::host::config::EngineConfig;

// Commands already seen in this negotiation.
const SEEN_TYPE: u8 = 0x01;
const SEEN_MODES: u8 = 0x02;
const SEEN_SPEED: u8 = 0x04;

/// Staged negotiation state of one port.
#[derive(Debug, Clone)]
pub(crate) struct Negotiator {
    staged: [DeviceDescriptor; MAX_MODES],
    /// INFO fields received, per mode (see `InfoField::flag`).
    mode_fields: [u8; MAX_MODES],
    seen_cmds: u8,
    device_type: Option<u8>,
    modes: u8,
    views: u8,
    remaining_modes: u8,
    target_bit_rate: Option<u32>,
}

impl Negotiator {
    pub(crate) fn new() -> Self {
        Negotiator {
            staged: core::array::from_fn(|_| DeviceDescriptor::unknown()),
            mode_fields: [0; MAX_MODES],
            seen_cmds: 0,
            device_type: None,
            modes: 0,
            views: 0,
            remaining_modes: 0,
            target_bit_rate: None,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    pub(crate) fn device_type(&self) -> Option<u8> {
        self.device_type
    }

    /// Target rate requested by SPEED, if the device sent one.
    pub(crate) fn target_bit_rate(&self) -> Option<u32> {
        self.target_bit_rate
    }

    /// Records the type carried by the SYNC frame.
    pub(crate) fn set_type(&mut self, device_type: u8) {
        self.device_type = Some(device_type);
        self.seen_cmds |= SEEN_TYPE;
    }

    /// `true` once every announced mode has its mandatory set and no FORMAT
    /// is outstanding.
    pub(crate) fn is_complete(&self) -> bool {
        self.device_type.is_some()
            && self.seen_cmds & SEEN_MODES != 0
            && self.remaining_modes == 0
            && (0..self.modes as usize).all(|m| self.mode_complete(m))
    }

    fn mode_complete(&self, mode: usize) -> bool {
        let needed = InfoField::Name.flag() | InfoField::Format.flag();
        self.mode_fields[mode] & needed == needed
    }

    /// Applies one CMD or INFO frame.
    ///
    /// Returns `Ok(Some(mode))` when `mode` has its mandatory set after this
    /// frame; the port then publishes [`Self::finished`] for it.
    pub(crate) fn apply(
        &mut self,
        frame: &Frame,
        current_rate: u32,
        config: &EngineConfig,
    ) -> Result<Option<u8>, NegotiationError> {
        match frame {
            Frame::Cmd { cmd, payload } => {
                self.apply_cmd(*cmd, payload, current_rate, config)?;
                Ok(None)
            }
            Frame::Info {
                mode,
                field,
                payload,
            } => self.apply_info(*mode, *field, payload),
            // The port never routes SYS or DATA here.
            Frame::Sys(_) | Frame::Data { .. } => Ok(None),
        }
    }

    fn apply_cmd(
        &mut self,
        cmd: CmdId,
        payload: &[u8],
        current_rate: u32,
        config: &EngineConfig,
    ) -> Result<(), NegotiationError> {
        let bit = match cmd {
            CmdId::Type => SEEN_TYPE,
            CmdId::Modes => SEEN_MODES,
            CmdId::Speed => SEEN_SPEED,
            // The port escapes these before they are decoded.
            CmdId::Select | CmdId::Write | CmdId::Unknown(_) => return Ok(()),
        };
        if self.seen_cmds & bit != 0 {
            return Err(NegotiationError::DuplicateCommand(cmd));
        }

        match cmd {
            CmdId::Modes => {
                let highest = payload.first().copied().unwrap_or(0);
                if highest as usize >= MAX_MODES {
                    return Err(NegotiationError::ModeOutOfRange(highest));
                }
                let views_highest = match payload.get(1) {
                    Some(v) if *v > highest => return Err(NegotiationError::ModeOutOfRange(*v)),
                    Some(v) => *v,
                    None => highest,
                };
                self.modes = highest + 1;
                self.views = views_highest + 1;
                self.remaining_modes = self.modes;
                trace!("device announces {} modes, {} in views", self.modes, self.views);
            }
            CmdId::Speed => {
                if payload.len() < 4 {
                    return Err(NegotiationError::BitRateOutOfRange(0));
                }
                let requested = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
                if !config.rate_in_range(requested) {
                    return Err(NegotiationError::BitRateOutOfRange(requested));
                }
                let target = config.scaled_target_rate(current_rate, requested);
                trace!("device requests {} bps, target {} bps", requested, target);
                self.target_bit_rate = Some(target);
            }
            _ => {}
        }
        self.seen_cmds |= bit;
        Ok(())
    }

    fn apply_info(
        &mut self,
        mode: u8,
        field: InfoField,
        payload: &[u8],
    ) -> Result<Option<u8>, NegotiationError> {
        if self.seen_cmds & SEEN_MODES == 0 {
            return Err(NegotiationError::ModesUnknown);
        }
        if mode >= self.modes {
            return Err(NegotiationError::ModeOutOfRange(mode));
        }
        if let InfoField::Unknown(id) = field {
            trace!("ignoring unknown INFO field {:#04x} for mode {}", id, mode);
            return Ok(None);
        }

        let idx = mode as usize;
        if self.mode_fields[idx] & field.flag() != 0 {
            return Err(NegotiationError::DuplicateInfo { mode, field });
        }

        let staged = &mut self.staged[idx];
        match field {
            InfoField::Name => {
                let name = trim_nul(payload);
                let valid_start = name.first().is_some_and(|b| b.is_ascii_alphabetic());
                if !valid_start || name.len() > NAME_LEN {
                    return Err(NegotiationError::InvalidName);
                }
                staged.name.clear();
                // Length checked above.
                let _ = staged.name.extend_from_slice(name);
            }
            InfoField::Raw | InfoField::Pct | InfoField::Si => {
                let range =
                    Range::from_le_bytes(payload).ok_or(NegotiationError::PayloadTooShort(field))?;
                match field {
                    InfoField::Raw => staged.raw = range,
                    InfoField::Pct => staged.pct = range,
                    _ => staged.si = range,
                }
            }
            InfoField::Symbol => {
                let symbol = trim_nul(payload);
                if symbol.len() > SYMBOL_LEN {
                    return Err(NegotiationError::SymbolTooLong);
                }
                staged.symbol.clear();
                let _ = staged.symbol.extend_from_slice(symbol);
            }
            InfoField::Format => {
                if payload.len() < 4 {
                    return Err(NegotiationError::PayloadTooShort(field));
                }
                if self.remaining_modes == 0 {
                    return Err(NegotiationError::ModesExhausted);
                }
                if payload[0] == 0 {
                    return Err(NegotiationError::ZeroDataSets);
                }
                staged.format = DataFormat::from_code(payload[1])
                    .ok_or(NegotiationError::InvalidFormat(payload[1]))?;
                staged.data_sets = payload[0];
                staged.figures = payload[2];
                staged.decimals = payload[3];
                self.remaining_modes -= 1;
            }
            InfoField::Unknown(_) => {}
        }
        self.mode_fields[idx] |= field.flag();
        trace!("mode {}: {:?} received", mode, field);

        // Fields may arrive in any order; once the mandatory set is in, every
        // further field republishes the mode.
        let publish = self.device_type.is_some() && self.mode_complete(idx);
        Ok(publish.then_some(mode))
    }

    /// Finished descriptor of `mode`, stamped with the device-wide fields.
    pub(crate) fn finished(&self, mode: u8) -> DeviceDescriptor {
        let mut desc = self.staged[mode as usize & (MAX_MODES - 1)].clone();
        desc.device_type = self.device_type.unwrap_or(desc.device_type);
        desc.modes = self.modes;
        desc.views = self.views;
        desc
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> EngineConfig {
        EngineConfig::default()
    }

    fn modes(n_minus_one: u8) -> Frame {
        Frame::cmd(CmdId::Modes, &[n_minus_one]).unwrap()
    }

    fn name(mode: u8, text: &[u8]) -> Frame {
        Frame::info(mode, InfoField::Name, text).unwrap()
    }

    fn format(mode: u8, sets: u8, code: u8) -> Frame {
        Frame::info(mode, InfoField::Format, &[sets, code, 4, 0]).unwrap()
    }

    fn negotiator_with_type() -> Negotiator {
        let mut n = Negotiator::new();
        n.set_type(29);
        n
    }

    #[test]
    fn test_format_completes_mode() {
        let mut n = negotiator_with_type();
        assert_eq!(n.apply(&modes(0), 2400, &cfg()), Ok(None));
        assert_eq!(n.apply(&name(0, b"COL-REFLECT"), 2400, &cfg()), Ok(None));
        assert!(!n.is_complete());
        assert_eq!(n.apply(&format(0, 1, 1), 2400, &cfg()), Ok(Some(0)));
        assert!(n.is_complete());

        let d = n.finished(0);
        assert_eq!(d.device_type, 29);
        assert_eq!(d.name_str(), Some("COL-REFLECT"));
        assert_eq!(d.format, DataFormat::Int16);
        assert_eq!(d.figures, 4);
        assert_eq!(d.modes, 1);
    }

    #[test]
    fn test_format_without_name_does_not_publish() {
        let mut n = negotiator_with_type();
        n.apply(&modes(0), 2400, &cfg()).unwrap();
        assert_eq!(n.apply(&format(0, 1, 0), 2400, &cfg()), Ok(None));
        assert!(!n.is_complete());
    }

    #[test]
    fn test_name_after_format_publishes() {
        let mut n = negotiator_with_type();
        n.apply(&modes(0), 2400, &cfg()).unwrap();
        assert_eq!(n.apply(&format(0, 2, 0), 2400, &cfg()), Ok(None));
        assert_eq!(n.apply(&name(0, b"LATE"), 2400, &cfg()), Ok(Some(0)));
        assert!(n.is_complete());
        assert_eq!(n.finished(0).name_str(), Some("LATE"));
        assert_eq!(n.finished(0).data_sets, 2);
    }

    #[test]
    fn test_optional_field_after_format_republishes() {
        let mut n = negotiator_with_type();
        n.apply(&modes(0), 2400, &cfg()).unwrap();
        n.apply(&name(0, b"TEMP"), 2400, &cfg()).unwrap();
        assert_eq!(n.apply(&format(0, 1, 1), 2400, &cfg()), Ok(Some(0)));
        let symbol = Frame::info(0, InfoField::Symbol, b"DEGC").unwrap();
        assert_eq!(n.apply(&symbol, 2400, &cfg()), Ok(Some(0)));
        assert_eq!(n.finished(0).symbol_str(), Some("DEGC"));
    }

    #[test]
    fn test_duplicate_command() {
        let mut n = negotiator_with_type();
        n.apply(&modes(2), 2400, &cfg()).unwrap();
        assert_eq!(
            n.apply(&modes(2), 2400, &cfg()),
            Err(NegotiationError::DuplicateCommand(CmdId::Modes))
        );
        let ty = Frame::cmd(CmdId::Type, &[29]).unwrap();
        assert_eq!(
            n.apply(&ty, 2400, &cfg()),
            Err(NegotiationError::DuplicateCommand(CmdId::Type))
        );
    }

    #[test]
    fn test_views_default_to_modes() {
        let mut n = negotiator_with_type();
        n.apply(&modes(5), 2400, &cfg()).unwrap();
        assert_eq!(n.modes, 6);
        assert_eq!(n.views, 6);

        let mut n = negotiator_with_type();
        let frame = Frame::cmd(CmdId::Modes, &[7, 3]).unwrap();
        n.apply(&frame, 2400, &cfg()).unwrap();
        assert_eq!(n.modes, 8);
        assert_eq!(n.views, 4);
    }

    #[test]
    fn test_speed_range_and_scaling() {
        let mut n = negotiator_with_type();
        let speed = Frame::cmd(CmdId::Speed, &57_600u32.to_le_bytes()).unwrap();
        n.apply(&speed, 2400, &cfg()).unwrap();
        assert_eq!(n.target_bit_rate(), Some(57_600));

        let mut n = negotiator_with_type();
        let speed = Frame::cmd(CmdId::Speed, &28_800u32.to_le_bytes()).unwrap();
        n.apply(&speed, 115_200, &cfg()).unwrap();
        assert_eq!(n.target_bit_rate(), Some(1_382_400));

        let mut n = negotiator_with_type();
        let speed = Frame::cmd(CmdId::Speed, &1_200u32.to_le_bytes()).unwrap();
        assert_eq!(
            n.apply(&speed, 2400, &cfg()),
            Err(NegotiationError::BitRateOutOfRange(1_200))
        );
    }

    #[test]
    fn test_info_rules() {
        let mut n = negotiator_with_type();
        assert_eq!(
            n.apply(&name(0, b"US-DIST-CM"), 2400, &cfg()),
            Err(NegotiationError::ModesUnknown)
        );
        n.apply(&modes(1), 2400, &cfg()).unwrap();
        assert_eq!(
            n.apply(&name(2, b"US-DIST-CM"), 2400, &cfg()),
            Err(NegotiationError::ModeOutOfRange(2))
        );
        assert_eq!(
            n.apply(&name(1, b"1ABC"), 2400, &cfg()),
            Err(NegotiationError::InvalidName)
        );
        assert_eq!(
            n.apply(&name(1, b"ABCDEFGHIJKLM"), 2400, &cfg()),
            Err(NegotiationError::InvalidName)
        );
        n.apply(&name(1, b"US-DIST-IN"), 2400, &cfg()).unwrap();
        assert_eq!(
            n.apply(&name(1, b"US-DIST-IN"), 2400, &cfg()),
            Err(NegotiationError::DuplicateInfo {
                mode: 1,
                field: InfoField::Name
            })
        );
        assert_eq!(
            n.apply(&format(1, 0, 1), 2400, &cfg()),
            Err(NegotiationError::ZeroDataSets)
        );
        assert_eq!(
            n.apply(&format(1, 1, 9), 2400, &cfg()),
            Err(NegotiationError::InvalidFormat(9))
        );
        let symbol = Frame::info(1, InfoField::Symbol, b"INCHES").unwrap();
        assert_eq!(
            n.apply(&symbol, 2400, &cfg()),
            Err(NegotiationError::SymbolTooLong)
        );
    }

    #[test]
    fn test_ranges_and_symbol() {
        let mut n = negotiator_with_type();
        n.apply(&modes(0), 2400, &cfg()).unwrap();
        let si = Range::new(0.0, 255.0).to_le_bytes();
        n.apply(&Frame::info(0, InfoField::Si, &si).unwrap(), 2400, &cfg())
            .unwrap();
        n.apply(&Frame::info(0, InfoField::Symbol, b"cm").unwrap(), 2400, &cfg())
            .unwrap();
        n.apply(&name(0, b"DIST"), 2400, &cfg()).unwrap();
        n.apply(&format(0, 1, 3), 2400, &cfg()).unwrap();
        let d = n.finished(0);
        assert_eq!(d.si, Range::new(0.0, 255.0));
        assert_eq!(d.symbol_str(), Some("cm"));
        assert_eq!(d.pct, Range::new(0.0, 100.0));
    }

    #[test]
    fn test_modes_exhausted() {
        let mut n = negotiator_with_type();
        n.apply(&modes(0), 2400, &cfg()).unwrap();
        n.apply(&format(0, 1, 0), 2400, &cfg()).unwrap();
        // Mode 0 FORMAT again is a duplicate before it is an exhaustion.
        assert!(matches!(
            n.apply(&format(0, 1, 0), 2400, &cfg()),
            Err(NegotiationError::DuplicateInfo { .. })
        ));
    }

    #[test]
    fn test_incomplete_until_every_mode() {
        let mut n = negotiator_with_type();
        n.apply(&modes(1), 2400, &cfg()).unwrap();
        n.apply(&name(1, b"B"), 2400, &cfg()).unwrap();
        assert_eq!(n.apply(&format(1, 1, 0), 2400, &cfg()), Ok(Some(1)));
        assert!(!n.is_complete());
        n.apply(&name(0, b"A"), 2400, &cfg()).unwrap();
        assert_eq!(n.apply(&format(0, 1, 0), 2400, &cfg()), Ok(Some(0)));
        assert!(n.is_complete());
    }
}
