// src/host/port/mod.rs

//! Per-port protocol state machine.
//!
//! A [`PortEngine`] owns one transport and advances by at most one unit of
//! work per [`tick`](PortEngine::tick): it never waits for bytes, it simply
//! returns and tries again on the next tick.

mod exchange;
mod io_helpers;
mod negotiation;

use log::{debug, info, trace, warn};

use crate::common::{
    checksum::verify_frame,
    codec::FrameDecoder,
    error::{EngineError, NegotiationError, PortFault},
    frame::{Payload, SysByte},
    hal_traits::PortTransport,
    header::{CmdId, Header, MessageClass, BYTE_ACK, MAX_PAYLOAD},
    timing::MODE_SETTLE_MS,
    types::{ConnectionKind, DeviceDescriptor, MAX_MODES},
};
use crate::host::{
    config::EngineConfig,
    sample_log::{RawSample, SampleLog},
    snapshot::{PortSnapshot, PortStatus},
};

use io_helpers::{Outbound, Rx};
use negotiation::Negotiator;

/// Protocol phase of one port. Exactly one is active at a time.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    /// Shut down; waits for a consumer to re-arm the port.
    Idle,
    /// Hard reset: lowest rate, descriptor table cleared.
    Init,
    /// Transport flushed, negotiation state cleared.
    Enable,
    /// Hunting for the TYPE frame.
    Sync,
    /// Waiting for the next negotiation header.
    MessageStart,
    /// Collecting a CMD frame body.
    Cmd,
    /// Collecting an INFO frame body.
    Info,
    /// Draining an unrecognized message of unknown length.
    Escape,
    /// Device ACKed; waiting before we answer.
    AckWait,
    /// Our ACK is going out; switch rate once it has.
    AckInfo,
    /// Steady-state data exchange.
    Data,
    /// No device synced; raw text pass-through.
    Terminal,
    CmdError,
    InfoError,
    DataError,
    /// Parked until `force_reset` or `set_connection_kind`.
    Error,
    /// Tearing down towards `Idle`.
    Exit,
}

impl Phase {
    /// Phases in which a line break restarts the port.
    fn watches_line_break(self) -> bool {
        !matches!(self, Phase::Idle | Phase::Init | Phase::Enable | Phase::Exit)
    }
}

/// Consumer request applied at the start of the port's next tick.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum PortCommand {
    Restart,
    Exit,
}

/// Protocol engine of one port.
#[derive(Debug)]
pub struct PortEngine<T: PortTransport> {
    index: u8,
    transport: T,
    config: EngineConfig,
    phase: Phase,
    connection: ConnectionKind,
    command: Option<PortCommand>,

    decoder: FrameDecoder,
    negotiator: Negotiator,
    descriptors: [DeviceDescriptor; MAX_MODES],
    samples: SampleLog,

    sync_window: [u8; 3],
    /// Ticks spent in the current phase.
    phase_ticks: u32,
    bit_rate: u32,
    target_bit_rate: u32,

    active_mode: u8,
    mode_change_pending: bool,
    data_errors: u8,
    data_ok: bool,
    watchdog: u32,
    break_ticks: u32,
    line_breaks: u32,

    outbound: Outbound,
    pending_write: Option<Payload>,
    terminal_line: Payload,

    fault: Option<PortFault>,
    version: u32,
}

impl<T: PortTransport> PortEngine<T> {
    pub fn new(index: u8, transport: T, config: EngineConfig) -> Self {
        PortEngine {
            index,
            transport,
            config,
            phase: Phase::Init,
            connection: ConnectionKind::Serial,
            command: None,
            decoder: FrameDecoder::new(),
            negotiator: Negotiator::new(),
            descriptors: core::array::from_fn(|_| DeviceDescriptor::unknown()),
            samples: SampleLog::new(),
            sync_window: [0xFF; 3],
            phase_ticks: 0,
            bit_rate: config.lowest_bit_rate,
            target_bit_rate: config.lowest_bit_rate,
            active_mode: 0,
            mode_change_pending: false,
            data_errors: 0,
            data_ok: false,
            watchdog: 0,
            break_ticks: 0,
            line_breaks: 0,
            outbound: Outbound::default(),
            pending_write: None,
            terminal_line: Payload::new(),
            fault: None,
            version: 0,
        }
    }

    // --- Scheduler entry point ---

    /// Advances the port by one tick.
    pub fn tick(&mut self) {
        self.apply_command();

        if self.phase.watches_line_break() && self.check_line_break() {
            self.enter(Phase::Init);
        }

        match self.phase {
            Phase::Idle | Phase::Error => {}
            Phase::Init => self.init(),
            Phase::Enable => self.enable(),
            Phase::Sync => self.sync(),
            Phase::MessageStart | Phase::Cmd | Phase::Info => self.negotiate(),
            Phase::Escape => self.escape(),
            Phase::AckWait => self.ack_wait(),
            Phase::AckInfo => self.ack_info(),
            Phase::Data => self.exchange(),
            Phase::Terminal => self.terminal(),
            Phase::CmdError | Phase::InfoError | Phase::DataError => self.enter(Phase::Error),
            Phase::Exit => self.exit(),
        }

        self.drain_outbound();
        self.samples.tick();
    }

    // --- Consumer interface ---

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn descriptor(&self, mode: u8) -> Result<&DeviceDescriptor, EngineError> {
        self.descriptors
            .get(mode as usize)
            .ok_or(EngineError::InvalidMode(mode))
    }

    pub fn clear_changed_flag(&mut self, mode: u8) -> Result<(), EngineError> {
        let desc = self
            .descriptors
            .get_mut(mode as usize)
            .ok_or(EngineError::InvalidMode(mode))?;
        if desc.changed {
            desc.changed = false;
            self.bump_version();
        }
        Ok(())
    }

    /// Latest logged payload and its age in ticks.
    pub fn latest_sample(&self) -> Option<(&[u8], u32)> {
        self.samples
            .latest()
            .map(|s| (s.payload.as_slice(), s.age_ticks))
    }

    pub fn latest_raw_sample(&self) -> Option<&RawSample> {
        self.samples.latest()
    }

    pub fn samples(&self) -> &SampleLog {
        &self.samples
    }

    /// Makes `mode` the active mode and queues a SELECT for it.
    pub fn request_mode_change(&mut self, mode: u8) -> Result<(), EngineError> {
        if mode as usize >= MAX_MODES {
            return Err(EngineError::InvalidMode(mode));
        }
        let announced = self
            .descriptors
            .iter()
            .find(|d| d.is_known())
            .map(|d| d.modes);
        if announced.is_some_and(|modes| mode >= modes) {
            return Err(EngineError::InvalidMode(mode));
        }
        self.active_mode = mode;
        self.mode_change_pending = true;
        Ok(())
    }

    /// Queues bytes for a WRITE command (or raw output in terminal mode).
    pub fn queue_write(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        if bytes.is_empty() || bytes.len() > MAX_PAYLOAD {
            return Err(EngineError::WritePayloadSize(bytes.len()));
        }
        if self.pending_write.is_some() {
            return Err(EngineError::WriteOutstanding);
        }
        let mut payload = Payload::new();
        payload
            .try_extend_from_slice(bytes)
            .map_err(|_| EngineError::WritePayloadSize(bytes.len()))?;
        self.pending_write = Some(payload);
        Ok(())
    }

    pub fn set_connection_kind(&mut self, kind: ConnectionKind) {
        self.connection = kind;
        self.command = Some(match kind {
            ConnectionKind::Serial => PortCommand::Restart,
            ConnectionKind::None => PortCommand::Exit,
        });
    }

    pub fn force_reset(&mut self) {
        self.command = Some(PortCommand::Restart);
    }

    pub fn status(&self) -> PortStatus {
        PortStatus {
            phase: self.phase,
            connection: self.connection,
            device_type: self.negotiator.device_type(),
            bit_rate: self.bit_rate,
            target_bit_rate: self.target_bit_rate,
            max_bit_rate: self.config.highest_bit_rate,
            active_mode: self.active_mode,
            data_errors: self.data_errors,
            write_pending: self.pending_write.is_some(),
            line_breaks: self.line_breaks,
            fault: self.fault.clone(),
        }
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn snapshot(&self) -> PortSnapshot {
        PortSnapshot {
            port: self.index,
            version: self.version,
            status: self.status(),
            descriptors: self.descriptors.clone(),
            latest: self.samples.latest().cloned(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // --- Phase handlers ---

    fn apply_command(&mut self) {
        let Some(command) = self.command.take() else {
            return;
        };
        match (command, self.connection) {
            (PortCommand::Restart, ConnectionKind::Serial) => {
                info!("port {}: restart requested", self.index);
                self.enter(Phase::Init);
            }
            (PortCommand::Restart, ConnectionKind::None) | (PortCommand::Exit, _) => {
                if self.phase != Phase::Idle {
                    self.enter(Phase::Exit);
                }
            }
        }
    }

    fn check_line_break(&mut self) -> bool {
        if !self.transport.is_line_break_asserted() {
            self.break_ticks = 0;
            return false;
        }
        self.break_ticks += 1;
        if self.break_ticks < self.config.break_detect_ticks {
            return false;
        }
        self.break_ticks = 0;
        self.line_breaks = self.line_breaks.wrapping_add(1);
        info!("port {}: line break in {:?}, restarting", self.index, self.phase);
        true
    }

    fn init(&mut self) {
        let lowest = self.config.lowest_bit_rate;
        if !self.change_bit_rate(lowest) {
            self.fail(Phase::Error, PortFault::Transport);
            return;
        }
        self.target_bit_rate = lowest;
        self.decoder.reset();
        self.negotiator.reset();
        for desc in self.descriptors.iter_mut() {
            *desc = DeviceDescriptor::unknown();
        }
        self.samples.clear();
        self.outbound.clear();
        self.pending_write = None;
        self.terminal_line.clear();
        self.active_mode = 0;
        self.mode_change_pending = false;
        self.data_errors = 0;
        self.data_ok = false;
        self.watchdog = 0;
        self.break_ticks = 0;
        self.fault = None;
        self.bump_version();
        self.enter(Phase::Enable);
    }

    fn enable(&mut self) {
        match self.transport.flush() {
            Ok(()) => {}
            Err(nb::Error::WouldBlock) => return,
            Err(nb::Error::Other(e)) => {
                warn!("port {}: flush failed: {:?}", self.index, e);
                self.fail(Phase::Error, PortFault::Transport);
                return;
            }
        }
        self.decoder.reset();
        self.negotiator.reset();
        self.sync_window = [0xFF; 3];
        self.enter(Phase::Sync);
    }

    fn sync(&mut self) {
        for _ in 0..self.config.max_bytes_per_tick {
            let byte = match self.receive() {
                Rx::Byte(b) => b,
                Rx::Empty => break,
                Rx::Failed => continue,
            };
            self.sync_window = [self.sync_window[1], self.sync_window[2], byte];
            if let Some(device_type) = self.match_type_frame() {
                info!("port {}: device type {} synced", self.index, device_type);
                self.negotiator.set_type(device_type);
                self.enter(Phase::MessageStart);
                return;
            }
        }

        self.phase_ticks += 1;
        if self.phase_ticks >= self.config.sync_timeout_ticks {
            let rate = self.config.terminal_bit_rate;
            info!("port {}: no device synced, terminal mode at {} bps", self.index, rate);
            if self.change_bit_rate(rate) {
                self.terminal_line.clear();
                self.enter(Phase::Terminal);
            } else {
                self.fail(Phase::Error, PortFault::Transport);
            }
        }
    }

    /// Checks the sync window for `{TYPE header, type, check}`.
    fn match_type_frame(&self) -> Option<u8> {
        let [header, device_type, _] = self.sync_window;
        // CMD class, one-byte payload, TYPE field
        let type_header = MessageClass::Cmd.bits() | CmdId::Type.field();
        let valid_type = (1..=self.config.max_valid_type).contains(&device_type);
        (header == type_header && valid_type && verify_frame(&self.sync_window).is_ok())
            .then_some(device_type)
    }

    fn negotiate(&mut self) {
        for _ in 0..self.config.max_bytes_per_tick {
            let byte = match self.receive() {
                Rx::Byte(b) => b,
                Rx::Empty => return,
                Rx::Failed => {
                    let phase = self.negotiation_error_phase();
                    self.fail(phase, PortFault::Transport);
                    return;
                }
            };

            if self.decoder.is_idle() {
                if !self.start_message(byte) {
                    return;
                }
                continue;
            }

            match self.decoder.push(byte) {
                Err(nb::Error::WouldBlock) => {}
                Ok(frame) => {
                    let outcome = self.negotiator.apply(&frame, self.bit_rate, &self.config);
                    match outcome {
                        Ok(Some(mode)) => self.publish(mode),
                        Ok(None) => {}
                        Err(e) => {
                            let phase = self.negotiation_error_phase();
                            self.fail(phase, e.into());
                            return;
                        }
                    }
                    self.enter(Phase::MessageStart);
                    return;
                }
                Err(nb::Error::Other(e)) => {
                    let phase = self.negotiation_error_phase();
                    self.fail(phase, e.into());
                    return;
                }
            }
        }
    }

    /// Classifies a byte seen in MESSAGE_START. Returns `false` when the
    /// port left negotiation for another phase.
    fn start_message(&mut self, byte: u8) -> bool {
        let class = MessageClass::from_header(byte);
        if class == MessageClass::Sys {
            return match SysByte::from_byte(byte) {
                Some(SysByte::Ack) => {
                    if self.negotiator.is_complete() {
                        debug!("port {}: device ACK, negotiation complete", self.index);
                        self.target_bit_rate = self
                            .negotiator
                            .target_bit_rate()
                            .unwrap_or(self.config.lowest_bit_rate);
                        self.enter(Phase::AckWait);
                    } else {
                        self.fail(
                            Phase::InfoError,
                            NegotiationError::IncompleteDescriptors.into(),
                        );
                    }
                    false
                }
                // SYNC, NACK and padding carry nothing here.
                _ => true,
            };
        }

        let recognised = match Header::decode(byte) {
            Ok(h) if h.class == MessageClass::Cmd => matches!(
                CmdId::from_field(h.field),
                CmdId::Type | CmdId::Modes | CmdId::Speed
            ),
            Ok(h) => h.class == MessageClass::Info,
            // A CMD or INFO header with a bad length code is a framing error.
            Err(e) if matches!(class, MessageClass::Cmd | MessageClass::Info) => {
                let phase = if class == MessageClass::Cmd {
                    Phase::CmdError
                } else {
                    Phase::InfoError
                };
                self.fail(phase, e.into());
                return false;
            }
            Err(_) => false,
        };
        if !recognised {
            trace!("port {}: escaping unknown header {:#04x}", self.index, byte);
            self.enter(Phase::Escape);
            return false;
        }

        // Header was decodable, so the decoder only asks for more bytes.
        let _ = self.decoder.push(byte);
        self.enter(if class == MessageClass::Cmd {
            Phase::Cmd
        } else {
            Phase::Info
        });
        true
    }

    fn negotiation_error_phase(&self) -> Phase {
        match self.phase {
            Phase::Cmd => Phase::CmdError,
            _ => Phase::InfoError,
        }
    }

    fn publish(&mut self, mode: u8) {
        let mut desc = self.negotiator.finished(mode);
        desc.connection = ConnectionKind::Serial;
        desc.invalid_time_ms = MODE_SETTLE_MS;
        desc.changed = true;
        debug!(
            "port {}: mode {} described as {:?}",
            self.index,
            mode,
            desc.name_str().unwrap_or("?")
        );
        self.descriptors[mode as usize] = desc;
        self.bump_version();
    }

    fn escape(&mut self) {
        let mut drained = false;
        for _ in 0..self.config.max_bytes_per_tick {
            match self.receive() {
                Rx::Byte(_) => drained = true,
                Rx::Empty => break,
                Rx::Failed => {
                    self.fail(Phase::InfoError, PortFault::Transport);
                    return;
                }
            }
        }
        if !drained {
            self.decoder.reset();
            self.enter(Phase::MessageStart);
        }
    }

    fn ack_wait(&mut self) {
        self.phase_ticks += 1;
        if self.phase_ticks >= self.config.ack_delay_ticks && self.outbound.is_idle() {
            self.outbound.load(&[BYTE_ACK]);
            self.enter(Phase::AckInfo);
        }
    }

    fn ack_info(&mut self) {
        if !self.outbound.is_idle() {
            return;
        }
        match self.transport.flush() {
            Ok(()) => {}
            Err(nb::Error::WouldBlock) => return,
            Err(nb::Error::Other(e)) => {
                warn!("port {}: flush failed: {:?}", self.index, e);
                self.fail(Phase::Error, PortFault::Transport);
                return;
            }
        }

        self.data_errors = 0;
        self.data_ok = false;
        self.watchdog = 0;
        self.active_mode = 0;
        self.mode_change_pending = false;
        self.decoder.reset();

        let target = self.target_bit_rate;
        if target != self.bit_rate && !self.change_bit_rate(target) {
            self.fail(Phase::Error, PortFault::Transport);
            return;
        }
        info!(
            "port {}: device type {} online at {} bps",
            self.index,
            self.negotiator.device_type().unwrap_or(0),
            self.bit_rate
        );
        self.enter(Phase::Data);
    }

    fn exit(&mut self) {
        self.outbound.clear();
        self.pending_write = None;
        self.decoder.reset();
        self.negotiator.reset();
        for desc in self.descriptors.iter_mut() {
            *desc = DeviceDescriptor::unknown();
        }
        self.samples.clear();
        self.bump_version();
        self.enter(Phase::Idle);
    }

    // --- Helpers ---

    fn enter(&mut self, phase: Phase) {
        if phase != self.phase {
            debug!("port {}: {:?} -> {:?}", self.index, self.phase, phase);
        }
        self.phase = phase;
        self.phase_ticks = 0;
    }

    fn fail(&mut self, phase: Phase, fault: PortFault) {
        warn!("port {}: {} in {:?}", self.index, fault, self.phase);
        self.fault = Some(fault);
        self.enter(phase);
    }

    fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
