//! An in-process oscilloscope speaking the command subset this crate uses.
//!
//! `SimulatedScope` handles share their state, so a test can keep one handle, hand a
//! clone to a session through `SimulatedBus`, and inspect the command log afterwards.

use std::{
    f64::consts::PI,
    io::{Cursor, Error, ErrorKind},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tracing::trace;

use super::{InstrumentAddress, Resource, ResourceManager};
use crate::{
    scpi::{
        block::{self, BinaryFormat, ByteWidth, Endianness},
        EventStatusByte,
    },
    waveform::CalibrationScalars,
};

const SEQUENCE: &str = "SEQUENCE";
const RUNSTOP: &str = "RUNSTOP";

#[derive(Debug)]
struct ScopeState {
    identity: String,
    sources: Vec<String>,
    stop_after: String,
    samples: Vec<i16>,
    scalars: CalibrationScalars,
    opc_latency: Option<u32>,
    transfer_status: u8,
    fail_on: Option<String>,

    esr: u8,
    ese: u8,
    sre: u8,
    dese: u8,
    data_source: Option<String>,
    encoding: String,
    byte_width: u8,
    start: u32,
    stop: u32,
    armed: bool,
    opc_countdown: Option<u32>,

    log: Vec<String>,
    acquisitions: u32,
    esr_polls: u32,
    closed: bool,
    close_calls: u32,
}

impl Default for ScopeState {
    fn default() -> Self {
        let samples: Vec<i16> = (0..1000)
            .map(|i| (20000.0 * (2.0 * PI * i as f64 / 250.0).sin()) as i16)
            .collect();
        Self {
            identity: "TEKTRONIX,MSO54,C012345,CF:91.1CT FV:1.28.0".to_string(),
            sources: ["CH1", "CH2", "CH3", "CH4", "MATH1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            stop_after: RUNSTOP.to_string(),
            stop: samples.len() as u32,
            samples,
            scalars: CalibrationScalars {
                y_mult: 5.0e-5,
                y_zero: 0.0,
                x_incr: 4.0e-10,
                x_zero: 0.0,
                pre_trigger_offset: 500,
            },
            opc_latency: Some(3),
            transfer_status: 0,
            fail_on: None,
            esr: 0,
            ese: 0,
            sre: 0,
            dese: 0,
            data_source: None,
            encoding: "RIBINARY".to_string(),
            byte_width: 1,
            start: 1,
            armed: false,
            opc_countdown: None,
            log: Vec::new(),
            acquisitions: 0,
            esr_polls: 0,
            closed: false,
            close_calls: 0,
        }
    }
}

fn split(command: &str) -> (String, &str) {
    let command = command.trim();
    match command.split_once(char::is_whitespace) {
        Some((header, arg)) => (header.to_ascii_uppercase(), arg.trim()),
        None => (command.to_ascii_uppercase(), ""),
    }
}

fn no_reply(command: &str) -> Error {
    Error::new(
        ErrorKind::TimedOut,
        format!("no reply to '{}'", command),
    )
}

impl ScopeState {
    fn check(&mut self, command: &str) -> std::io::Result<()> {
        if self.closed {
            return Err(Error::new(ErrorKind::NotConnected, "Not Connected"));
        }
        self.log.push(command.to_string());
        let header = split(command).0;
        match &self.fail_on {
            Some(prefix) if header.starts_with(prefix.as_str()) => Err(Error::new(
                ErrorKind::TimedOut,
                format!("simulated I/O failure on '{}'", command),
            )),
            _ => Ok(()),
        }
    }

    fn write(&mut self, command: &str) -> std::io::Result<()> {
        self.check(command)?;
        let (header, arg) = split(command);
        let number = |arg: &str| arg.parse::<u32>().ok();
        match header.as_str() {
            "*CLS" => self.esr = 0,
            "*ESE" => self.ese = number(arg).unwrap_or(0) as u8,
            "*SRE" => self.sre = number(arg).unwrap_or(0) as u8,
            "DESE" => self.dese = number(arg).unwrap_or(0) as u8,
            "*OPC" => {
                if self.armed {
                    self.opc_countdown = self.opc_latency;
                } else {
                    self.esr |= EventStatusByte::OPERATION_COMPLETE;
                }
            }
            "ACQUIRE:STOPAFTER" => {
                self.stop_after = if arg.to_ascii_uppercase().starts_with("SEQ") {
                    SEQUENCE.to_string()
                } else {
                    RUNSTOP.to_string()
                };
            }
            "ACQUIRE:STATE" => {
                if matches!(arg.to_ascii_uppercase().as_str(), "ON" | "1" | "RUN") {
                    self.armed = true;
                    self.acquisitions += 1;
                }
            }
            "DATA:SOURCE" => self.data_source = Some(arg.to_ascii_uppercase()),
            "DATA:ENCDG" => self.encoding = arg.to_ascii_uppercase(),
            "WFMOUTPRE:BYT_NR" => self.byte_width = number(arg).unwrap_or(1) as u8,
            "DATA:START" => self.start = number(arg).unwrap_or(1),
            "DATA:STOP" => self.stop = number(arg).unwrap_or(1),
            _ => self.esr |= EventStatusByte::COMMAND_ERROR,
        }
        Ok(())
    }

    fn query(&mut self, command: &str) -> std::io::Result<String> {
        self.check(command)?;
        let (header, _) = split(command);
        let reply = match header.as_str() {
            "*IDN?" => self.identity.clone(),
            "*ESR?" => {
                self.esr_polls += 1;
                if let Some(left) = self.opc_countdown {
                    if left <= 1 {
                        self.esr |= EventStatusByte::OPERATION_COMPLETE;
                        self.opc_countdown = None;
                        self.armed = false;
                    } else {
                        self.opc_countdown = Some(left - 1);
                    }
                }
                let value = self.esr;
                self.esr = 0;
                value.to_string()
            }
            "ACQUIRE:STOPAFTER?" => self.stop_after.clone(),
            "DATA:SOURCE:AVAILABLE?" => self.sources.join(","),
            "HORIZONTAL:RECORDLENGTH?" => self.samples.len().to_string(),
            "WFMOUTPRE:YMULT?" => self.scalars.y_mult.to_string(),
            "WFMOUTPRE:YZERO?" => self.scalars.y_zero.to_string(),
            "WFMOUTPRE:XINCR?" => self.scalars.x_incr.to_string(),
            "WFMOUTPRE:XZERO?" => self.scalars.x_zero.to_string(),
            "WFMOUTPRE:PT_OFF?" => self.scalars.pre_trigger_offset.to_string(),
            _ => {
                self.esr |= EventStatusByte::COMMAND_ERROR;
                return Err(no_reply(command));
            }
        };
        trace!(command, reply = %reply, "simulated reply");
        Ok(reply)
    }

    /// Encodes the selected window the way the instrument is configured, so the caller's
    /// decode settings are really exercised.
    fn curve(&mut self, command: &str) -> std::io::Result<Vec<u8>> {
        self.check(command)?;
        if split(command).0 != "CURVE?" {
            self.esr |= EventStatusByte::COMMAND_ERROR;
            return Err(no_reply(command));
        }
        let source_ok = self
            .data_source
            .as_ref()
            .map(|s| self.sources.contains(s))
            .unwrap_or(false);
        let (start, stop) = (self.start as usize, self.stop as usize);
        if !source_ok || start == 0 || start > stop || stop > self.samples.len() {
            self.esr |= EventStatusByte::EXECUTION_ERROR;
            return Err(no_reply(command));
        }
        let endianness = if self.encoding.starts_with("SR") {
            Endianness::Little
        } else if self.encoding.starts_with("RI") || self.encoding.starts_with("RP") {
            Endianness::Big
        } else {
            self.esr |= EventStatusByte::EXECUTION_ERROR;
            return Err(no_reply(command));
        };
        let width = ByteWidth::try_from(self.byte_width).unwrap_or(ByteWidth::One);
        let window = &self.samples[start - 1..stop];
        let encoded = match width {
            ByteWidth::One => window.iter().map(|&s| (s >> 8) as i16).collect(),
            ByteWidth::Two => window.to_vec(),
        };
        let wire = block::encode_block(&encoded, BinaryFormat::new(width, endianness), b'\n');
        self.esr |= self.transfer_status;
        Ok(wire)
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedScope {
    address: InstrumentAddress,
    state: Arc<Mutex<ScopeState>>,
}

impl SimulatedScope {
    /// A 5-series MSO with a 1000 point sine on every channel.
    pub fn new(address: InstrumentAddress) -> Self {
        Self {
            address,
            state: Arc::new(Mutex::new(ScopeState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, ScopeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_identity<S: Into<String>>(self, identity: S) -> Self {
        self.state().identity = identity.into();
        self
    }
    pub fn with_sources(self, sources: &[&str]) -> Self {
        self.state().sources = sources.iter().map(|s| s.to_string()).collect();
        self
    }
    /// Replaces the record; the record length follows the sample count.
    pub fn with_samples(self, samples: Vec<i16>) -> Self {
        {
            let mut state = self.state();
            state.stop = samples.len() as u32;
            state.samples = samples;
        }
        self
    }
    pub fn with_scalars(self, scalars: CalibrationScalars) -> Self {
        self.state().scalars = scalars;
        self
    }
    pub fn with_stop_after<S: Into<String>>(self, mode: S) -> Self {
        self.state().stop_after = mode.into();
        self
    }
    /// The event status register reports operation complete on the `polls`-th read
    /// after `*OPC`; `None` never completes.
    pub fn completing_after(self, polls: Option<u32>) -> Self {
        self.state().opc_latency = polls;
        self
    }
    /// Event status bits latched by the next curve transfer.
    pub fn with_transfer_status(self, bits: u8) -> Self {
        self.state().transfer_status = bits;
        self
    }
    /// Every command whose header starts with `prefix` fails at the transport level.
    pub fn failing_on<S: Into<String>>(self, prefix: S) -> Self {
        self.state().fail_on = Some(prefix.into().to_ascii_uppercase());
        self
    }

    pub fn address_ref(&self) -> &InstrumentAddress {
        &self.address
    }
    /// Everything sent to the instrument, in order.
    pub fn commands(&self) -> Vec<String> {
        self.state().log.clone()
    }
    pub fn acquisitions(&self) -> u32 {
        self.state().acquisitions
    }
    pub fn esr_polls(&self) -> u32 {
        self.state().esr_polls
    }
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
    pub fn close_calls(&self) -> u32 {
        self.state().close_calls
    }

    fn reopen(&self) {
        self.state().closed = false;
    }
}

impl Resource for SimulatedScope {
    fn address(&self) -> &InstrumentAddress {
        &self.address
    }

    fn write(&mut self, command: &str) -> std::io::Result<()> {
        self.state().write(command)
    }

    fn query(&mut self, command: &str) -> std::io::Result<String> {
        self.state().query(command)
    }

    fn query_binary(
        &mut self,
        command: &str,
        format: BinaryFormat,
        count: usize,
    ) -> std::io::Result<Vec<i16>> {
        let wire = self.state().curve(command)?;
        let payload = block::read_block(
            &mut Cursor::new(wire),
            b'\n',
            Some(count * format.width.bytes()),
        )?;
        block::decode_samples(payload, format, Some(count))
    }

    fn close(&mut self) -> std::io::Result<()> {
        let mut state = self.state();
        state.closed = true;
        state.close_calls += 1;
        Ok(())
    }
}

#[derive(Debug, Clone)]
enum Slot {
    Unopenable(InstrumentAddress),
    Scope(SimulatedScope),
}

impl Slot {
    fn address(&self) -> &InstrumentAddress {
        match self {
            Slot::Unopenable(address) => address,
            Slot::Scope(scope) => scope.address_ref(),
        }
    }
}

/// Resource manager over simulated instruments, enumerated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    slots: Vec<Slot>,
    opened: Vec<InstrumentAddress>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }
    /// One MSO54 at `SIM::MSO54`.
    pub fn demo() -> Self {
        Self::new().with_scope(SimulatedScope::new(InstrumentAddress::simulated("MSO54")))
    }
    pub fn with_scope(mut self, scope: SimulatedScope) -> Self {
        self.slots.push(Slot::Scope(scope));
        self
    }
    /// A listed resource that refuses to open.
    pub fn with_unopenable(mut self, address: InstrumentAddress) -> Self {
        self.slots.push(Slot::Unopenable(address));
        self
    }
    /// Addresses successfully opened so far, in order.
    pub fn opened(&self) -> &[InstrumentAddress] {
        &self.opened
    }
}

impl ResourceManager for SimulatedBus {
    fn list(&self) -> std::io::Result<Vec<InstrumentAddress>> {
        Ok(self.slots.iter().map(|s| s.address().clone()).collect())
    }

    fn open(&mut self, address: &InstrumentAddress) -> std::io::Result<Box<dyn Resource>> {
        match self.slots.iter().find(|s| s.address() == address) {
            Some(Slot::Scope(scope)) => {
                scope.reopen();
                self.opened.push(address.clone());
                Ok(Box::new(scope.clone()))
            }
            Some(Slot::Unopenable(_)) => Err(Error::new(
                ErrorKind::ConnectionRefused,
                format!("'{}' refused the connection", address),
            )),
            None => Err(Error::new(
                ErrorKind::NotFound,
                format!("no resource '{}'", address),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> SimulatedScope {
        SimulatedScope::new(InstrumentAddress::simulated("T"))
    }

    #[test]
    fn answers_identity_and_sources() {
        let mut s = scope().with_sources(&["CH1", "CH2"]);
        assert!(s.query("*IDN?").unwrap().contains("MSO54"));
        assert_eq!(s.query("DATa:SOUrce:AVAILable?").unwrap(), "CH1,CH2");
        assert_eq!(s.commands(), vec!["*IDN?", "DATa:SOUrce:AVAILable?"]);
    }

    #[test]
    fn unknown_command_sets_command_error() {
        let mut s = scope();
        s.write("BOGus 1").unwrap();
        let esr: u8 = s.query("*ESR?").unwrap().parse().unwrap();
        assert!(EventStatusByte::new(esr).is_command_err());
        assert_eq!(s.query("*ESR?").unwrap(), "0");
    }

    #[test]
    fn curve_follows_configured_encoding() {
        let mut s = scope().with_samples(vec![256, -512, 1024]);
        s.write("DATa:SOUrce CH1").unwrap();
        s.write("DATa:ENCdg SRIbinary").unwrap();
        s.write("WFMOutpre:BYT_Nr 2").unwrap();
        let le = BinaryFormat::new(ByteWidth::Two, Endianness::Little);
        assert_eq!(s.query_binary("CURVe?", le, 3).unwrap(), vec![256, -512, 1024]);

        s.write("WFMOutpre:BYT_Nr 1").unwrap();
        let one = BinaryFormat::new(ByteWidth::One, Endianness::Little);
        assert_eq!(s.query_binary("CURVe?", one, 3).unwrap(), vec![1, -2, 4]);
    }

    #[test]
    fn closed_scope_refuses_io() {
        let mut s = scope();
        s.close().unwrap();
        assert_eq!(
            s.query("*IDN?").unwrap_err().kind(),
            ErrorKind::NotConnected
        );
        assert_eq!(s.close_calls(), 1);
    }

    #[test]
    fn bus_opens_shared_handles() {
        let watched = scope();
        let mut bus = SimulatedBus::new()
            .with_unopenable("SIM::DEAD".parse().unwrap())
            .with_scope(watched.clone());
        assert_eq!(bus.list().unwrap().len(), 2);
        assert!(bus.open(&"SIM::DEAD".parse().unwrap()).is_err());
        let mut handle = bus.open(&InstrumentAddress::simulated("T")).unwrap();
        handle.write("*CLS").unwrap();
        assert_eq!(watched.commands(), vec!["*CLS"]);
        assert_eq!(bus.opened().len(), 1);
    }
}
