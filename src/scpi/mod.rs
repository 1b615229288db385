use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

pub mod block;
pub mod channel;
pub mod common;

pub use self::block::{BinaryFormat, ByteWidth, Endianness};
pub use self::channel::CommandChannel;
pub use self::common::Common;

/// Message exchange with an instrument that understands SCPI.
///
/// Implementors only provide the three raw exchanges; the IEEE 488.2 status handling
/// shared by every instrument is built on top of them.
pub trait Scpi {
    fn scpi_send<C: AsRef<str>>(&mut self, command: C) -> Result<()>;
    fn scpi_query<C: AsRef<str>>(&mut self, command: C) -> Result<String>;
    fn scpi_query_binary<C: AsRef<str>>(
        &mut self,
        command: C,
        format: BinaryFormat,
        count: usize,
    ) -> Result<Vec<i16>>;

    /// Queries and returns the last whitespace separated field of the reply, which strips
    /// a command header the instrument may echo in front of the value.
    fn query_field<C: AsRef<str>>(&mut self, command: C) -> Result<String> {
        let reply = self.scpi_query(command.as_ref())?;
        Ok(last_field(&reply).to_string())
    }

    fn query_value<T: FromStr, C: AsRef<str>>(&mut self, command: C) -> Result<T> {
        let field = self.query_field(command.as_ref())?;
        field
            .parse()
            .map_err(|_| Error::invalid_response(command, &field))
    }

    fn identify(&mut self) -> Result<String> {
        self.scpi_query(Common::Identify.to_command())
    }
    fn clear_status(&mut self) -> Result<()> {
        self.scpi_send(Common::ClearStatus.to_command())
    }
    fn get_event_byte(&mut self) -> Result<EventStatusByte> {
        let value: u8 = self.query_value(Common::EventStatusRegister.to_command())?;
        Ok(EventStatusByte::new(value))
    }
    fn set_event_mask(&mut self, byte: EventStatusByte) -> Result<()> {
        self.scpi_send(
            Common::EventStatusEnable
                .to_command()
                .para(byte.to_string()),
        )
    }
    fn set_service_mask(&mut self, byte: StatusByte) -> Result<()> {
        self.scpi_send(
            Common::ServiceRequestEnable
                .to_command()
                .para(byte.to_string()),
        )
    }
    fn operation_complete(&mut self) -> Result<()> {
        self.scpi_send(Common::OperationComplete.to_command())
    }
}

pub(crate) fn last_field(reply: &str) -> &str {
    reply.split_whitespace().last().unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command(String);

impl Command {
    pub fn new<S: ToString>(s: S) -> Self {
        Self(s.to_string())
    }
    pub fn query(mut self) -> Self {
        self.0.push('?');
        self
    }
    pub fn para<P: AsRef<str>>(mut self, para: P) -> Self {
        self.0.push(' ');
        self.0.push_str(para.as_ref());
        self
    }
    pub fn into_inner(self) -> String {
        self.0
    }
}
impl AsRef<[u8]> for Command {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}
impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub trait ToCommand {
    fn to_command(&self) -> Command;
}

/// IEEE 488.2 service request enable mask, written with `*SRE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusByte(u8);
impl StatusByte {
    pub fn new(b: u8) -> Self {
        Self(b)
    }
}

/// IEEE 488.2 standard event status register, read (and cleared) with `*ESR?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventStatusByte(u8);
impl EventStatusByte {
    pub const OPERATION_COMPLETE: u8 = 1 << 0;
    pub const QUERY_ERROR: u8 = 1 << 2;
    pub const DEVICE_DEPENDENT_ERROR: u8 = 1 << 3;
    pub const EXECUTION_ERROR: u8 = 1 << 4;
    pub const COMMAND_ERROR: u8 = 1 << 5;
    /// Bits that flag a failed or corrupted exchange.
    pub const ERROR_MASK: u8 = 0b0011_1100;

    pub fn new(b: u8) -> Self {
        Self(b)
    }
    pub fn byte(&self) -> u8 {
        self.0
    }
    /// Mask with only the operation complete event unmasked.
    pub fn operation_complete_only() -> Self {
        Self(Self::OPERATION_COMPLETE)
    }
    pub fn is_command_err(&self) -> bool {
        self.0 & Self::COMMAND_ERROR != 0
    }
    pub fn is_execution_err(&self) -> bool {
        self.0 & Self::EXECUTION_ERROR != 0
    }
    pub fn is_device_dep_err(&self) -> bool {
        self.0 & Self::DEVICE_DEPENDENT_ERROR != 0
    }
    pub fn is_query_err(&self) -> bool {
        self.0 & Self::QUERY_ERROR != 0
    }
    pub fn is_opera_complete(&self) -> bool {
        self.0 & Self::OPERATION_COMPLETE != 0
    }
    pub fn has_errors(&self) -> bool {
        self.0 & Self::ERROR_MASK != 0
    }
}

impl fmt::Display for StatusByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl fmt::Display for EventStatusByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
