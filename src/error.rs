use std::time::Duration;

use thiserror::Error;

use crate::{instruments::Encoding, scpi::EventStatusByte};

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot open resource '{address}': {source}")]
    TransportOpen {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no connection to instrument: {reason}")]
    NoConnection {
        reason: String,
        #[source]
        source: Option<Box<Error>>,
    },
    #[error("wrong instrument at '{address}': identified as '{identity}', expected '{expected}'")]
    WrongInstrument {
        address: String,
        identity: String,
        expected: String,
    },
    #[error("transfer layer error on '{command}': {source}")]
    Transport {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid channel '{channel}', available sources: {available:?}")]
    InvalidChannel {
        channel: String,
        available: Vec<String>,
    },
    #[error("invalid transfer window {start}..={end} for record length {record_length}")]
    InvalidTransferWindow {
        start: u32,
        end: u32,
        record_length: u32,
    },
    #[error("acquisition did not complete after {polls} polls ({elapsed:?})")]
    AcquisitionTimeout { polls: u32, elapsed: Duration },
    #[error("acquisition cancelled after {polls} polls")]
    AcquisitionCancelled { polls: u32 },
    #[error("data transfer has been corrupted, event status register: {0}")]
    DataTransfer(EventStatusByte),
    #[error("curve encoding {0} does not carry signed binary samples")]
    UnsupportedEncoding(Encoding),
    #[error("unexpected response to '{command}': '{response}'")]
    InvalidResponse { command: String, response: String },
    #[error("instrument is not connected")]
    NotConnected,
    #[error("invalid resource address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },
    #[error("archive error: {0}")]
    Archive(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Transport { source, .. } | Error::TransportOpen { source, .. } => {
                source.kind() == std::io::ErrorKind::TimedOut
            }
            Error::AcquisitionTimeout { .. } => true,
            _ => false,
        }
    }

    /// True for failures that mean the link to the instrument is unusable or was never
    /// established, as opposed to a problem with one transfer.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Error::TransportOpen { .. }
                | Error::NoConnection { .. }
                | Error::WrongInstrument { .. }
                | Error::Transport { .. }
                | Error::NotConnected
        )
    }

    pub fn is_transfer_corruption(&self) -> bool {
        matches!(self, Error::DataTransfer(_) | Error::InvalidResponse { .. })
    }

    pub(crate) fn no_connection<S: Into<String>>(reason: S) -> Self {
        Error::NoConnection {
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn invalid_response<C: AsRef<str>, R: AsRef<str>>(command: C, response: R) -> Self {
        Error::InvalidResponse {
            command: command.as_ref().to_string(),
            response: response.as_ref().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_connection_failures() {
        let err = Error::WrongInstrument {
            address: "TCPIP0::10.0.0.2::4000::SOCKET".into(),
            identity: "KEYSIGHT,DSOX".into(),
            expected: "MSO".into(),
        };
        assert!(err.is_connection_failure());
        assert!(!err.is_transfer_corruption());
        assert!(err.to_string().contains("KEYSIGHT,DSOX"));
    }

    #[test]
    fn classifies_transfer_corruption() {
        let err = Error::DataTransfer(EventStatusByte::new(0b0001_0000));
        assert!(err.is_transfer_corruption());
        assert!(!err.is_connection_failure());
    }

    #[test]
    fn timed_out_transport_is_timeout() {
        let err = Error::Transport {
            command: "CURVe?".into(),
            source: std::io::Error::new(std::io::ErrorKind::TimedOut, "read timed out"),
        };
        assert!(err.is_timeout());
        assert!(err.to_string().contains("CURVe?"));
        assert!(!Error::NotConnected.is_timeout());
    }
}
