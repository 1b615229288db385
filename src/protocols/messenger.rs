use std::io::{BufRead, BufReader, Error, ErrorKind};

use tracing::trace;

use super::{InstrumentAddress, Link, Resource};
use crate::scpi::block::{self, BinaryFormat};

pub const TERMINATOR: u8 = b'\n';

/// Line oriented message exchange over any byte stream.
///
/// Commands are terminated with `\n`, text replies are read up to `\n`, binary replies
/// are read as IEEE 488.2 blocks.
pub struct Messenger<IO: Link> {
    address: InstrumentAddress,
    io: Option<BufReader<IO>>,
    buf: Vec<u8>,
}

impl<IO: Link> Messenger<IO> {
    pub fn new(address: InstrumentAddress, io: IO) -> Self {
        Self {
            address,
            io: Some(BufReader::new(io)),
            buf: Vec::new(),
        }
    }

    fn io(&mut self) -> std::io::Result<&mut BufReader<IO>> {
        self.io
            .as_mut()
            .ok_or_else(|| Error::new(ErrorKind::NotConnected, "Not Connected"))
    }

    fn send(&mut self, command: &str) -> std::io::Result<()> {
        trace!(resource = %self.address, command, "send");
        let io = self.io()?.get_mut();
        io.write_all(command.as_bytes())?;
        io.write_all(&[TERMINATOR])?;
        io.flush()
    }
}

impl<IO: Link> Resource for Messenger<IO> {
    fn address(&self) -> &InstrumentAddress {
        &self.address
    }

    fn write(&mut self, command: &str) -> std::io::Result<()> {
        self.send(command)
    }

    fn query(&mut self, command: &str) -> std::io::Result<String> {
        self.send(command)?;
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        let read = self.io()?.read_until(TERMINATOR, &mut buf);
        let reply = match read {
            Ok(0) => Err(Error::new(
                ErrorKind::UnexpectedEof,
                "connection closed before reply",
            )),
            Ok(_) => Ok(String::from_utf8_lossy(&buf).trim_end().to_string()),
            Err(e) => Err(e),
        };
        self.buf = buf;
        reply
    }

    fn query_binary(
        &mut self,
        command: &str,
        format: BinaryFormat,
        count: usize,
    ) -> std::io::Result<Vec<i16>> {
        self.send(command)?;
        let expected = count * format.width.bytes();
        let payload = block::read_block(self.io()?, TERMINATOR, Some(expected))?;
        trace!(resource = %self.address, bytes = payload.len(), "block received");
        block::decode_samples(payload, format, Some(count))
    }

    fn close(&mut self) -> std::io::Result<()> {
        match self.io.take() {
            Some(reader) => reader.into_inner().shutdown(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scpi::{ByteWidth, Endianness};
    use std::io::{Cursor, Read, Write};

    /// Replays a canned reply stream and records what was written.
    struct Loopback {
        reply: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Read for Loopback {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reply.read(buf)
        }
    }
    impl Write for Loopback {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
    impl Link for Loopback {}

    fn messenger(reply: &[u8]) -> Messenger<Loopback> {
        Messenger::new(
            "TCPIP0::localhost::4000::SOCKET".parse().unwrap(),
            Loopback {
                reply: Cursor::new(reply.to_vec()),
                written: Vec::new(),
            },
        )
    }

    #[test]
    fn frames_commands_and_reads_lines() {
        let mut m = messenger(b"TEKTRONIX,MSO54,C000001,CF:91.1CT FV:1.28\n1\n");
        m.write("*CLS").unwrap();
        let idn = m.query("*IDN?").unwrap();
        assert!(idn.starts_with("TEKTRONIX,MSO54"));
        assert_eq!(m.query("*ESR?").unwrap(), "1");
        let written = m.io.as_ref().unwrap().get_ref().written.clone();
        assert_eq!(written, b"*CLS\n*IDN?\n*ESR?\n");
    }

    #[test]
    fn reads_binary_reply() {
        let mut m = messenger(b"#14\x10\x00\xf0\xff\n");
        let format = BinaryFormat::new(ByteWidth::Two, Endianness::Little);
        assert_eq!(m.query_binary("CURVe?", format, 2).unwrap(), vec![16, -16]);
    }

    #[test]
    fn closed_messenger_refuses_io() {
        let mut m = messenger(b"");
        m.close().unwrap();
        m.close().unwrap();
        let err = m.write("*CLS").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotConnected);
    }

    #[test]
    fn eof_is_an_error() {
        let mut m = messenger(b"");
        assert_eq!(
            m.query("*IDN?").unwrap_err().kind(),
            ErrorKind::UnexpectedEof
        );
    }
}
