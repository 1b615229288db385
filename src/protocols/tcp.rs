use super::{Link, Protocol};
use std::{
    io::{Error, ErrorKind},
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

/// Raw socket transport, as served on the SCPI socket port of LAN instruments.
#[derive(Clone, Copy, Debug)]
pub struct Tcp {
    pub io_timeout: Duration,
}

impl Default for Tcp {
    fn default() -> Self {
        Tcp {
            io_timeout: Duration::from_secs(5),
        }
    }
}

impl Tcp {
    pub fn resolve(host: &str, port: u16) -> std::io::Result<SocketAddr> {
        (host, port).to_socket_addrs()?.next().ok_or_else(|| {
            Error::new(
                ErrorKind::NotFound,
                format!("'{}:{}' did not resolve to any address", host, port),
            )
        })
    }
}

impl Protocol for Tcp {
    type IO = TcpStream;
    type Address = SocketAddr;
    type Error = Error;
    fn connect(
        self,
        address: Self::Address,
        time_out: std::time::Duration,
    ) -> Result<Self::IO, Self::Error> {
        let stream = TcpStream::connect_timeout(&address, time_out)?;
        stream.set_read_timeout(Some(self.io_timeout))?;
        stream.set_write_timeout(Some(self.io_timeout))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

impl Link for TcpStream {
    fn shutdown(&mut self) -> std::io::Result<()> {
        match TcpStream::shutdown(self, Shutdown::Both) {
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}
