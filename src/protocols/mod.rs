//! The transport boundary: resource enumeration, opening, and raw message exchange.

use std::{
    io::{Error, ErrorKind, Read, Write},
    time::Duration,
};

use tracing::debug;

use crate::scpi::BinaryFormat;

pub mod address;
pub mod messenger;
pub mod serial;
pub mod sim;
pub mod tcp;

pub use self::address::{Endpoint, InstrumentAddress, InterfaceKind};
pub use self::messenger::Messenger;
pub use self::serial::{Serial, SerialSettings};
pub use self::sim::{SimulatedBus, SimulatedScope};
pub use self::tcp::Tcp;

/// A way of turning an address into a byte stream.
pub trait Protocol {
    type Address;
    type Error: Into<std::io::Error>;
    type IO: Read + Write;
    fn connect(self, address: Self::Address, time_out: Duration) -> Result<Self::IO, Self::Error>;
}

/// Byte stream a [`Messenger`] can drive.
pub trait Link: Read + Write + Send {
    fn shutdown(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One open instrument resource.
pub trait Resource: Send {
    fn address(&self) -> &InstrumentAddress;
    fn interface(&self) -> InterfaceKind {
        self.address().interface()
    }
    fn write(&mut self, command: &str) -> std::io::Result<()>;
    fn query(&mut self, command: &str) -> std::io::Result<String>;
    fn query_binary(
        &mut self,
        command: &str,
        format: BinaryFormat,
        count: usize,
    ) -> std::io::Result<Vec<i16>>;
    /// Releases the resource. Closing twice is not an error.
    fn close(&mut self) -> std::io::Result<()>;
}

/// Enumerates and opens resources.
pub trait ResourceManager {
    fn list(&self) -> std::io::Result<Vec<InstrumentAddress>>;
    fn open(&mut self, address: &InstrumentAddress) -> std::io::Result<Box<dyn Resource>>;
}

/// Resource manager for the transports built into this crate.
///
/// There is no bus scan: `list` returns the configured resources, in order.
#[derive(Debug, Clone)]
pub struct Bus {
    resources: Vec<InstrumentAddress>,
    open_timeout: Duration,
    io_timeout: Duration,
    serial: Serial,
}

impl Bus {
    pub fn new(resources: Vec<InstrumentAddress>) -> Self {
        Self {
            resources,
            open_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(5),
            serial: Serial::default(),
        }
    }
    pub fn set_open_timeout(&mut self, dur: Duration) -> &mut Self {
        self.open_timeout = dur;
        self
    }
    pub fn set_io_timeout(&mut self, dur: Duration) -> &mut Self {
        self.io_timeout = dur;
        self
    }
    pub fn set_serial(&mut self, serial: Serial) -> &mut Self {
        self.serial = serial;
        self
    }
}

impl ResourceManager for Bus {
    fn list(&self) -> std::io::Result<Vec<InstrumentAddress>> {
        Ok(self.resources.clone())
    }

    fn open(&mut self, address: &InstrumentAddress) -> std::io::Result<Box<dyn Resource>> {
        debug!(resource = %address, "opening");
        match address.endpoint() {
            Endpoint::Tcp { host, port } => {
                let socket = Tcp::resolve(host, *port)?;
                let tcp = Tcp {
                    io_timeout: self.io_timeout,
                };
                let stream = tcp.connect(socket, self.open_timeout)?;
                Ok(Box::new(Messenger::new(address.clone(), stream)))
            }
            Endpoint::Serial { port } => {
                let port = self
                    .serial
                    .connect(port.clone(), self.io_timeout)
                    .map_err(Into::<std::io::Error>::into)?;
                Ok(Box::new(Messenger::new(address.clone(), port)))
            }
            _ => Err(Error::new(
                ErrorKind::Unsupported,
                format!("no driver for {} resources", address.interface()),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_lists_configured_resources_in_order() {
        let resources: Vec<InstrumentAddress> = [
            "ASRL/dev/ttyUSB0::INSTR",
            "TCPIP0::10.0.0.9::4000::SOCKET",
        ]
        .iter()
        .map(|s| s.parse().unwrap())
        .collect();
        let bus = Bus::new(resources.clone());
        assert_eq!(bus.list().unwrap(), resources);
    }

    #[test]
    fn bus_has_no_usb_driver() {
        let mut bus = Bus::new(Vec::new());
        let usb: InstrumentAddress = "USB0::0x0699::0x0522::C0::INSTR".parse().unwrap();
        let err = bus.open(&usb).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }
}
