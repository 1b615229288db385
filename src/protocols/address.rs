//! VISA style resource strings.
//!
//! https://zone.ni.com/reference/en-XX/help/370131S-01/ni-visa/visaresourcesyntaxandexamples/

use std::{fmt, str::FromStr};

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    Usb,
    Tcpip,
    Serial,
    Gpib,
    Simulated,
}

impl fmt::Display for InterfaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InterfaceKind::Usb => "USB",
            InterfaceKind::Tcpip => "TCPIP",
            InterfaceKind::Serial => "ASRL",
            InterfaceKind::Gpib => "GPIB",
            InterfaceKind::Simulated => "SIM",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// `TCPIP[board]::host::port::SOCKET`
    Tcp { host: String, port: u16 },
    /// `ASRL<port>::INSTR`, the port is either a number or a device path
    Serial { port: String },
    /// `USB[board]::vendor::product::serial::INSTR`
    Usb {
        vendor: String,
        product: String,
        serial: String,
    },
    /// `GPIB[board]::primary::INSTR`
    Gpib { primary: u8 },
    /// `SIM::name`
    Simulated { name: String },
}

/// Address of one instrument resource. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstrumentAddress {
    resource: String,
    endpoint: Endpoint,
}

impl InstrumentAddress {
    pub fn simulated(name: &str) -> Self {
        Self {
            resource: format!("SIM::{}", name),
            endpoint: Endpoint::Simulated {
                name: name.to_string(),
            },
        }
    }
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
    pub fn interface(&self) -> InterfaceKind {
        match self.endpoint {
            Endpoint::Tcp { .. } => InterfaceKind::Tcpip,
            Endpoint::Serial { .. } => InterfaceKind::Serial,
            Endpoint::Usb { .. } => InterfaceKind::Usb,
            Endpoint::Gpib { .. } => InterfaceKind::Gpib,
            Endpoint::Simulated { .. } => InterfaceKind::Simulated,
        }
    }
    pub fn as_str(&self) -> &str {
        &self.resource
    }
}

fn serial_port_name(port: &str) -> String {
    if port.chars().all(|c| c.is_ascii_digit()) {
        if cfg!(windows) {
            format!("COM{}", port)
        } else {
            format!("/dev/ttyS{}", port)
        }
    } else {
        port.to_string()
    }
}

fn has_board_suffix(head: &str, prefix: &str) -> bool {
    match (head.get(..prefix.len()), head.get(prefix.len()..)) {
        (Some(class), Some(board)) => {
            class.eq_ignore_ascii_case(prefix) && board.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..prefix.len()) {
        Some(head) if head.eq_ignore_ascii_case(prefix) => s.get(prefix.len()..),
        _ => None,
    }
}

impl FromStr for InstrumentAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let resource = s.trim();
        let invalid = |reason: &str| Error::InvalidAddress {
            address: resource.to_string(),
            reason: reason.to_string(),
        };
        let parts: Vec<&str> = resource.split("::").collect();
        let head = parts[0];
        let class_is = |i: usize, class: &str| {
            parts
                .get(i)
                .map(|p| p.eq_ignore_ascii_case(class))
                .unwrap_or(false)
        };

        let endpoint = if has_board_suffix(head, "TCPIP") {
            if parts.last().map_or(false, |p| p.eq_ignore_ascii_case("INSTR")) {
                return Err(invalid(
                    "VXI-11 is not supported, use the raw socket form TCPIP0::<host>::4000::SOCKET",
                ));
            }
            if parts.len() != 4 || !class_is(3, "SOCKET") {
                return Err(invalid("expected TCPIP<n>::<host>::<port>::SOCKET"));
            }
            let port = parts[2]
                .parse()
                .map_err(|_| invalid("port is not a number"))?;
            Endpoint::Tcp {
                host: parts[1].to_string(),
                port,
            }
        } else if let Some(port) = strip_prefix_ignore_case(head, "ASRL") {
            if port.is_empty() || parts.len() != 2 || !class_is(1, "INSTR") {
                return Err(invalid("expected ASRL<port>::INSTR"));
            }
            Endpoint::Serial {
                port: serial_port_name(port),
            }
        } else if has_board_suffix(head, "USB") {
            if !(parts.len() == 5 || parts.len() == 6) || !class_is(parts.len() - 1, "INSTR") {
                return Err(invalid(
                    "expected USB<n>::<vendor>::<product>::<serial>[::<interface>]::INSTR",
                ));
            }
            Endpoint::Usb {
                vendor: parts[1].to_string(),
                product: parts[2].to_string(),
                serial: parts[3].to_string(),
            }
        } else if has_board_suffix(head, "GPIB") {
            if parts.len() != 3 || !class_is(2, "INSTR") {
                return Err(invalid("expected GPIB<n>::<primary>::INSTR"));
            }
            Endpoint::Gpib {
                primary: parts[1]
                    .parse()
                    .map_err(|_| invalid("primary address is not a number"))?,
            }
        } else if head.eq_ignore_ascii_case("SIM") {
            if parts.len() != 2 || parts[1].is_empty() {
                return Err(invalid("expected SIM::<name>"));
            }
            Endpoint::Simulated {
                name: parts[1].to_string(),
            }
        } else {
            return Err(invalid("unknown interface"));
        };
        Ok(Self {
            resource: resource.to_string(),
            endpoint,
        })
    }
}

impl fmt::Display for InstrumentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resource)
    }
}
