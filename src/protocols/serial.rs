use super::{Link, Protocol};
use serde::Deserialize;
use serial::{SerialPort, SystemPort};

#[derive(Clone, Copy, Debug)]
pub struct Serial {
    pub baud_rate: serial::BaudRate,
    pub data_bits: serial::CharSize,
    pub parity: serial::Parity,
    pub stop_bits: serial::StopBits,
    pub flow_control: serial::FlowControl,
}

impl Default for Serial {
    fn default() -> Self {
        Self {
            baud_rate: serial::Baud9600,
            data_bits: serial::Bits8,
            parity: serial::ParityNone,
            stop_bits: serial::Stop1,
            flow_control: serial::FlowNone,
        }
    }
}

fn config_serial<T: SerialPort>(port: &mut T, config: Serial) -> serial::Result<()> {
    port.reconfigure(&|settings| {
        settings.set_baud_rate(config.baud_rate)?;
        settings.set_char_size(config.data_bits);
        settings.set_parity(config.parity);
        settings.set_stop_bits(config.stop_bits);
        settings.set_flow_control(config.flow_control);
        Ok(())
    })
}

impl Protocol for Serial {
    type Address = String;
    type Error = serial::Error;
    type IO = SystemPort;
    fn connect(
        self,
        address: Self::Address,
        time_out: std::time::Duration,
    ) -> Result<Self::IO, Self::Error> {
        let mut port = serial::open(&address)?;
        config_serial(&mut port, self)?;
        port.set_timeout(time_out)?;
        Ok(port)
    }
}

impl Link for SystemPort {}

/// Serial line settings as written in a configuration file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    pub baud_rate: usize,
    pub data_bits: u8,
    /// `none`, `odd` or `even`
    pub parity: String,
    pub stop_bits: u8,
    /// `none`, `software` or `hardware`
    pub flow_control: String,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: 8,
            parity: "none".to_string(),
            stop_bits: 1,
            flow_control: "none".to_string(),
        }
    }
}

impl TryFrom<&SerialSettings> for Serial {
    type Error = String;
    fn try_from(s: &SerialSettings) -> Result<Self, String> {
        Ok(Serial {
            baud_rate: serial::BaudRate::from_speed(s.baud_rate),
            data_bits: match s.data_bits {
                5 => serial::Bits5,
                6 => serial::Bits6,
                7 => serial::Bits7,
                8 => serial::Bits8,
                n => return Err(format!("unsupported data bits: {}", n)),
            },
            parity: match s.parity.to_ascii_lowercase().as_str() {
                "none" => serial::ParityNone,
                "odd" => serial::ParityOdd,
                "even" => serial::ParityEven,
                p => return Err(format!("unsupported parity: '{}'", p)),
            },
            stop_bits: match s.stop_bits {
                1 => serial::Stop1,
                2 => serial::Stop2,
                n => return Err(format!("unsupported stop bits: {}", n)),
            },
            flow_control: match s.flow_control.to_ascii_lowercase().as_str() {
                "none" => serial::FlowNone,
                "software" => serial::FlowSoftware,
                "hardware" => serial::FlowHardware,
                f => return Err(format!("unsupported flow control: '{}'", f)),
            },
        })
    }
}
