//! Configuration file.
//!
//! Every field has a default, so an empty file (or no file) connects to the first `MSO`
//! found on the configured TCP/IP resources with the stock 100 ms x 100 polls budget.
//!
//! ```toml
//! address = "TCPIP0::192.168.1.20::4000::SOCKET"
//! device_name_token = "MSO"
//!
//! [acquisition]
//! poll_interval_ms = 100
//! timeout_ms = 10000
//! ```

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{
    error::{Error, Result},
    instruments::{Model, Mso5, SessionOptions, WaitPolicy},
    protocols::{Bus, InstrumentAddress, InterfaceKind, Serial, SerialSettings},
};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScopeConfig {
    pub device_name_token: String,
    /// Fixed resource; when set no scan takes place.
    pub address: Option<String>,
    /// Resources enumerated during a scan, in order.
    pub resources: Vec<String>,
    pub expected_interface: InterfaceKind,
    pub open_timeout_ms: u64,
    pub io_timeout_ms: u64,
    pub acquisition: AcquisitionSettings,
    pub serial: SerialSettings,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            device_name_token: Mso5::NAME_TOKEN.to_string(),
            address: None,
            resources: Vec::new(),
            expected_interface: InterfaceKind::Tcpip,
            open_timeout_ms: 2000,
            io_timeout_ms: 5000,
            acquisition: AcquisitionSettings::default(),
            serial: SerialSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AcquisitionSettings {
    pub poll_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            timeout_ms: 10_000,
        }
    }
}

impl AcquisitionSettings {
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(
            Duration::from_millis(self.poll_interval_ms),
            Duration::from_millis(self.timeout_ms),
        )
    }
}

impl ScopeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<()> {
        if self.device_name_token.trim().is_empty() {
            return Err(Error::Config("device_name_token must not be empty".into()));
        }
        if self.acquisition.poll_interval_ms == 0 {
            return Err(Error::Config("acquisition.poll_interval_ms must be positive".into()));
        }
        Serial::try_from(&self.serial).map_err(Error::Config)?;
        Ok(())
    }

    pub fn fixed_address(&self) -> Result<Option<InstrumentAddress>> {
        self.address.as_deref().map(str::parse).transpose()
    }

    pub fn session_options(&self) -> Result<SessionOptions> {
        let mut options = SessionOptions::default()
            .with_token(self.device_name_token.clone())
            .with_interface(self.expected_interface)
            .with_wait(self.acquisition.wait_policy());
        if let Some(address) = self.fixed_address()? {
            options = options.with_address(address);
        }
        Ok(options)
    }

    /// The built-in resource manager over `resources` (plus `address`, if set).
    pub fn bus(&self) -> Result<Bus> {
        let mut resources = self
            .resources
            .iter()
            .map(|r| r.parse())
            .collect::<Result<Vec<InstrumentAddress>>>()?;
        if let Some(address) = self.fixed_address()? {
            if !resources.contains(&address) {
                resources.push(address);
            }
        }
        let mut bus = Bus::new(resources);
        bus.set_open_timeout(Duration::from_millis(self.open_timeout_ms))
            .set_io_timeout(Duration::from_millis(self.io_timeout_ms))
            .set_serial(Serial::try_from(&self.serial).map_err(Error::Config)?);
        Ok(bus)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::ResourceManager;

    #[test]
    fn empty_file_gives_defaults() {
        let config = ScopeConfig::from_toml_str("").unwrap();
        assert_eq!(config, ScopeConfig::default());
        let options = config.session_options().unwrap();
        assert_eq!(options.device_name_token, "MSO");
        assert_eq!(options.wait.max_polls(), 100);
        assert!(options.address.is_none());
    }

    #[test]
    fn partial_file() {
        let config = ScopeConfig::from_toml_str(
            r#"
            address = "TCPIP0::192.168.1.20::4000::SOCKET"
            expected_interface = "usb"

            [acquisition]
            timeout_ms = 500

            [serial]
            baud_rate = 115200
            "#,
        )
        .unwrap();
        assert_eq!(config.expected_interface, InterfaceKind::Usb);
        assert_eq!(config.acquisition.poll_interval_ms, 100);
        assert_eq!(config.acquisition.wait_policy().max_polls(), 5);
        assert_eq!(config.serial.baud_rate, 115200);
        let address = config.session_options().unwrap().address.unwrap();
        assert_eq!(address.interface(), InterfaceKind::Tcpip);
        assert_eq!(config.bus().unwrap().list().unwrap(), vec![address]);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(ScopeConfig::from_toml_str("device_name_token = ''").is_err());
        assert!(ScopeConfig::from_toml_str("[serial]\nparity = 'mark'").is_err());
        assert!(ScopeConfig::from_toml_str("open_timeout_ms = 'soon'").is_err());
        let config = ScopeConfig::from_toml_str("resources = ['nonsense']").unwrap();
        assert!(matches!(config.bus(), Err(Error::InvalidAddress { .. })));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scope.toml");
        std::fs::write(&path, "device_name_token = 'MSO58'\n").unwrap();
        assert_eq!(ScopeConfig::load(&path).unwrap().device_name_token, "MSO58");
        assert!(matches!(
            ScopeConfig::load(dir.path().join("missing.toml")),
            Err(Error::Config(_))
        ));
    }
}
