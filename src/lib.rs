//! Remote control of Tektronix 5 Series oscilloscopes over SCPI.
//!
//! ```no_run
//! use scopewire::{InstrumentSession, ScopeConfig};
//!
//! # fn main() -> scopewire::Result<()> {
//! let config = ScopeConfig::load("scope.toml")?;
//! let mut session = InstrumentSession::new(config.bus()?, config.session_options()?);
//! session.connect()?;
//! session.acquire_single_sequence(true)?;
//! let waveform = session.transfer_waveform("CH1")?;
//! println!("{} points", waveform.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod instruments;
pub mod monitor;
pub mod protocols;
pub mod scpi;
pub mod waveform;

pub use config::ScopeConfig;
pub use error::{Error, Result};
pub use instruments::{
    CancelToken, Completion, ConnectionEvent, ConnectionState, InstrumentSession,
    SessionOptions, TransferConfig, WaitPolicy,
};
pub use monitor::SessionMonitor;
pub use protocols::{Bus, InstrumentAddress, InterfaceKind, ResourceManager};
pub use waveform::{CalibrationScalars, ScaledWaveform, WaveformArchive};
