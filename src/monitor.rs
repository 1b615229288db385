//! Periodic connection upkeep for front ends.
//!
//! A front end calls [`SessionMonitor::tick`] on its own timer. Each tick reconnects when
//! needed, probes the instrument and refreshes the list of available channels.

use crossbeam_channel::Receiver;
use tracing::{debug, warn};

use crate::{
    error::Result,
    instruments::{ConnectionEvent, ConnectionState, InstrumentSession},
    protocols::ResourceManager,
    waveform::ScaledWaveform,
};

pub struct SessionMonitor<M: ResourceManager> {
    session: InstrumentSession<M>,
    channels: Vec<String>,
}

impl<M: ResourceManager> SessionMonitor<M> {
    pub fn new(session: InstrumentSession<M>) -> Self {
        Self {
            session,
            channels: Vec::new(),
        }
    }

    pub fn session(&self) -> &InstrumentSession<M> {
        &self.session
    }
    pub fn session_mut(&mut self) -> &mut InstrumentSession<M> {
        &mut self.session
    }
    pub fn into_session(self) -> InstrumentSession<M> {
        self.session
    }
    pub fn subscribe(&mut self) -> Receiver<ConnectionEvent> {
        self.session.subscribe()
    }
    pub fn state(&self) -> ConnectionState {
        self.session.state()
    }
    /// Channels reported at the last successful tick.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Connection failures are logged and left for the next tick.
    pub fn tick(&mut self) -> ConnectionState {
        if self.session.state() != ConnectionState::Connected {
            if let Err(e) = self.session.connect() {
                debug!(error = %e, "connect attempt failed");
            }
        }
        if self.session.is_connected() {
            match self.session.available_channels() {
                Ok(channels) => self.channels = channels,
                Err(e) => warn!(error = %e, "cannot refresh available channels"),
            }
        }
        self.session.state()
    }

    /// Transfers `channel` when connected, `Ok(None)` otherwise.
    pub fn data(&mut self, channel: &str) -> Result<Option<ScaledWaveform>> {
        if self.session.state() != ConnectionState::Connected {
            return Ok(None);
        }
        self.session.transfer_waveform(channel).map(Some)
    }
}
