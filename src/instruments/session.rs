use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, info, warn};

use super::{
    acquisition::{Completion, SingleSequence, WaitPolicy},
    mso5::Mso5,
    transfer::{Fetched, TransferConfig, WaveformTransfer},
    Model,
};
use crate::{
    error::{Error, Result},
    protocols::{InstrumentAddress, InterfaceKind, ResourceManager},
    scpi::{CommandChannel, Scpi},
    waveform::{self, ScaledWaveform},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

/// Broadcast on every state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub previous: ConnectionState,
    pub current: ConnectionState,
}

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Connect to this resource only instead of scanning.
    pub address: Option<InstrumentAddress>,
    /// Case-insensitive substring the identity string must contain.
    pub device_name_token: String,
    /// Only resources on this interface are considered during a scan.
    pub expected_interface: InterfaceKind,
    /// Used by `acquire_single_sequence(true)`.
    pub wait: WaitPolicy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::for_model::<Mso5>()
    }
}

impl SessionOptions {
    pub fn for_model<M: Model>() -> Self {
        Self {
            address: None,
            device_name_token: M::NAME_TOKEN.to_string(),
            expected_interface: InterfaceKind::Tcpip,
            wait: WaitPolicy::default(),
        }
    }
    pub fn with_address(mut self, address: InstrumentAddress) -> Self {
        self.address = Some(address);
        self
    }
    pub fn with_token<S: Into<String>>(mut self, token: S) -> Self {
        self.device_name_token = token.into();
        self
    }
    pub fn with_interface(mut self, interface: InterfaceKind) -> Self {
        self.expected_interface = interface;
        self
    }
    pub fn with_wait(mut self, wait: WaitPolicy) -> Self {
        self.wait = wait;
        self
    }

    fn identifies(&self, identity: &str) -> bool {
        identity
            .to_lowercase()
            .contains(&self.device_name_token.to_lowercase())
    }
}

/// One oscilloscope, found through a [`ResourceManager`].
///
/// Operations must not interleave: the instrument needs setup before fetch and
/// clear-status before arming. Every method takes `&mut self`, so sharing a session
/// across threads needs an outer lock.
pub struct InstrumentSession<M: ResourceManager> {
    manager: M,
    options: SessionOptions,
    channel: Option<CommandChannel>,
    state: ConnectionState,
    subscribers: Vec<Sender<ConnectionEvent>>,
}

impl<M: ResourceManager> InstrumentSession<M> {
    pub fn new(manager: M, options: SessionOptions) -> Self {
        Self {
            manager,
            options,
            channel: None,
            state: ConnectionState::Disconnected,
            subscribers: Vec::new(),
        }
    }

    pub fn manager(&self) -> &M {
        &self.manager
    }
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }
    /// The last known state; only `connect`, `disconnect` and `is_connected` change it.
    pub fn state(&self) -> ConnectionState {
        self.state
    }
    /// Address of the bound instrument, if any.
    pub fn address(&self) -> Option<&InstrumentAddress> {
        self.channel.as_ref().map(CommandChannel::address)
    }

    /// A receiver of every future state transition.
    pub fn subscribe(&mut self) -> Receiver<ConnectionEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    fn set_state(&mut self, current: ConnectionState) {
        let previous = self.state;
        if previous == current {
            return;
        }
        self.state = current;
        debug!(?previous, ?current, "connection state changed");
        let event = ConnectionEvent { previous, current };
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Opens the configured address, or scans the manager's resources when none is set.
    ///
    /// An existing connection is released first, so a failed reconnect leaves the
    /// session disconnected.
    pub fn connect(&mut self) -> Result<()> {
        self.release();
        self.set_state(ConnectionState::Disconnected);
        let channel = match self.options.address.clone() {
            Some(address) => self.open_fixed(&address)?,
            None => self.discover()?,
        };
        info!(resource = %channel.address(), "connected");
        self.channel = Some(channel);
        self.set_state(ConnectionState::Connected);
        Ok(())
    }

    fn open_fixed(&mut self, address: &InstrumentAddress) -> Result<CommandChannel> {
        let resource = self.manager.open(address).map_err(|source| {
            no_connection(
                "cannot open instrument, check the driver and connections",
                Error::TransportOpen {
                    address: address.to_string(),
                    source,
                },
            )
        })?;
        let mut channel = CommandChannel::new(resource);
        let identity = match channel
            .clear_status()
            .and_then(|_| channel.identify())
        {
            Ok(identity) => identity,
            Err(e) => {
                close_quietly(channel);
                return Err(no_connection("instrument did not identify", e));
            }
        };
        if !self.options.identifies(&identity) {
            close_quietly(channel);
            return Err(Error::WrongInstrument {
                address: address.to_string(),
                identity,
                expected: self.options.device_name_token.clone(),
            });
        }
        Ok(channel)
    }

    fn discover(&mut self) -> Result<CommandChannel> {
        let resources = self
            .manager
            .list()
            .map_err(|e| no_connection("cannot list resources", Error::Io(e)))?;
        for address in resources {
            let resource = match self.manager.open(&address) {
                Ok(resource) => resource,
                Err(e) => {
                    warn!(resource = %address, error = %e, "skipping candidate, open failed");
                    continue;
                }
            };
            let mut channel = CommandChannel::new(resource);
            if channel.interface() != self.options.expected_interface {
                debug!(resource = %address, "skipping candidate, wrong interface");
                close_quietly(channel);
                continue;
            }
            match channel.identify() {
                Ok(identity) if self.options.identifies(&identity) => return Ok(channel),
                Ok(identity) => {
                    debug!(resource = %address, %identity, "skipping candidate, wrong identity");
                }
                Err(e) => {
                    warn!(resource = %address, error = %e, "skipping candidate, no identity");
                }
            }
            close_quietly(channel);
        }
        Err(Error::no_connection(format!(
            "no resource identified as '{}'",
            self.options.device_name_token
        )))
    }

    fn release(&mut self) {
        if let Some(channel) = self.channel.take() {
            let address = channel.address().clone();
            match channel.close() {
                Ok(()) => info!(resource = %address, "disconnected"),
                Err(e) => warn!(resource = %address, error = %e, "close failed"),
            }
        }
    }

    /// Closes the instrument if one is bound. Never fails.
    pub fn disconnect(&mut self) {
        self.release();
        self.set_state(ConnectionState::Disconnected);
    }

    /// Liveness probe: asks the instrument to identify itself.
    pub fn is_connected(&mut self) -> bool {
        let alive = match self.channel.as_mut() {
            Some(channel) => match channel.identify() {
                Ok(_) => true,
                Err(e) => {
                    debug!(error = %e, "liveness probe failed");
                    false
                }
            },
            None => false,
        };
        self.set_state(if alive {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        });
        alive
    }

    fn channel(&mut self) -> Result<&mut CommandChannel> {
        self.channel.as_mut().ok_or(Error::NotConnected)
    }

    /// Sources the instrument currently offers, in its own order.
    pub fn available_channels(&mut self) -> Result<Vec<String>> {
        self.channel()?.available_channels()
    }

    /// Single-sequence acquisition; with `wait` the call blocks under the session's
    /// wait policy.
    pub fn acquire_single_sequence(&mut self, wait: bool) -> Result<()> {
        let completion = if wait {
            Completion::Wait(self.options.wait.clone())
        } else {
            Completion::Immediate
        };
        self.acquire(&completion)
    }

    pub fn acquire(&mut self, completion: &Completion) -> Result<()> {
        self.channel()?.acquire_single_sequence(completion)
    }

    pub fn setup(&mut self, config: &TransferConfig) -> Result<u32> {
        self.channel()?.setup(config)
    }

    pub fn fetch(&mut self, channel: &str) -> Result<Fetched> {
        self.channel()?.fetch(channel)
    }

    /// Fetches and scales the full record of `channel`.
    ///
    /// The event status register is read after the transfer; any error bit discards the
    /// waveform.
    pub fn transfer_waveform(&mut self, channel: &str) -> Result<ScaledWaveform> {
        let link = self.channel()?;
        let fetched = link.fetch(channel)?;
        let waveform = waveform::scale(&fetched.samples, &fetched.scalars);
        waveform::verify_transfer_status(link.get_event_byte()?)?;
        info!(
            channel,
            points = waveform.len(),
            sample_interval = waveform.sample_interval(),
            "waveform transferred"
        );
        Ok(waveform)
    }
}

impl<M: ResourceManager> Drop for InstrumentSession<M> {
    fn drop(&mut self) {
        self.release();
    }
}

fn no_connection(reason: &str, source: Error) -> Error {
    Error::NoConnection {
        reason: reason.to_string(),
        source: Some(Box::new(source)),
    }
}

fn close_quietly(channel: CommandChannel) {
    let address = channel.address().clone();
    if let Err(e) = channel.close() {
        warn!(resource = %address, error = %e, "close failed");
    }
}
