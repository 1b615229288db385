use tracing::debug;

use super::{BinaryFormat, Scpi};
use crate::{
    error::{Error, Result},
    protocols::{InstrumentAddress, InterfaceKind, Resource},
};

/// The open command link of a session.
///
/// Every transport failure comes back as [`Error::Transport`] naming the command that
/// failed. A malformed binary block is an [`Error::InvalidResponse`].
pub struct CommandChannel {
    resource: Box<dyn Resource>,
}

impl CommandChannel {
    pub fn new(resource: Box<dyn Resource>) -> Self {
        Self { resource }
    }
    pub fn address(&self) -> &InstrumentAddress {
        self.resource.address()
    }
    pub fn interface(&self) -> InterfaceKind {
        self.resource.interface()
    }
    pub fn close(mut self) -> std::io::Result<()> {
        self.resource.close()
    }
}

fn transport(command: &str) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |source| Error::Transport {
        command: command.to_string(),
        source,
    }
}

impl Scpi for CommandChannel {
    fn scpi_send<C: AsRef<str>>(&mut self, command: C) -> Result<()> {
        let command = command.as_ref();
        debug!(command, "write");
        self.resource.write(command).map_err(transport(command))
    }

    fn scpi_query<C: AsRef<str>>(&mut self, command: C) -> Result<String> {
        let command = command.as_ref();
        let reply = self.resource.query(command).map_err(transport(command))?;
        debug!(command, reply = %reply, "query");
        Ok(reply)
    }

    fn scpi_query_binary<C: AsRef<str>>(
        &mut self,
        command: C,
        format: BinaryFormat,
        count: usize,
    ) -> Result<Vec<i16>> {
        let command = command.as_ref();
        let samples = self
            .resource
            .query_binary(command, format, count)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => Error::invalid_response(command, e.to_string()),
                _ => transport(command)(e),
            })?;
        debug!(command, points = samples.len(), "binary query");
        Ok(samples)
    }
}
