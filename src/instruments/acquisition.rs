use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, trace};

use super::mso5::{Query, Set, StopAfter};
use crate::{
    error::{Error, Result},
    scpi::{EventStatusByte, Scpi, StatusByte, ToCommand},
};

/// Shared flag a caller sets to abandon a synchronized acquisition.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How long to wait for a single-sequence acquisition and how often to ask.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub cancel: Option<CancelToken>,
}

impl Default for WaitPolicy {
    /// 100 polls, 100 ms apart.
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            timeout: Duration::from_secs(10),
            cancel: None,
        }
    }
}

impl WaitPolicy {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
            cancel: None,
        }
    }
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Number of status reads the timeout allows; never less than one.
    pub fn max_polls(&self) -> u32 {
        let interval = self.poll_interval.as_nanos().max(1);
        let polls = (self.timeout.as_nanos() + interval - 1) / interval;
        polls.clamp(1, u32::MAX as u128) as u32
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancelToken::is_cancelled)
    }
}

#[derive(Debug, Clone)]
pub enum Completion {
    /// Arm and return; the instrument finishes on its own.
    Immediate,
    /// Arm and block until the instrument reports operation complete.
    Wait(WaitPolicy),
}

/// Single-sequence acquisition on top of any SCPI link.
pub trait SingleSequence: Scpi {
    /// Puts the instrument in single-sequence mode, writing the mode only when the
    /// instrument reports something else. Returns whether a write was needed.
    fn ensure_single_sequence(&mut self) -> Result<bool> {
        let mode = self.scpi_query(Query::StopAfter.to_command())?;
        if StopAfter::Sequence.matches(&mode) {
            return Ok(false);
        }
        self.scpi_send(Set::StopAfter(StopAfter::Sequence).to_command())?;
        Ok(true)
    }

    /// Same as pressing the Single/Seq button.
    fn acquire_single_sequence(&mut self, completion: &Completion) -> Result<()> {
        self.ensure_single_sequence()?;
        match completion {
            Completion::Immediate => self.scpi_send(Set::AcquisitionState(true).to_command()),
            Completion::Wait(policy) => {
                self.scpi_send(Set::DeviceEventEnable(1).to_command())?;
                self.set_event_mask(EventStatusByte::operation_complete_only())?;
                self.set_service_mask(StatusByte::new(0))?;
                // a completion latched earlier would end the wait at the first poll
                self.clear_status()?;
                self.scpi_send(Set::AcquisitionState(true).to_command())?;
                self.operation_complete()?;
                let polls = self.wait_operation_complete(policy)?;
                debug!(polls, "acquisition complete");
                Ok(())
            }
        }
    }

    /// Polls the event status register until the operation complete bit shows up.
    /// Returns the number of reads it took.
    fn wait_operation_complete(&mut self, policy: &WaitPolicy) -> Result<u32> {
        let started = Instant::now();
        let max_polls = policy.max_polls();
        for poll in 1..=max_polls {
            if policy.cancelled() {
                return Err(Error::AcquisitionCancelled { polls: poll - 1 });
            }
            let esr = self.get_event_byte()?;
            trace!(poll, esr = esr.byte(), "waiting for operation complete");
            if esr.is_opera_complete() {
                return Ok(poll);
            }
            if poll < max_polls {
                thread::sleep(policy.poll_interval);
            }
        }
        Err(Error::AcquisitionTimeout {
            polls: max_polls,
            elapsed: started.elapsed(),
        })
    }
}

impl<T: Scpi> SingleSequence for T {}
