use std::{
    sync::{Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use log::debug;

use opus_shared::ControlResponse;

use super::Command;
use crate::error::BridgeError;

struct Slot {
    next_ticket: u64,
    /// Ticket that currently owns the bridge, from submission until its
    /// response is collected or abandoned
    active: Option<u64>,
    pending: Option<(u64, Command)>,
    response: Option<(u64, ControlResponse)>,
    closed: bool,
}

/// Single-slot hand-off between control threads and the ingestion worker.
///
/// One command is in flight at a time. Other submitters block until the slot
/// frees up; if a wait ceiling is configured, waiting longer than it is
/// reported as [`BridgeError::Contention`]. Responses carry the ticket of the
/// command they answer, so an answer to an abandoned command is discarded
/// rather than handed to the next submitter.
pub struct CommandBridge {
    slot: Mutex<Slot>,
    changed: Condvar,
    wait_ceiling: Option<Duration>,
}

impl CommandBridge {
    pub fn new(wait_ceiling: Option<Duration>) -> Self {
        Self {
            slot: Mutex::new(Slot {
                next_ticket: 0,
                active: None,
                pending: None,
                response: None,
                closed: false,
            }),
            changed: Condvar::new(),
            wait_ceiling,
        }
    }

    /// Posts `command` and blocks until the worker answers it or the bridge
    /// is closed. Only the wait for a free slot is bounded by the ceiling.
    pub fn submit(&self, command: Command) -> Result<ControlResponse, BridgeError> {
        let started = Instant::now();
        let mut slot = self.lock()?;

        while slot.active.is_some() && !slot.closed {
            slot = self.wait_for_slot(slot, started)?;
        }
        if slot.closed {
            return Err(BridgeError::Closed);
        }

        let ticket = slot.next_ticket;
        slot.next_ticket += 1;
        slot.active = Some(ticket);
        slot.pending = Some((ticket, command));
        self.changed.notify_all();

        loop {
            match slot.response.take() {
                Some((answered, response)) if answered == ticket => {
                    slot.active = None;
                    self.changed.notify_all();
                    return Ok(response);
                }
                // answer to an abandoned ticket
                Some(_) | None => {}
            }
            if slot.closed {
                Self::abandon(&mut slot, ticket);
                self.changed.notify_all();
                return Err(BridgeError::Closed);
            }

            slot = self.changed.wait(slot).map_err(|_| BridgeError::Poisoned)?;
        }
    }

    /// Runs the pending command, if any, and posts its response. Never blocks
    /// on other submitters. Returns true when a command was serviced.
    pub fn service<F>(&self, execute: F) -> bool
    where
        F: FnOnce(Command) -> ControlResponse,
    {
        let (ticket, command) = match self.lock() {
            Ok(mut slot) => match slot.pending.take() {
                Some(pending) => pending,
                None => return false,
            },
            Err(_) => return false,
        };

        debug!("servicing bridged command {:?} (ticket {})", command, ticket);
        let response = execute(command);

        if let Ok(mut slot) = self.lock() {
            if slot.active == Some(ticket) {
                slot.response = Some((ticket, response));
            }
            self.changed.notify_all();
        }
        true
    }

    /// Fails every current and future submission with [`BridgeError::Closed`].
    pub fn close(&self) {
        if let Ok(mut slot) = self.lock() {
            slot.closed = true;
            slot.pending = None;
        }
        self.changed.notify_all();
    }

    pub fn is_busy(&self) -> bool {
        self.lock().map(|slot| slot.active.is_some()).unwrap_or(false)
    }

    // Private

    fn lock(&self) -> Result<MutexGuard<'_, Slot>, BridgeError> {
        self.slot.lock().map_err(|_| BridgeError::Poisoned)
    }

    fn wait_for_slot<'a>(
        &self,
        slot: MutexGuard<'a, Slot>,
        started: Instant,
    ) -> Result<MutexGuard<'a, Slot>, BridgeError> {
        match self.wait_ceiling {
            None => self.changed.wait(slot).map_err(|_| BridgeError::Poisoned),
            Some(ceiling) => {
                let waited = started.elapsed();
                if waited >= ceiling {
                    return Err(BridgeError::Contention { waited });
                }
                self.changed
                    .wait_timeout(slot, ceiling - waited)
                    .map(|(slot, _)| slot)
                    .map_err(|_| BridgeError::Poisoned)
            }
        }
    }

    fn abandon(slot: &mut Slot, ticket: u64) {
        if slot.active == Some(ticket) {
            slot.active = None;
        }
        if matches!(slot.pending, Some((pending, _)) if pending == ticket) {
            slot.pending = None;
        }
    }
}
