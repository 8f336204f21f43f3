//! The single active pairing session: its code, occupants and monitor.

use pairlink_protocol::{MAX_OCCUPANTS, RejectReason, ServerFrame};

use crate::{outbox::Outbox, registry::Slot};

/// A chat participant holding one slot of the session.
#[derive(Debug)]
pub struct Occupant {
    pub slot: Slot,
    pub display_name: String,
    outbox: Outbox,
}

impl Occupant {
    pub fn conn_id(&self) -> &str {
        self.outbox.conn_id()
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }
}

/// Occupancy phase of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Half,
    Full,
}

#[derive(Debug)]
pub struct SessionState {
    code: String,
    /// Join order; index 0 holds slot 1.
    occupants: Vec<Occupant>,
    monitor: Option<Outbox>,
}

impl SessionState {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            occupants: Vec::with_capacity(MAX_OCCUPANTS),
            monitor: None,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn phase(&self) -> Phase {
        match self.occupants.len() {
            0 => Phase::Empty,
            1 => Phase::Half,
            _ => Phase::Full,
        }
    }

    pub fn occupants(&self) -> &[Occupant] {
        &self.occupants
    }

    pub fn occupant_count(&self) -> usize {
        self.occupants.len()
    }

    pub fn names(&self) -> Vec<String> {
        self.occupants
            .iter()
            .map(|o| o.display_name.clone())
            .collect()
    }

    pub fn occupant(&self, conn_id: &str) -> Option<&Occupant> {
        self.occupants.iter().find(|o| o.conn_id() == conn_id)
    }

    /// The other occupant, if `conn_id` is one and a counterpart exists.
    pub fn counterpart_of(&self, conn_id: &str) -> Option<&Occupant> {
        self.occupant(conn_id)?;
        self.occupants.iter().find(|o| o.conn_id() != conn_id)
    }

    /// Append a new occupant in the next free slot.
    pub fn admit(
        &mut self,
        outbox: Outbox,
        display_name: String,
    ) -> Result<&Occupant, RejectReason> {
        let slot =
            Slot::from_index(self.occupants.len()).ok_or(RejectReason::SessionFull)?;
        self.occupants.push(Occupant {
            slot,
            display_name,
            outbox,
        });
        self.occupants.last().ok_or(RejectReason::SessionFull)
    }

    /// Remove an occupant, renumbering any later one so slots stay dense.
    pub fn remove_occupant(&mut self, conn_id: &str) -> Option<Occupant> {
        let index = self.occupants.iter().position(|o| o.conn_id() == conn_id)?;
        let removed = self.occupants.remove(index);
        for (i, occupant) in self.occupants.iter_mut().enumerate() {
            if let Some(slot) = Slot::from_index(i) {
                occupant.slot = slot;
            }
        }
        Some(removed)
    }

    /// Empty both slots, handing the records to the caller.
    pub fn take_occupants(&mut self) -> Vec<Occupant> {
        std::mem::take(&mut self.occupants)
    }

    /// Start a new epoch under `code`. Only legal once every slot is empty.
    pub fn rekey(&mut self, code: String) {
        debug_assert!(self.occupants.is_empty(), "rekey with occupants present");
        self.code = code;
    }

    pub fn monitor(&self) -> Option<&Outbox> {
        self.monitor.as_ref()
    }

    /// Install a monitor, returning the one it displaced.
    pub fn set_monitor(&mut self, outbox: Outbox) -> Option<Outbox> {
        self.monitor.replace(outbox)
    }

    /// Clear the monitor only if `conn_id` is still the attached one.
    pub fn clear_monitor(&mut self, conn_id: &str) -> Option<Outbox> {
        if self.monitor.as_ref().is_some_and(|m| m.conn_id() == conn_id) {
            return self.monitor.take();
        }
        None
    }

    pub fn status_frame(&self) -> ServerFrame {
        ServerFrame::Status {
            connected_count: self.occupants.len(),
            max: MAX_OCCUPANTS,
            names: self.names(),
        }
    }

    pub fn code_frame(&self) -> ServerFrame {
        ServerFrame::CodeAnnounce {
            code: self.code.clone(),
        }
    }
}
