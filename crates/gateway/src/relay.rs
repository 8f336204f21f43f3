use tracing::debug;

use pairlink_protocol::ServerFrame;

use crate::{
    registry::{ConnectionRegistry, Role, Slot},
    session::{Phase, SessionState},
};

/// What happened to one chat frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered { from: Slot, to: Slot },
    /// Sender is an occupant but the session is not full.
    NoCounterpart,
    /// Sender holds no occupant slot (monitor or unassigned).
    NotAnOccupant,
    /// Counterpart's write loop has already gone away.
    CounterpartGone,
    /// Server is shutting down; nothing is relayed.
    ShuttingDown,
}

/// Forward `message` from the occupant on `from_conn` to the other occupant.
///
/// The sender is attributed by the display name stored at join time. Nothing
/// is buffered: a frame that cannot be delivered now is dropped.
pub fn relay_chat(
    session: &SessionState,
    registry: &ConnectionRegistry,
    from_conn: &str,
    message: String,
) -> RelayOutcome {
    let Role::Occupant(from) = registry.role_of(from_conn) else {
        debug!(conn_id = %from_conn, "chat from a connection without a slot, dropped");
        return RelayOutcome::NotAnOccupant;
    };
    let Some(sender) = session.occupant(from_conn) else {
        debug!(conn_id = %from_conn, "chat from a released occupant, dropped");
        return RelayOutcome::NotAnOccupant;
    };
    if session.phase() != Phase::Full {
        debug!(conn_id = %from_conn, slot = from.number(), "no counterpart to relay to, dropped");
        return RelayOutcome::NoCounterpart;
    }
    let Some(receiver) = session.counterpart_of(from_conn) else {
        return RelayOutcome::NoCounterpart;
    };

    let frame = ServerFrame::ChatRelay {
        message,
        sender: sender.display_name.clone(),
    };
    if receiver.outbox().send(&frame) {
        debug!(from = from.number(), to = receiver.slot.number(), "chat relayed");
        RelayOutcome::Delivered {
            from,
            to: receiver.slot,
        }
    } else {
        debug!(conn_id = %receiver.conn_id(), "counterpart writer closed, chat dropped");
        RelayOutcome::CounterpartGone
    }
}
