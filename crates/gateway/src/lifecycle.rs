//! Session state machine: monitor attach, join admission, disconnects,
//! teardown and shutdown.
//!
//! ```text
//! EMPTY ──join──▶ HALF ──join──▶ FULL
//!   ▲               │              │
//!   └──lone leaves──┘              │
//!   ▲                              │
//!   └──any leaves: new code────────┘
//! ```
//!
//! All methods take `&mut self`; the gateway keeps the manager behind a
//! single lock so transitions never interleave.

use tracing::{debug, info, warn};

use {
    pairlink_config::SessionConfig,
    pairlink_protocol::{RejectReason, ServerFrame},
};

use crate::{
    code::{CodeGenerator, codes_match},
    outbox::Outbox,
    registry::{ConnectionRegistry, Role, Slot},
    relay::{RelayOutcome, relay_chat},
    session::{Phase, SessionState},
};

pub const PEER_LEFT_REASON: &str = "The other client disconnected. Session ended.";
pub const CHAT_READY_MESSAGE: &str = "Both clients connected! You can start chatting.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    Admitted { slot: Slot, paired: bool },
    Rejected(RejectReason),
    /// The connection already holds this role; roles are exclusive.
    Ignored(Role),
    ShuttingDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Nothing held, or already released.
    NoRole,
    MonitorDetached,
    /// The lone occupant left. The code stays valid.
    SlotReopened,
    /// A paired occupant left and the session restarted under a new code.
    TornDown {
        previous_code: String,
        new_code: String,
    },
    /// Released while shutting down; no transition taken.
    Released(Role),
}

pub struct LifecycleManager {
    session: SessionState,
    registry: ConnectionRegistry,
    codes: CodeGenerator,
    default_display_name: String,
    shutting_down: bool,
}

impl LifecycleManager {
    pub fn new(codes: CodeGenerator, default_display_name: impl Into<String>) -> Self {
        let session = SessionState::new(codes.generate());
        Self {
            session,
            registry: ConnectionRegistry::new(),
            codes,
            default_display_name: default_display_name.into(),
            shutting_down: false,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            CodeGenerator::from_config(config),
            config.default_display_name.clone(),
        )
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn code(&self) -> &str {
        self.session.code()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    /// Attach `outbox` as the monitor, displacing any previous one without
    /// telling it. The new monitor immediately gets the code and occupancy.
    pub fn attach_monitor(&mut self, outbox: &Outbox) -> bool {
        if self.shutting_down {
            return false;
        }
        let conn_id = outbox.conn_id();
        match self.registry.role_of(conn_id) {
            Role::Occupant(slot) => {
                warn!(conn_id, slot = slot.number(), "occupant tried to attach as monitor, ignored");
                return false;
            },
            Role::Monitor => debug!(conn_id, "monitor re-attached"),
            Role::Unassigned => {
                if let Some(previous) = self.session.set_monitor(outbox.clone()) {
                    debug!(previous = %previous.conn_id(), "replacing stale monitor");
                    self.registry.release(previous.conn_id());
                }
                if let Err(e) = self.registry.assign(conn_id, Role::Monitor) {
                    warn!(conn_id, error = %e, "monitor registration conflict");
                }
            },
        }

        outbox.send(&self.session.code_frame());
        outbox.send(&self.session.status_frame());
        info!(conn_id, code = %self.session.code(), "monitor attached");
        true
    }

    /// Admit `outbox` as an occupant if `code` is the active one and a slot
    /// is free. The requester always gets an answer frame; rejection leaves
    /// the connection open for another attempt.
    pub fn join(
        &mut self,
        outbox: &Outbox,
        code: &str,
        display_name: Option<String>,
    ) -> JoinOutcome {
        if self.shutting_down {
            return JoinOutcome::ShuttingDown;
        }
        let conn_id = outbox.conn_id();
        let role = self.registry.role_of(conn_id);
        if role != Role::Unassigned {
            warn!(conn_id, %role, "join from a connection that already holds a role, ignored");
            return JoinOutcome::Ignored(role);
        }

        if !codes_match(code, self.session.code()) {
            info!(conn_id, "join rejected: invalid code");
            outbox.send(&ServerFrame::join_rejected(RejectReason::InvalidCode));
            return JoinOutcome::Rejected(RejectReason::InvalidCode);
        }

        let name = display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.default_display_name.clone());

        let slot = match self.session.admit(outbox.clone(), name.clone()) {
            Ok(occupant) => occupant.slot,
            Err(reason) => {
                info!(conn_id, "join rejected: session full");
                outbox.send(&ServerFrame::join_rejected(reason));
                return JoinOutcome::Rejected(reason);
            },
        };
        if let Err(e) = self.registry.assign(conn_id, Role::Occupant(slot)) {
            warn!(conn_id, error = %e, "slot registration conflict, rolling back admission");
            self.session.remove_occupant(conn_id);
            outbox.send(&ServerFrame::join_rejected(RejectReason::SessionFull));
            return JoinOutcome::Rejected(RejectReason::SessionFull);
        }
        info!(conn_id, slot = slot.number(), name = %name, "occupant joined");

        let paired = self.session.phase() == Phase::Full;
        if paired {
            let waiting_name = self
                .session
                .counterpart_of(conn_id)
                .map(|waiting| {
                    waiting.outbox().send(&ServerFrame::CounterpartJoined {
                        other_name: name.clone(),
                    });
                    waiting.display_name.clone()
                });
            outbox.send(&ServerFrame::JoinAccepted {
                slot: slot.number(),
                waiting_for_other: false,
                other_name: waiting_name,
            });
            let ready = ServerFrame::ChatReady {
                message: CHAT_READY_MESSAGE.into(),
            };
            for occupant in self.session.occupants() {
                occupant.outbox().send(&ready);
            }
            info!("both occupants connected, chat ready");
        } else {
            outbox.send(&ServerFrame::JoinAccepted {
                slot: slot.number(),
                waiting_for_other: true,
                other_name: None,
            });
        }
        self.notify_monitor_status();

        JoinOutcome::Admitted { slot, paired }
    }

    pub fn chat(&self, conn_id: &str, message: String) -> RelayOutcome {
        if self.shutting_down {
            debug!(conn_id, "chat after shutdown started, dropped");
            return RelayOutcome::ShuttingDown;
        }
        relay_chat(&self.session, &self.registry, conn_id, message)
    }

    /// Handle a connection going away, whether it said `leave`, closed
    /// cleanly or dropped. Repeated calls for one connection are no-ops.
    pub fn disconnect(&mut self, conn_id: &str) -> DisconnectOutcome {
        let Some(role) = self.registry.release(conn_id) else {
            return DisconnectOutcome::NoRole;
        };
        if self.shutting_down {
            return DisconnectOutcome::Released(role);
        }

        match role {
            Role::Unassigned => DisconnectOutcome::NoRole,
            Role::Monitor => {
                self.session.clear_monitor(conn_id);
                info!(conn_id, "monitor detached");
                DisconnectOutcome::MonitorDetached
            },
            Role::Occupant(slot) if self.session.phase() == Phase::Full => {
                info!(conn_id, slot = slot.number(), "paired occupant left");
                self.teardown(conn_id)
            },
            Role::Occupant(slot) => {
                self.session.remove_occupant(conn_id);
                info!(conn_id, slot = slot.number(), "lone occupant left, slot reopened");
                self.notify_monitor_status();
                DisconnectOutcome::SlotReopened
            },
        }
    }

    /// Notify and close every occupant and the monitor. No further state
    /// transitions happen afterwards.
    pub fn shutdown(&mut self, reason: &str) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;

        let frame = ServerFrame::ServerShutdown {
            reason: reason.to_string(),
        };
        for occupant in self.session.occupants() {
            occupant.outbox().send(&frame);
            occupant.outbox().close();
        }
        if let Some(monitor) = self.session.monitor() {
            monitor.send(&frame);
            monitor.close();
        }
        info!(
            occupants = self.session.occupant_count(),
            monitor = self.session.monitor().is_some(),
            "shutdown notice sent"
        );
    }

    /// Hard teardown of a full session after `leaving` went away.
    fn teardown(&mut self, leaving: &str) -> DisconnectOutcome {
        let ended = ServerFrame::SessionEnded {
            reason: PEER_LEFT_REASON.into(),
        };
        for occupant in self.session.take_occupants() {
            self.registry.release(occupant.conn_id());
            if occupant.conn_id() != leaving {
                occupant.outbox().send(&ended);
                occupant.outbox().close();
            }
        }

        let previous_code = self.session.code().to_string();
        let new_code = self.codes.regenerate(&previous_code);
        self.session.rekey(new_code.clone());
        info!(code = %new_code, "session ended, new code issued");

        if let Some(monitor) = self.session.monitor() {
            monitor.send(&self.session.code_frame());
            monitor.send(&self.session.status_frame());
        }

        DisconnectOutcome::TornDown {
            previous_code,
            new_code,
        }
    }

    fn notify_monitor_status(&self) {
        if let Some(monitor) = self.session.monitor() {
            monitor.send(&self.session.status_frame());
        }
    }
}
