//! Inbound frame routing: decode, then dispatch to the lifecycle manager.

use tracing::{debug, warn};

use pairlink_protocol::{ClientFrame, FrameError, decode_client_frame};

use crate::{
    lifecycle::{DisconnectOutcome, JoinOutcome, LifecycleManager},
    outbox::Outbox,
    relay::RelayOutcome,
};

/// Result of handling one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    MonitorAttached(bool),
    Join(JoinOutcome),
    Chat(RelayOutcome),
    Left(DisconnectOutcome),
    /// Undecodable or of a type this gateway does not speak.
    Dropped,
}

/// Decode `raw` from the connection behind `outbox` and apply it.
///
/// Protocol errors never close the connection: the frame is logged and
/// dropped.
pub fn route(lifecycle: &mut LifecycleManager, outbox: &Outbox, raw: &str) -> Routed {
    match decode_client_frame(raw) {
        Ok(frame) => dispatch(lifecycle, outbox, frame),
        Err(FrameError::UnknownType(kind)) => {
            debug!(conn_id = %outbox.conn_id(), kind = %kind, "ignoring frame of unknown type");
            Routed::Dropped
        },
        Err(e) => {
            warn!(conn_id = %outbox.conn_id(), error = %e, "dropping malformed frame");
            Routed::Dropped
        },
    }
}

pub fn dispatch(lifecycle: &mut LifecycleManager, outbox: &Outbox, frame: ClientFrame) -> Routed {
    debug!(conn_id = %outbox.conn_id(), kind = frame.kind(), "frame received");
    match frame {
        ClientFrame::MonitorAttach => Routed::MonitorAttached(lifecycle.attach_monitor(outbox)),
        ClientFrame::Join { code, display_name } => {
            Routed::Join(lifecycle.join(outbox, &code, display_name))
        },
        ClientFrame::Chat { message } => Routed::Chat(lifecycle.chat(outbox.conn_id(), message)),
        ClientFrame::Leave => Routed::Left(lifecycle.disconnect(outbox.conn_id())),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::registry::{Role, Slot},
        pairlink_config::SessionConfig,
    };

    fn manager() -> LifecycleManager {
        LifecycleManager::from_config(&SessionConfig::default())
    }

    #[test]
    fn routes_join_and_chat() {
        let mut lc = manager();
        let (a, _rx_a) = Outbox::new("a");
        let (b, mut rx_b) = Outbox::new("b");
        let join = format!(r#"{{"type":"join","code":"{}","displayName":"Ada"}}"#, lc.code());

        assert!(matches!(
            route(&mut lc, &a, &join),
            Routed::Join(JoinOutcome::Admitted { slot: Slot::First, .. })
        ));
        assert!(matches!(
            route(&mut lc, &b, &join.replace("Ada", "Bo")),
            Routed::Join(JoinOutcome::Admitted { slot: Slot::Second, .. })
        ));
        while rx_b.try_recv().is_ok() {}

        assert_eq!(
            route(&mut lc, &a, r#"{"type":"chat","message":"hi"}"#),
            Routed::Chat(RelayOutcome::Delivered {
                from: Slot::First,
                to: Slot::Second,
            })
        );
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn bad_frames_are_dropped_without_side_effects() {
        let mut lc = manager();
        let (a, mut rx) = Outbox::new("a");
        for raw in [
            "not json",
            "[1,2,3]",
            r#"{"no":"type"}"#,
            r#"{"type":"teleport"}"#,
            r#"{"type":"join"}"#,
            r#"{"type":"chat","message":42}"#,
        ] {
            assert_eq!(route(&mut lc, &a, raw), Routed::Dropped, "{raw}");
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(lc.registry().count(), 0);
    }

    #[test]
    fn non_string_display_name_still_gets_an_answer() {
        let mut lc = manager();
        let (a, mut rx) = Outbox::new("a");
        let join = format!(r#"{{"type":"join","code":"{}","displayName":42}}"#, lc.code());

        assert!(matches!(route(&mut lc, &a, &join), Routed::Join(JoinOutcome::Admitted { .. })));
        assert!(rx.try_recv().is_ok());
        assert_eq!(lc.session().names(), vec!["Anonymous"]);
    }

    #[test]
    fn leave_from_unassigned_is_a_no_op() {
        let mut lc = manager();
        let (a, _rx) = Outbox::new("a");
        assert_eq!(
            route(&mut lc, &a, r#"{"type":"leave"}"#),
            Routed::Left(DisconnectOutcome::NoRole)
        );
    }

    #[test]
    fn leave_keeps_connection_usable_for_a_fresh_join() {
        let mut lc = manager();
        let (a, _rx) = Outbox::new("a");
        let join = format!(r#"{{"type":"join","code":"{}"}}"#, lc.code());
        route(&mut lc, &a, &join);
        assert_eq!(
            route(&mut lc, &a, r#"{"type":"leave"}"#),
            Routed::Left(DisconnectOutcome::SlotReopened)
        );
        assert_eq!(lc.registry().role_of("a"), Role::Unassigned);
        assert!(matches!(route(&mut lc, &a, &join), Routed::Join(JoinOutcome::Admitted { .. })));
    }

    #[test]
    fn monitor_attach_routes() {
        let mut lc = manager();
        let (m, mut rx) = Outbox::new("m");
        assert_eq!(
            route(&mut lc, &m, r#"{"type":"monitor-attach"}"#),
            Routed::MonitorAttached(true)
        );
        assert!(rx.try_recv().is_ok());
    }
}
