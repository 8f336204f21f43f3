use {axum::body::Bytes, tokio::sync::mpsc, tracing::warn};

use pairlink_protocol::ServerFrame;

/// Work item for a connection's write loop.
#[derive(Debug)]
pub enum Outbound {
    /// Serialized JSON frame.
    Frame(String),
    Pong(Bytes),
    /// Send a close frame and stop writing.
    Close,
}

/// Sending half of a connection: the only way anything reaches a socket.
///
/// Every send is fire-and-forget. Once the write loop has exited the calls
/// report `false` and do nothing else.
#[derive(Debug, Clone)]
pub struct Outbox {
    conn_id: String,
    sender: mpsc::UnboundedSender<Outbound>,
}

impl Outbox {
    pub fn new(conn_id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                conn_id: conn_id.into(),
                sender,
            },
            receiver,
        )
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }

    pub fn send(&self, frame: &ServerFrame) -> bool {
        match frame.to_json() {
            Ok(json) => self.sender.send(Outbound::Frame(json)).is_ok(),
            Err(e) => {
                warn!(conn_id = %self.conn_id, kind = frame.kind(), error = %e, "failed to serialize frame");
                false
            },
        }
    }

    pub fn pong(&self, payload: Bytes) -> bool {
        self.sender.send(Outbound::Pong(payload)).is_ok()
    }

    /// Ask the write loop to flush what is queued, then close the socket.
    pub fn close(&self) -> bool {
        self.sender.send(Outbound::Close).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_queued_in_order_before_close() {
        let (outbox, mut rx) = Outbox::new("c1");
        assert!(outbox.send(&ServerFrame::CodeAnnounce {
            code: "SCP-000000".into()
        }));
        assert!(outbox.close());

        match rx.try_recv().unwrap() {
            Outbound::Frame(json) => assert!(json.contains("code-announce")),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(rx.try_recv().unwrap(), Outbound::Close));
    }

    #[test]
    fn sending_after_writer_is_gone_is_a_no_op() {
        let (outbox, rx) = Outbox::new("c1");
        drop(rx);
        assert!(!outbox.send(&ServerFrame::ServerShutdown {
            reason: "bye".into()
        }));
        assert!(!outbox.close());
    }
}
