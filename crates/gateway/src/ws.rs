use std::{net::SocketAddr, sync::Arc, time::Duration};

use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, StreamExt},
    tracing::{debug, info, warn},
};

use crate::{
    outbox::{Outbound, Outbox},
    router,
    state::{ConnectedClient, GatewayState},
};

/// How long a closing connection may take to flush queued frames.
const WRITE_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle a single WebSocket connection through its full lifecycle:
/// register → route frames → disconnect.
pub async fn handle_connection(
    socket: WebSocket,
    state: Arc<GatewayState>,
    remote_addr: SocketAddr,
) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbox, mut outbound_rx) = Outbox::new(conn_id.clone());

    info!(conn_id = %conn_id, remote_ip = %remote_addr, "ws: new connection");
    state
        .register_client(ConnectedClient::new(&conn_id, remote_addr))
        .await;

    // Write loop: everything for this socket goes through the outbox queue.
    let write_conn_id = conn_id.clone();
    let mut write_handle = tokio::spawn(async move {
        while let Some(item) = outbound_rx.recv().await {
            let result = match item {
                Outbound::Frame(json) => ws_tx.send(Message::Text(json.into())).await,
                Outbound::Pong(payload) => ws_tx.send(Message::Pong(payload)).await,
                Outbound::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                },
            };
            if result.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write failed, peer gone");
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    let mut writer_done = false;
    loop {
        tokio::select! {
            _ = &mut write_handle => {
                debug!(conn_id = %conn_id, "ws: write loop finished");
                writer_done = true;
                break;
            },
            () = state.shutdown.cancelled() => {
                outbox.close();
                break;
            },
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    state.touch_client(&conn_id).await;
                    let mut lifecycle = state.lifecycle.lock().await;
                    router::route(&mut lifecycle, &outbox, text.as_str());
                },
                Some(Ok(Message::Ping(payload))) => {
                    outbox.pong(payload);
                },
                Some(Ok(Message::Pong(_))) => {},
                Some(Ok(Message::Binary(_))) => {
                    debug!(conn_id = %conn_id, "ws: ignoring binary frame");
                },
                Some(Ok(Message::Close(_))) | None => {
                    debug!(conn_id = %conn_id, "ws: peer closed");
                    break;
                },
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "ws: read error");
                    break;
                },
            },
        }
    }

    // Cleanup: release the role first so the counterpart hears about it
    // before this socket is gone.
    let outcome = state.lifecycle.lock().await.disconnect(&conn_id);
    outbox.close();
    if !writer_done && tokio::time::timeout(WRITE_DRAIN_TIMEOUT, &mut write_handle).await.is_err()
    {
        debug!(conn_id = %conn_id, "ws: write loop did not drain in time");
        write_handle.abort();
    }

    let duration = state
        .remove_client(&conn_id)
        .await
        .map(|client| client.connected_for())
        .unwrap_or_default();
    info!(
        conn_id = %conn_id,
        outcome = ?outcome,
        duration_secs = duration.as_secs(),
        "ws: connection closed"
    );
}
