//! WebSocket session lifecycle. Handles a single connected client from
//! upgrade through disconnect.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge, histogram};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::connection::ClientConnection;
use super::heartbeat::{HeartbeatResult, run_heartbeat};
use super::registry::ConnectionRegistry;
use crate::config::ServerConfig;
use crate::metrics::{
    WS_CONNECTION_DURATION_SECONDS, WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL,
    WS_DISCONNECTIONS_TOTAL,
};

/// How long the writer gets to send its Close frame.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The client closed the socket or the read side failed.
    ClientClosed,
    /// The client went silent past the heartbeat timeout.
    HeartbeatTimeout,
    /// Writing to the socket failed.
    WriterStopped,
    /// The server is shutting down.
    Shutdown,
}

/// Run a WebSocket session for a connected client.
///
/// 1. Registers the connection with the registry
/// 2. Forwards queued payloads and periodic Ping frames to the socket
/// 3. Reads and discards inbound frames; any frame refreshes liveness
/// 4. Ends on close, heartbeat timeout, write failure or shutdown
/// 5. Unregisters on every exit path
#[instrument(skip_all, fields(client_id = %client_id))]
pub async fn run_ws_session(
    ws: WebSocket,
    client_id: String,
    registry: Arc<ConnectionRegistry>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) -> SessionEnd {
    let (ws_tx, mut ws_rx) = ws.split();

    let (send_tx, send_rx) = mpsc::channel::<Arc<str>>(config.send_queue_capacity.max(1));
    let connection = Arc::new(ClientConnection::new(client_id.clone(), send_tx));

    let connection_start = Instant::now();
    let _ = registry.register(Arc::clone(&connection)).await;
    info!(client_id, "client connected");
    counter!(WS_CONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);

    let session_cancel = shutdown.child_token();
    let mut writer = tokio::spawn(write_loop(
        ws_tx,
        send_rx,
        config.heartbeat_interval(),
        session_cancel.clone(),
    ));

    let heartbeat = run_heartbeat(
        Arc::clone(&connection),
        config.heartbeat_interval(),
        config.heartbeat_timeout(),
        session_cancel.clone(),
    );

    let reader = async {
        while let Some(Ok(msg)) = ws_rx.next().await {
            connection.mark_alive();
            match msg {
                Message::Close(_) => {
                    debug!("client sent close frame");
                    break;
                }
                Message::Text(text) => trace!(len = text.len(), "ignoring inbound text frame"),
                Message::Binary(data) => trace!(len = data.len(), "ignoring inbound binary frame"),
                Message::Ping(_) | Message::Pong(_) => {}
            }
        }
    };

    let end = tokio::select! {
        () = reader => SessionEnd::ClientClosed,
        result = heartbeat => match result {
            HeartbeatResult::TimedOut => {
                warn!(
                    silent_for = ?connection.last_pong_elapsed(),
                    "client unresponsive, disconnecting"
                );
                SessionEnd::HeartbeatTimeout
            }
            HeartbeatResult::Cancelled => SessionEnd::Shutdown,
        },
        _ = &mut writer => SessionEnd::WriterStopped,
    };

    // Unregister before stopping the writer so no broadcast targets a dead queue.
    let _ = registry.unregister(&client_id).await;
    session_cancel.cancel();
    if end != SessionEnd::WriterStopped
        && tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
            .await
            .is_err()
    {
        writer.abort();
    }

    info!(
        client_id,
        ?end,
        dropped = connection.drop_count(),
        age_secs = connection.age().as_secs(),
        "client disconnected"
    );
    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);
    histogram!(WS_CONNECTION_DURATION_SECONDS).record(connection_start.elapsed().as_secs_f64());
    end
}

/// Drain the outbound queue into the socket, pinging every `ping_interval`.
///
/// Sends a Close frame when cancelled.
async fn write_loop<S>(
    mut ws_tx: S,
    mut send_rx: mpsc::Receiver<Arc<str>>,
    ping_interval: Duration,
    cancel: CancellationToken,
) where
    S: futures::Sink<Message> + Unpin,
{
    let mut ping = tokio::time::interval_at(
        tokio::time::Instant::now() + ping_interval,
        ping_interval,
    );

    loop {
        tokio::select! {
            msg = send_rx.recv() => {
                let Some(text) = msg else { break };
                if ws_tx.send(Message::Text((&*text).into())).await.is_err() {
                    break;
                }
            }
            _ = ping.tick() => {
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    break;
                }
            }
            () = cancel.cancelled() => {
                let _ = ws_tx.send(Message::Close(None)).await;
                break;
            }
        }
    }
}
