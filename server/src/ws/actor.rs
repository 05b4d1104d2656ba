use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout};

use crate::signaling::membership;
use crate::state::{AppState, Liveness};
use crate::ws::broadcast::send_to;
use crate::ws::protocol::{self, ServerMessage};

/// Close code sent when the client stops answering pings ("going away").
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer may keep flushing queued frames after the reader stops.
const WRITER_FLUSH_GRACE: Duration = Duration::from_secs(1);

/// Run the actor-per-connection pattern for one signaling WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from an mpsc channel
/// - Ping task: sends periodic pings; on a missed pong it queues a close frame
///   and tells the reader loop to stop
/// - Reader loop: decodes inbound frames and dispatches to the signaling handlers
///
/// However the reader loop ends, the connection is removed from every room
/// and then from the registry.
pub async fn run_connection(socket: WebSocket, state: AppState) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    let connection_id = state.connections.register(tx.clone());
    send_to(
        &state.connections,
        &connection_id,
        &ServerMessage::Connected {
            connection_id: connection_id.clone(),
        },
    );
    tracing::info!(connection_id = %connection_id, "WebSocket actor started");

    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let (dead_tx, mut dead_rx) = oneshot::channel::<()>();
    let ping_handle = tokio::spawn(ping_task(tx.clone(), pong_rx, dead_tx, state.liveness));

    loop {
        // A silent peer never answers our close frame, so the reader cannot
        // wait on the stream alone.
        let next = tokio::select! {
            next = ws_receiver.next() => next,
            _ = &mut dead_rx => {
                tracing::info!(connection_id = %connection_id, "Dropping unresponsive connection");
                break;
            }
        };

        match next {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), &connection_id, &state);
                }
                Message::Binary(data) => {
                    tracing::debug!(
                        connection_id = %connection_id,
                        bytes = data.len(),
                        "Ignoring binary frame"
                    );
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(
                        connection_id = %connection_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "WebSocket receive error"
                );
                break;
            }
            None => {
                tracing::info!(connection_id = %connection_id, "WebSocket stream ended");
                break;
            }
        }
    }

    ping_handle.abort();

    membership::handle_disconnect(&state, &connection_id);
    state.connections.unregister(&connection_id);

    // Let the writer flush a pending close frame, but never wait on a stalled peer.
    drop(tx);
    let writer_abort = writer_handle.abort_handle();
    if timeout(WRITER_FLUSH_GRACE, writer_handle).await.is_err() {
        writer_abort.abort();
    }

    tracing::info!(connection_id = %connection_id, "WebSocket actor stopped");
}

/// Writer task: receives messages from mpsc channel and forwards them to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            break;
        }
    }
}

/// Ping task: one ping per interval, close if the pong does not arrive in time.
///
/// Fires `dead` when the deadline passes. Dropping `dead` without firing it
/// (the writer is gone) also ends the reader loop.
async fn ping_task(
    tx: mpsc::UnboundedSender<Message>,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    dead: oneshot::Sender<()>,
    liveness: Liveness,
) {
    let mut ping_timer = interval(liveness.ping_interval);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        // Only a pong that answers this ping counts
        while pong_rx.try_recv().is_ok() {}

        if tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            break;
        }

        match timeout(liveness.pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!("Pong timeout, closing connection");
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: "Pong timeout".into(),
                })));
                let _ = dead.send(());
                break;
            }
        }
    }
}
