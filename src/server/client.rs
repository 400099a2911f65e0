//! Per-connection client handle.
//!
//! Wraps one established WebSocket connection and owns its socket pump tasks.
//! Ownership of the handle transfers to the music server on registration; the
//! listener keeps no reference after handoff.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::messages::{msg_types, system, ClientMessage, ServerMessage};

/// A server-side WebSocket stream over plain TCP.
pub type WsStream = WebSocketStream<TcpStream>;

/// Outgoing channel capacity; slow clients past this are dropped on send.
const OUTGOING_BUFFER_SIZE: usize = 32;

static NEXT_CLIENT_ID: AtomicUsize = AtomicUsize::new(1);

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SendError {
    /// The connection is gone (client disconnected or handle closed).
    Disconnected,
    /// The outgoing buffer is full (client not draining its socket).
    BufferFull,
}

/// Handle to one connected client.
///
/// Construction spawns two tasks: one forwarding queued outgoing messages to
/// the socket sink, one draining the incoming stream (answering heartbeats,
/// detecting disconnects). Both tasks stop when either side goes away or
/// `close` is called.
pub struct ServerClient {
    id: usize,
    peer_addr: SocketAddr,
    outgoing: mpsc::Sender<ServerMessage>,
    closed: CancellationToken,
}

impl ServerClient {
    /// Wrap an established WebSocket connection.
    pub fn new(ws: WsStream, peer_addr: SocketAddr) -> Self {
        let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
        let (outgoing_tx, outgoing_rx) = mpsc::channel(OUTGOING_BUFFER_SIZE);
        let closed = CancellationToken::new();

        let (ws_sink, ws_stream) = ws.split();
        tokio::spawn(forward_outgoing(ws_sink, outgoing_rx, closed.clone()));
        tokio::spawn(process_incoming(
            ws_stream,
            outgoing_tx.clone(),
            id,
            closed.clone(),
        ));

        debug!("Client {} connected from {}", id, peer_addr);

        Self {
            id,
            peer_addr,
            outgoing: outgoing_tx,
            closed,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Queue a message for delivery. Never blocks the caller.
    pub fn send(&self, message: ServerMessage) -> Result<(), SendError> {
        self.outgoing.try_send(message).map_err(|e| match e {
            mpsc::error::TrySendError::Closed(_) => SendError::Disconnected,
            mpsc::error::TrySendError::Full(_) => SendError::BufferFull,
        })
    }

    /// Whether the underlying connection is still up.
    pub fn is_connected(&self) -> bool {
        !self.outgoing.is_closed()
    }

    /// Tear down the connection. Idempotent; the socket close completes
    /// asynchronously in the pump tasks.
    pub fn close(&self) {
        self.closed.cancel();
    }
}

/// Forward messages from the outgoing channel to the WebSocket sink.
///
/// Exits when the channel closes, the socket dies, or the handle is closed;
/// on handle close a close frame is sent first.
async fn forward_outgoing(
    mut ws_sink: SplitSink<WsStream, Message>,
    mut outgoing_rx: mpsc::Receiver<ServerMessage>,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            maybe_msg = outgoing_rx.recv() => {
                let Some(msg) = maybe_msg else { break };
                match serde_json::to_string(&msg) {
                    Ok(json) => {
                        if ws_sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                    }
                }
            }
            _ = closed.cancelled() => {
                let _ = ws_sink.send(Message::Close(None)).await;
                break;
            }
        }
    }
}

/// Drain incoming messages from the WebSocket stream.
///
/// Answers envelope-level pings, reports parse failures back to the client,
/// and cancels the shared token on exit so the write pump stops too.
async fn process_incoming(
    mut ws_stream: SplitStream<WsStream>,
    outgoing: mpsc::Sender<ServerMessage>,
    client_id: usize,
    closed: CancellationToken,
) {
    loop {
        tokio::select! {
            maybe_result = ws_stream.next() => {
                match maybe_result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(msg) if msg.msg_type == msg_types::PING => {
                                let _ = outgoing
                                    .try_send(ServerMessage::new(msg_types::PONG, system::Pong));
                            }
                            Ok(msg) => {
                                debug!(
                                    "Client {} sent unhandled message type: {}",
                                    client_id, msg.msg_type
                                );
                            }
                            Err(e) => {
                                debug!("Failed to parse message from client {}: {}", client_id, e);
                                let _ = outgoing.try_send(ServerMessage::new(
                                    msg_types::ERROR,
                                    system::Error::new(
                                        "parse_error",
                                        format!("Invalid message format: {}", e),
                                    ),
                                ));
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        debug!("Client {} sent binary message, ignoring", client_id);
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        // Pongs are sent automatically by tungstenite
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!("Client {} sent close frame", client_id);
                        break;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        debug!("WebSocket error from client {}: {}", client_id, e);
                        break;
                    }
                    None => break,
                }
            }
            _ = closed.cancelled() => break,
        }
    }

    closed.cancel();
    debug!("Client {} disconnected", client_id);
}

/// Spawn a connected client/remote pair over a loopback socket.
#[cfg(test)]
pub(crate) async fn connected_pair() -> (
    ServerClient,
    WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>,
) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let connect = tokio::spawn(async move {
        let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}", addr))
            .await
            .unwrap();
        ws
    });

    let (stream, peer_addr) = listener.accept().await.unwrap();
    let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    let client = ServerClient::new(ws, peer_addr);
    let remote = connect.await.unwrap();

    (client, remote)
}
