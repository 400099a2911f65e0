//! Connection lifecycle manager.
//!
//! Owns the process-wide listen socket and the accept-to-register pipeline:
//! every WebSocket upgrade on the configured port is onboarded into a
//! [`ServerClient`] and handed to the coordinator. No path routing, no
//! authentication; a failed connection never takes down the accept loop.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::client::ServerClient;
use super::config::ServerConfig;
use super::music_server::Coordinator;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ListenerError {
    /// `start` was called while a socket is already serving.
    #[error("listener is already running")]
    AlreadyListening,
}

/// Lifecycle of the listen socket.
///
/// `Closing` is distinct from `Idle`: the accept task is still releasing the
/// socket, and a new `start` must wait for the release before rebinding the
/// port.
enum ListenerState {
    Idle,
    Listening {
        shutdown: CancellationToken,
        closed: watch::Receiver<()>,
    },
    Closing {
        closed: watch::Receiver<()>,
    },
}

/// Owns the listening socket and onboards every accepted connection.
pub struct Listener {
    coordinator: Arc<dyn Coordinator>,
    config: ServerConfig,
    state: Arc<Mutex<ListenerState>>,
}

impl Listener {
    pub fn new(coordinator: Arc<dyn Coordinator>, config: ServerConfig) -> Self {
        Self {
            coordinator,
            config,
            state: Arc::new(Mutex::new(ListenerState::Idle)),
        }
    }

    /// Spawn the accept task on the configured port.
    ///
    /// Returns as soon as the task is spawned; the bind completes
    /// asynchronously, and a bind failure is logged rather than surfaced
    /// here. If the previous socket is still being released, waits for the
    /// release before rebinding. Errors if a socket is already serving.
    pub async fn start(&self) -> Result<(), ListenerError> {
        loop {
            let mut wait_closed = {
                let mut state = self.state.lock().unwrap();
                match &*state {
                    ListenerState::Listening { .. } => return Err(ListenerError::AlreadyListening),
                    ListenerState::Closing { closed } => closed.clone(),
                    ListenerState::Idle => {
                        let shutdown = CancellationToken::new();
                        let (closed_tx, closed_rx) = watch::channel(());
                        *state = ListenerState::Listening {
                            shutdown: shutdown.clone(),
                            closed: closed_rx,
                        };
                        tokio::spawn(accept_loop(
                            self.config.clone(),
                            self.coordinator.clone(),
                            self.state.clone(),
                            shutdown,
                            closed_tx,
                        ));
                        return Ok(());
                    }
                }
            };
            // The previous accept task has not dropped its socket yet; wait
            // for the release notification, then re-check the state.
            let _ = wait_closed.changed().await;
        }
    }

    /// Whether a socket is currently serving connections.
    pub fn is_listening(&self) -> bool {
        matches!(*self.state.lock().unwrap(), ListenerState::Listening { .. })
    }

    /// Stop the coordinator, then close the listen socket.
    ///
    /// The coordinator is stopped unconditionally, even when nothing is
    /// listening. The socket close completes asynchronously in the accept
    /// task, which logs once the socket is released. Idempotent.
    pub async fn stop(&self) {
        self.coordinator.stop().await;

        let mut state = self.state.lock().unwrap();
        match std::mem::replace(&mut *state, ListenerState::Idle) {
            ListenerState::Listening { shutdown, closed } => {
                shutdown.cancel();
                *state = ListenerState::Closing { closed };
            }
            other => *state = other,
        }
    }
}

/// Bind the port and accept connections until shutdown.
///
/// Holds the watch sender for its whole lifetime; dropping it on return is
/// the port-release notification `start` waits on.
async fn accept_loop(
    config: ServerConfig,
    coordinator: Arc<dyn Coordinator>,
    state: Arc<Mutex<ListenerState>>,
    shutdown: CancellationToken,
    _closed_tx: watch::Sender<()>,
) {
    let bind_addr = config.bind_addr();
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(listener) => {
            info!("WebSocket server started on port {}", config.port);
            listener
        }
        Err(e) => {
            // No retry: the service is left without a working listener until
            // the next explicit start.
            error!("Failed to bind WebSocket server on {}: {}", bind_addr, e);
            *state.lock().unwrap() = ListenerState::Idle;
            return;
        }
    };

    loop {
        tokio::select! {
            result = listener.accept() => match result {
                Ok((stream, peer_addr)) => {
                    tokio::spawn(handle_connection(
                        stream,
                        peer_addr,
                        coordinator.clone(),
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            },
            _ = shutdown.cancelled() => break,
        }
    }

    drop(listener);
    *state.lock().unwrap() = ListenerState::Idle;
    info!("WebSocket server closed");
}

/// Onboard one accepted connection: handshake, wrap, register.
///
/// Runs in its own task so a failing connection is logged and dropped
/// without disturbing the accept loop or other connections.
async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    coordinator: Arc<dyn Coordinator>,
    shutdown: CancellationToken,
) {
    let ws = tokio::select! {
        handshake = tokio_tungstenite::accept_async(stream) => match handshake {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake with {} failed: {}", peer_addr, e);
                return;
            }
        },
        _ = shutdown.cancelled() => {
            debug!("Dropping half-open connection from {} during shutdown", peer_addr);
            return;
        }
    };

    let client = ServerClient::new(ws, peer_addr);
    coordinator.add_client(client).await;
}
