//! Central owner of connected clients.
//!
//! The listener hands every onboarded connection to a [`Coordinator`]; the
//! production implementation is [`MusicServer`], which keeps the client
//! registry, greets new arrivals, fans messages out to everyone, and releases
//! all clients on shutdown. Playback features build on the fan-out surface
//! from collaborating components.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::client::ServerClient;
use super::messages::{msg_types, system, ServerMessage};

/// Version string sent to clients in the `connected` greeting.
const SERVER_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

/// Consumer of onboarded connections.
///
/// The listener only needs these two entry points; tests substitute a
/// counting stub.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Take ownership of a newly connected client. Must not block the
    /// accept pipeline meaningfully.
    async fn add_client(&self, client: ServerClient);

    /// Disconnect and release every registered client.
    async fn stop(&self);
}

/// Owns the set of active clients and playback fan-out.
pub struct MusicServer {
    /// client_id -> client handle
    clients: RwLock<HashMap<usize, ServerClient>>,
}

impl Default for MusicServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MusicServer {
    pub fn new() -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Number of currently registered clients.
    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Send a message to every registered client.
    ///
    /// Clients whose connection has gone away are pruned from the registry.
    /// Returns the number of clients the message was delivered to.
    pub async fn broadcast(&self, message: ServerMessage) -> usize {
        let mut clients = self.clients.write().await;

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (client_id, client) in clients.iter() {
            match client.send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    debug!("Dropping client {} on failed send: {:?}", client_id, e);
                    dead.push(*client_id);
                }
            }
        }

        for client_id in dead {
            if let Some(client) = clients.remove(&client_id) {
                client.close();
            }
        }

        delivered
    }
}

#[async_trait]
impl Coordinator for MusicServer {
    async fn add_client(&self, client: ServerClient) {
        let greeting = ServerMessage::new(
            msg_types::CONNECTED,
            system::Connected {
                client_id: client.id(),
                server_version: SERVER_VERSION.to_string(),
            },
        );
        if let Err(e) = client.send(greeting) {
            warn!("Failed to greet client {}: {:?}", client.id(), e);
        }

        let mut clients = self.clients.write().await;
        info!(
            "Client {} registered from {} ({} total)",
            client.id(),
            client.peer_addr(),
            clients.len() + 1
        );
        clients.insert(client.id(), client);
    }

    async fn stop(&self) {
        let mut clients = self.clients.write().await;
        let count = clients.len();
        for (_, client) in clients.drain() {
            client.close();
        }
        if count > 0 {
            info!("Disconnected {} clients", count);
        }
        info!("Music server stopped");
    }
}
