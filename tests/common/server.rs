//! Test server lifecycle management
//!
//! This module manages spawning test WebSocket servers. Each test gets an
//! isolated listener on its own free port with its own music server.

use super::constants::*;
use jukebox_server::{Listener, MusicServer, ServerConfig};
use std::sync::Arc;
use std::time::Duration;

/// Test server instance with an isolated listener and music server.
pub struct TestServer {
    /// WebSocket URL for connecting clients (e.g., "ws://127.0.0.1:12345")
    pub ws_url: String,

    /// The port the listener is bound to
    pub port: u16,

    /// Music server for direct registry access in tests
    pub music_server: Arc<MusicServer>,

    /// The listener under test
    pub listener: Listener,
}

impl TestServer {
    /// Spawns a new test server on a free port.
    ///
    /// This function:
    /// 1. Reserves a free local port
    /// 2. Starts a listener backed by a fresh music server
    /// 3. Waits for the port to accept connections
    ///
    /// # Panics
    ///
    /// Panics if the listener fails to start or does not become ready
    /// within the timeout.
    pub async fn spawn() -> Self {
        let port = free_port();
        let music_server = Arc::new(MusicServer::new());
        let listener = Listener::new(
            music_server.clone(),
            ServerConfig {
                host: "127.0.0.1".to_owned(),
                port,
            },
        );

        listener.start().await.expect("Failed to start listener");

        let server = Self {
            ws_url: format!("ws://127.0.0.1:{}", port),
            port,
            music_server,
            listener,
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the listener to accept TCP connections on its port.
    ///
    /// Also useful after restarting the listener in a test, since `start`
    /// does not wait for the bind to complete.
    pub async fn wait_for_ready(&self) {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match tokio::net::TcpStream::connect(("127.0.0.1", self.port)).await {
                Ok(_) => return,
                Err(_) => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }

    /// Waits until the music server registry holds exactly `count` clients.
    pub async fn wait_for_client_count(&self, count: usize) {
        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(REGISTRY_TIMEOUT_MS);

        while self.music_server.client_count().await != count {
            if start.elapsed() > timeout {
                panic!(
                    "Registry did not reach {} clients within {}ms (has {})",
                    count,
                    REGISTRY_TIMEOUT_MS,
                    self.music_server.client_count().await
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// Reserve a port number that is currently free.
fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
