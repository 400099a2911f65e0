//! Shared constants for end-to-end tests

/// Maximum time to wait for the server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;

/// Timeout for individual WebSocket message waits (seconds)
pub const MESSAGE_TIMEOUT_SECS: u64 = 5;

/// Maximum time to wait for a registry state change (milliseconds)
pub const REGISTRY_TIMEOUT_MS: u64 = 5000;
