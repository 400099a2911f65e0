//! Common test infrastructure
//!
//! This module provides the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::TestServer;
//!
//! #[tokio::test]
//! async fn test_connect() {
//!     let server = TestServer::spawn().await;
//!     // connect WebSocket clients against server.ws_url ...
//! }
//! ```

mod constants;
mod server;

// Public API - this is what tests import
pub use constants::*;
pub use server::TestServer;
