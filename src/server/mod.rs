pub mod client;
pub mod config;
pub mod listener;
pub mod messages;
pub mod music_server;

pub use client::{SendError, ServerClient};
pub use config::ServerConfig;
pub use listener::{Listener, ListenerError};
pub use music_server::{Coordinator, MusicServer};
