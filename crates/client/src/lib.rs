//! `jobsocket-client` library crate.
//!
//! A reconnecting WebSocket client for the job scheduler's real-time
//! update channel. See [`ChannelClient`] for the entry point. The
//! `jobsocket-watch` binary in `main.rs` is a small consumer of it.

pub mod client;
pub mod config;
pub mod error;
pub mod listeners;
mod reconnect;
mod session;

pub use client::ChannelClient;
pub use config::ClientConfig;
pub use error::ClientError;
