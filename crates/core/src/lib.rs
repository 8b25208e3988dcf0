//! Wire contract for the job scheduler's real-time update channel.
//!
//! Everything here is plain data: the inbound [`messages::Envelope`],
//! the closed set of [`messages::MessageKind`]s, outbound
//! [`commands::Command`]s and the typed job payloads the backend puts
//! inside `data`. No I/O happens in this crate.

pub mod commands;
pub mod jobs;
pub mod messages;
pub mod types;
