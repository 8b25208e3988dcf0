//! Outbound query commands.
//!
//! The scheduler answers these asynchronously with ordinary `stats` /
//! `jobs` envelopes; there is no acknowledgment frame.

use serde::Serialize;

/// A command frame sent to the scheduler.
///
/// `GetJobs` always serializes its `status` key, as `null` when no
/// filter is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    GetStats,
    GetJobs { status: Option<String> },
}

impl Command {
    /// Serialize to the JSON text sent over the wire.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
