//! Inbound message types and parser.
//!
//! The scheduler sends JSON text frames shaped
//! `{"type": "<kind>", "data": <any>}`. [`parse_envelope`] accepts any
//! well-formed envelope, whatever its `type`, so that callers can drop
//! unrecognized kinds quietly instead of treating them as errors.
//! [`JobMessage`] is the strongly-typed view of the three kinds the
//! scheduler actually emits.

use std::fmt;

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Serialize};

use crate::jobs::{JobStats, JobSummary};

/// The closed set of message kinds a listener can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Aggregated job counts for the current user.
    Stats,
    /// A (possibly filtered) job list, sent in reply to `get_jobs`.
    Jobs,
    /// A single job changed state.
    JobUpdate,
}

impl MessageKind {
    /// Every recognized kind, in wire-declaration order.
    pub const ALL: [MessageKind; 3] = [MessageKind::Stats, MessageKind::Jobs, MessageKind::JobUpdate];

    /// The `type` discriminator used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Stats => "stats",
            MessageKind::Jobs => "jobs",
            MessageKind::JobUpdate => "job_update",
        }
    }

    /// Look up a kind by its wire name.
    ///
    /// Returns `None` for anything outside the recognized set.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw inbound envelope.
///
/// `data` is left untyped; a missing `data` field decodes as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Envelope {
    /// The recognized kind of this envelope, if any.
    pub fn message_kind(&self) -> Option<MessageKind> {
        MessageKind::from_name(&self.kind)
    }

    /// Decode `data` into a concrete payload type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}

/// Parse a text frame into an [`Envelope`].
///
/// Returns `Err` for invalid JSON, for JSON that is not an object, and
/// for objects without a string `type`. Unknown `type` values parse
/// successfully; check [`Envelope::message_kind`].
pub fn parse_envelope(text: &str) -> Result<Envelope, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(serde_json::Error::custom("envelope must be a JSON object"));
    }
    serde_json::from_value(value)
}

/// Strongly-typed inbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum JobMessage {
    Stats(JobStats),
    Jobs(Vec<JobSummary>),
    JobUpdate(JobSummary),
}

impl JobMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            JobMessage::Stats(_) => MessageKind::Stats,
            JobMessage::Jobs(_) => MessageKind::Jobs,
            JobMessage::JobUpdate(_) => MessageKind::JobUpdate,
        }
    }

    /// Type the payload of an already-parsed envelope.
    ///
    /// `Ok(None)` means the envelope's kind is not recognized.
    pub fn from_envelope(envelope: &Envelope) -> Result<Option<Self>, serde_json::Error> {
        let Some(kind) = envelope.message_kind() else {
            return Ok(None);
        };
        let message = match kind {
            MessageKind::Stats => JobMessage::Stats(envelope.decode()?),
            MessageKind::Jobs => JobMessage::Jobs(envelope.decode()?),
            MessageKind::JobUpdate => JobMessage::JobUpdate(envelope.decode()?),
        };
        Ok(Some(message))
    }
}
