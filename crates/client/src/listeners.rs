//! Listener registry and inbound frame routing.
//!
//! One ordered list per [`MessageKind`]. Registration only appends;
//! the same callback registered twice runs twice.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};

use jobsocket_core::messages::{parse_envelope, MessageKind};

/// A callback invoked with an envelope's `data` payload.
pub type Listener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

#[derive(Default)]
struct ListenerTable {
    stats: Vec<Listener>,
    jobs: Vec<Listener>,
    job_update: Vec<Listener>,
}

impl ListenerTable {
    fn slot(&self, kind: MessageKind) -> &Vec<Listener> {
        match kind {
            MessageKind::Stats => &self.stats,
            MessageKind::Jobs => &self.jobs,
            MessageKind::JobUpdate => &self.job_update,
        }
    }

    fn slot_mut(&mut self, kind: MessageKind) -> &mut Vec<Listener> {
        match kind {
            MessageKind::Stats => &mut self.stats,
            MessageKind::Jobs => &mut self.jobs,
            MessageKind::JobUpdate => &mut self.job_update,
        }
    }
}

/// What happened to one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    /// The frame matched `kind` and `listeners` callbacks ran.
    Delivered { kind: MessageKind, listeners: usize },
    /// Well-formed envelope with a `type` outside the recognized set.
    Unrecognized(String),
    /// Not a valid envelope.
    Malformed(String),
}

/// Thread-safe listener registry shared between the client handle and
/// its connection task.
#[derive(Default)]
pub struct Listeners {
    table: RwLock<ListenerTable>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `listener` to the list for `kind`.
    pub fn register(&self, kind: MessageKind, listener: Listener) {
        self.table
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .slot_mut(kind)
            .push(listener);
    }

    /// Number of listeners currently registered for `kind`.
    pub fn count(&self, kind: MessageKind) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slot(kind)
            .len()
    }

    /// Invoke every listener for `kind` in registration order.
    ///
    /// The lock is released before any callback runs, so callbacks may
    /// register further listeners; those take effect from the next
    /// message on. A panicking listener is logged and skipped; the rest
    /// still run.
    pub fn dispatch(&self, kind: MessageKind, data: &serde_json::Value) -> usize {
        let snapshot: Vec<Listener> = self
            .table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slot(kind)
            .clone();

        for (index, listener) in snapshot.iter().enumerate() {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(data))).is_err() {
                tracing::warn!(%kind, index, "Listener panicked");
            }
        }
        snapshot.len()
    }

    /// Parse a text frame and dispatch it.
    pub fn route_text(&self, text: &str) -> Routed {
        let envelope = match parse_envelope(text) {
            Ok(envelope) => envelope,
            Err(e) => return Routed::Malformed(e.to_string()),
        };

        match envelope.message_kind() {
            Some(kind) => Routed::Delivered {
                kind,
                listeners: self.dispatch(kind, &envelope.data),
            },
            None => Routed::Unrecognized(envelope.kind),
        }
    }
}
