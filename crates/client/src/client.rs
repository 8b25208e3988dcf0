//! The job-update channel client.
//!
//! [`ChannelClient`] owns at most one WebSocket to the scheduler,
//! routes inbound envelopes to listeners by [`MessageKind`], and sends
//! the two query commands. It is an ordinary value: construct it, hand
//! clones to whoever needs it, and call [`connect`](ChannelClient::connect)
//! when the owner is ready.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use jobsocket_core::commands::Command;
use jobsocket_core::jobs::{JobStats, JobStatus, JobSummary};
use jobsocket_core::messages::MessageKind;

use crate::config::ClientConfig;
use crate::listeners::Listeners;
use crate::reconnect::supervise;

/// How long [`ChannelClient::shutdown`] waits for the connection task.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// State shared between the client handle and its connection task.
pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    pub(crate) listeners: Listeners,
    transport: Mutex<Transport>,
    /// Mirrors `Transport::sender.is_some()` for subscribers.
    state: watch::Sender<bool>,
}

/// The current transport handle.
#[derive(Default)]
struct Transport {
    /// Epoch of the supervisor allowed to own the transport. Bumped on
    /// every `connect()` so stale sessions cannot touch the new one.
    epoch: u64,
    /// Outbound half of the open connection. `Some` iff connected.
    sender: Option<mpsc::UnboundedSender<Message>>,
}

impl Shared {
    fn transport(&self) -> std::sync::MutexGuard<'_, Transport> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new epoch, dropping whatever transport the old one held.
    fn begin_epoch(&self) -> u64 {
        let mut transport = self.transport();
        transport.epoch += 1;
        transport.sender = None;
        self.publish(false);
        transport.epoch
    }

    /// Record an opened connection. Returns `false` if `epoch` has been
    /// superseded, in which case the caller must abandon the connection.
    pub(crate) fn attach(&self, epoch: u64, sender: mpsc::UnboundedSender<Message>) -> bool {
        let mut transport = self.transport();
        if transport.epoch != epoch {
            return false;
        }
        transport.sender = Some(sender);
        self.publish(true);
        true
    }

    /// Record a close or error on the connection owned by `epoch`.
    pub(crate) fn detach(&self, epoch: u64) {
        let mut transport = self.transport();
        if transport.epoch == epoch {
            transport.sender = None;
            self.publish(false);
        }
    }

    /// Notify state subscribers, but only on an actual change. Called with
    /// the transport lock held so updates arrive in order.
    fn publish(&self, connected: bool) {
        self.state.send_if_modified(|current| {
            let changed = *current != connected;
            *current = connected;
            changed
        });
    }

    fn is_connected(&self) -> bool {
        self.transport().sender.is_some()
    }

    /// Queue a frame on the open connection. Returns `false` when there
    /// is none.
    fn send(&self, message: Message) -> bool {
        let sender = self.transport().sender.clone();
        match sender {
            Some(sender) => sender.send(message).is_ok(),
            None => false,
        }
    }
}

/// The running reconnect supervisor of the latest `connect()`.
struct Supervisor {
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

/// Client for the scheduler's real-time job-update channel.
///
/// Cloning is cheap; all clones share one connection and one listener
/// registry.
#[derive(Clone)]
pub struct ChannelClient {
    shared: Arc<Shared>,
    supervisor: Arc<Mutex<Option<Supervisor>>>,
}

impl ChannelClient {
    /// Create a disconnected client. Nothing is opened until
    /// [`connect`](Self::connect) is called.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                listeners: Listeners::new(),
                transport: Mutex::new(Transport::default()),
                state: watch::Sender::new(false),
            }),
            supervisor: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Open the channel, replacing any previous connection.
    ///
    /// The connection runs on a background task that reconnects after
    /// every close. Failures are logged, never returned. Must be called
    /// from within a Tokio runtime; otherwise the call is logged and
    /// ignored.
    pub fn connect(&self) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::error!("connect() called outside a Tokio runtime; ignoring");
            return;
        };

        let mut slot = self.supervisor.lock().unwrap_or_else(PoisonError::into_inner);

        let epoch = self.shared.begin_epoch();
        let cancel = CancellationToken::new();
        let handle = runtime.spawn(supervise(Arc::clone(&self.shared), epoch, cancel.clone()));

        if let Some(previous) = slot.replace(Supervisor { cancel, handle }) {
            tracing::debug!(epoch, "Replacing previous connection");
            previous.cancel.cancel();
        }
    }

    /// Request closure of the open connection, if there is one.
    ///
    /// With `retry_after_disconnect` set (the default) the close is
    /// treated like any other and the client reconnects after the usual
    /// delay. Otherwise the reconnect loop is stopped as well.
    pub fn disconnect(&self) {
        if !self.shared.config.retry_after_disconnect {
            let slot = self.supervisor.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(supervisor) = slot.as_ref() {
                supervisor.cancel.cancel();
            }
            return;
        }

        if !self.shared.send(Message::Close(None)) {
            tracing::debug!("disconnect() with no open connection");
        }
    }

    /// Stop reconnecting, close the connection and wait for the
    /// background task to exit.
    pub async fn shutdown(&self) {
        let supervisor = self
            .supervisor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(supervisor) = supervisor else {
            return;
        };

        tracing::info!("Shutting down job update client");
        supervisor.cancel.cancel();
        if tokio::time::timeout(SHUTDOWN_TIMEOUT, supervisor.handle)
            .await
            .is_err()
        {
            tracing::warn!("Job update client did not stop within timeout");
        }
    }

    /// `true` between an open and the next close or error.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Follow the connection state. The receiver sees `true` on every
    /// open and `false` on every close or error, so
    /// [`changed`](watch::Receiver::changed) can drive per-connection work
    /// without polling [`is_connected`](Self::is_connected).
    pub fn subscribe_state(&self) -> watch::Receiver<bool> {
        self.shared.state.subscribe()
    }

    /// Register a listener for `kind`. Listeners run in registration
    /// order and are never de-duplicated.
    pub fn on<F>(&self, kind: MessageKind, callback: F) -> &Self
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.shared.listeners.register(kind, Arc::new(callback));
        self
    }

    /// Register a listener by wire name. Unrecognized names are ignored
    /// and the callback is dropped.
    pub fn on_named<F>(&self, name: &str, callback: F) -> &Self
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        match MessageKind::from_name(name) {
            Some(kind) => self.on(kind, callback),
            None => {
                tracing::debug!(name, "Ignoring listener for unrecognized message type");
                self
            }
        }
    }

    pub fn on_stats<F>(&self, callback: F) -> &Self
    where
        F: Fn(JobStats) + Send + Sync + 'static,
    {
        self.on_decoded(MessageKind::Stats, callback)
    }

    pub fn on_jobs<F>(&self, callback: F) -> &Self
    where
        F: Fn(Vec<JobSummary>) + Send + Sync + 'static,
    {
        self.on_decoded(MessageKind::Jobs, callback)
    }

    pub fn on_job_update<F>(&self, callback: F) -> &Self
    where
        F: Fn(JobSummary) + Send + Sync + 'static,
    {
        self.on_decoded(MessageKind::JobUpdate, callback)
    }

    /// Number of listeners registered for `kind`.
    pub fn listener_count(&self, kind: MessageKind) -> usize {
        self.shared.listeners.count(kind)
    }

    /// Ask the scheduler for fresh stats. No-op while disconnected.
    pub fn get_stats(&self) {
        self.send_command(&Command::GetStats);
    }

    /// Ask the scheduler for the job list, optionally filtered by
    /// status. No-op while disconnected.
    pub fn get_jobs(&self, status: Option<&str>) {
        self.send_command(&Command::GetJobs {
            status: status.map(str::to_owned),
        });
    }

    pub fn get_jobs_with_status(&self, status: JobStatus) {
        self.get_jobs(Some(status.as_str()));
    }

    // ---- private helpers ----

    fn on_decoded<T, F>(&self, kind: MessageKind, callback: F) -> &Self
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on(kind, move |data: &serde_json::Value| match T::deserialize(data) {
            Ok(payload) => callback(payload),
            Err(e) => {
                tracing::warn!(%kind, error = %e, "Skipping listener, payload did not decode");
            }
        })
    }

    fn send_command(&self, command: &Command) {
        let json = match command.to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(error = %e, ?command, "Failed to serialize command");
                return;
            }
        };

        if !self.shared.send(Message::Text(json)) {
            tracing::debug!(?command, "Not connected, command dropped");
        }
    }
}
