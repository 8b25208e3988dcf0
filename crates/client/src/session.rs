//! A single WebSocket session: open, pump frames, close.
//!
//! One `tokio::select!` loop multiplexes outbound commands, inbound
//! frames and cancellation, so listeners never run concurrently with
//! each other and messages are handled in arrival order.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::client::Shared;
use crate::error::ClientError;
use crate::listeners::Routed;

/// How long to wait for the peer's Close reply after sending ours.
pub(crate) const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a session ended.
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// The connection closed (by either side, or the stream ran dry).
    Closed,
    /// Handshake or transport failure.
    Failed(ClientError),
    /// The owning supervisor was cancelled or superseded.
    Cancelled,
}

/// Connect once and process frames until the connection ends.
///
/// While the session is open, `shared` holds its outbound sender, which
/// is what makes the client report itself as connected.
pub(crate) async fn run_session(
    shared: &Shared,
    epoch: u64,
    cancel: &CancellationToken,
) -> SessionEnd {
    let url = shared.config.ws_url.as_str();

    let ws_stream = tokio::select! {
        _ = cancel.cancelled() => return SessionEnd::Cancelled,
        result = connect_async(url) => match result {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                return SessionEnd::Failed(ClientError::Connection(format!(
                    "Failed to connect to {url}: {e}"
                )));
            }
        },
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    if !shared.attach(epoch, tx) {
        return SessionEnd::Cancelled;
    }
    tracing::info!(url = %url, epoch, "Connected to job updates");

    let (mut sink, mut stream) = ws_stream.split();
    // Set once we have sent a Close frame.
    let mut close_deadline: Option<Instant> = None;

    let end = loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    tracing::debug!(epoch, error = %e, "Close on cancel failed");
                }
                break SessionEnd::Cancelled;
            }
            Some(outbound) = rx.recv() => {
                if close_deadline.is_some() {
                    tracing::debug!(epoch, "Dropping outbound frame, connection is closing");
                    continue;
                }
                if matches!(outbound, Message::Close(_)) {
                    close_deadline = Some(Instant::now() + CLOSE_HANDSHAKE_TIMEOUT);
                }
                if let Err(e) = sink.send(outbound).await {
                    break SessionEnd::Failed(ClientError::Protocol(format!("Send failed: {e}")));
                }
            }
            _ = tokio::time::sleep_until(close_deadline.unwrap_or_else(Instant::now)),
                if close_deadline.is_some() =>
            {
                tracing::info!(epoch, "Peer did not answer Close in time, dropping connection");
                break SessionEnd::Closed;
            }
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => handle_text(shared, epoch, &text),
                    Some(Ok(Message::Binary(_))) => {
                        tracing::trace!(epoch, "Ignoring binary frame");
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        // Handled automatically by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(epoch, ?frame, "Job update channel closed");
                        // Flush tungstenite's queued close reply.
                        let _ = sink.close().await;
                        break SessionEnd::Closed;
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        break SessionEnd::Failed(ClientError::Protocol(format!("Receive failed: {e}")));
                    }
                    None => {
                        tracing::info!(epoch, "WebSocket stream exhausted");
                        break SessionEnd::Closed;
                    }
                }
            }
        }
    };

    shared.detach(epoch);
    end
}

/// Route one text frame to the listeners and log what happened to it.
fn handle_text(shared: &Shared, epoch: u64, text: &str) {
    match shared.listeners.route_text(text) {
        Routed::Delivered { kind, listeners } => {
            tracing::trace!(epoch, %kind, listeners, "Dispatched message");
        }
        Routed::Unrecognized(kind) => {
            tracing::debug!(epoch, kind = %kind, "Ignoring message of unrecognized type");
        }
        Routed::Malformed(error) => {
            tracing::warn!(
                epoch,
                error = %error,
                raw_message = %text,
                "Failed to parse job update message",
            );
        }
    }
}
