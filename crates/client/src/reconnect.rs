//! Fixed-delay reconnection.
//!
//! Each [`ChannelClient::connect`](crate::client::ChannelClient::connect)
//! spawns one supervisor. Every time its session ends, exactly one new
//! attempt is scheduled after `reconnect_delay`, with no backoff and no
//! retry cap, until the supervisor's [`CancellationToken`] fires.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::client::Shared;
use crate::session::{run_session, SessionEnd};

/// Run connect -> process -> wait -> reconnect until cancelled.
pub(crate) async fn supervise(shared: Arc<Shared>, epoch: u64, cancel: CancellationToken) {
    let delay = shared.config.reconnect_delay;
    let mut attempt = 0u64;

    loop {
        attempt += 1;
        tracing::info!(
            url = %shared.config.ws_url,
            epoch,
            attempt,
            "Connecting to job updates",
        );

        match run_session(&shared, epoch, &cancel).await {
            SessionEnd::Closed => {
                tracing::info!(epoch, "Disconnected from job updates");
            }
            SessionEnd::Failed(e) => {
                tracing::error!(epoch, error = %e, "Job update channel error");
            }
            SessionEnd::Cancelled => break,
        }

        if cancel.is_cancelled() {
            break;
        }

        tracing::info!(
            epoch,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting after delay",
        );

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    shared.detach(epoch);
    tracing::debug!(epoch, attempt, "Reconnect supervisor stopped");
}
