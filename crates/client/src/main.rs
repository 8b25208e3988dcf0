//! `jobsocket-watch` -- follow a user's jobs from the terminal.
//!
//! Connects to the scheduler's job-update channel, logs stats, job
//! lists and individual job updates as they arrive, and refreshes stats
//! periodically.
//!
//! # Environment variables
//!
//! | Variable                           | Required | Default                 | Description                              |
//! |------------------------------------|----------|-------------------------|------------------------------------------|
//! | `JOBSOCKET_ORIGIN`                 | no       | `http://localhost:8000` | Scheduler origin; `https` selects `wss`  |
//! | `JOBSOCKET_RECONNECT_DELAY_MS`     | no       | `3000`                  | Fixed delay between reconnect attempts   |
//! | `JOBSOCKET_RETRY_AFTER_DISCONNECT` | no       | `true`                  | Keep reconnecting after `disconnect()`   |
//! | `JOBSOCKET_POLL_SECS`              | no       | `30`                    | Stats refresh interval, `0` disables     |
//! | `JOBSOCKET_STATUS_FILTER`          | no       | --                      | Only list jobs with this status          |
//! | `LOG_FORMAT`                       | no       | `text`                  | `json` for structured log lines          |

use std::time::Duration;

use jobsocket_client::{ChannelClient, ClientConfig};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default interval between stats refreshes.
const DEFAULT_POLL_SECS: u64 = 30;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    init_tracing();

    let config = ClientConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    let poll_secs = parse_poll_secs(std::env::var("JOBSOCKET_POLL_SECS").ok().as_deref())
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        });

    let status_filter = std::env::var("JOBSOCKET_STATUS_FILTER")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    tracing::info!(
        ws_url = %config.ws_url,
        reconnect_delay_ms = config.reconnect_delay.as_millis() as u64,
        poll_secs,
        status_filter = ?status_filter,
        "Starting jobsocket-watch",
    );

    let client = ChannelClient::new(config);
    register_listeners(&client);
    client.connect();

    tokio::select! {
        () = watch(&client, poll_secs, status_filter.as_deref()) => {}
        () = shutdown_signal() => {}
    }

    client.shutdown().await;
    tracing::info!("jobsocket-watch stopped");
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jobsocket_client=info,jobsocket_watch=info".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

/// Stats refresh interval from `JOBSOCKET_POLL_SECS`; unset means the
/// default, a set but unparsable value is an error.
fn parse_poll_secs(raw: Option<&str>) -> Result<u64, String> {
    match raw {
        None => Ok(DEFAULT_POLL_SECS),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("JOBSOCKET_POLL_SECS must be a valid u64, got {raw:?}")),
    }
}

fn register_listeners(client: &ChannelClient) {
    client
        .on_stats(|stats| {
            tracing::info!(
                total = stats.total_jobs,
                status_counts = ?stats.status_counts,
                priority_counts = ?stats.priority_counts,
                avg_wait_secs = ?stats.avg_wait_time,
                "Job stats",
            );
        })
        .on_jobs(|jobs| {
            tracing::info!(count = jobs.len(), "Job list");
            for job in &jobs {
                tracing::info!(
                    id = %job.id,
                    name = %job.name,
                    status = %job.status,
                    priority = ?job.priority,
                    deadline = ?job.deadline,
                    "  job",
                );
            }
        })
        .on_job_update(|job| {
            tracing::info!(
                id = %job.id,
                name = %job.name,
                status = %job.status,
                wait_secs = ?job.wait_time,
                duration_secs = ?job.duration,
                "Job updated",
            );
        });
}

/// Request the job list on every fresh connection and refresh stats on
/// a timer. Never returns.
async fn watch(client: &ChannelClient, poll_secs: u64, status_filter: Option<&str>) {
    let mut state = client.subscribe_state();
    let poll_enabled = poll_secs > 0;
    let mut poll = tokio::time::interval(Duration::from_secs(poll_secs.max(1)));

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    // The client, and with it the sender, is gone.
                    std::future::pending::<()>().await;
                }
                if *state.borrow_and_update() {
                    client.get_jobs(status_filter);
                }
            }
            _ = poll.tick(), if poll_enabled => {
                client.get_stats();
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), shutting down");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}
