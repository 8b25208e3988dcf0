//! Client configuration.
//!
//! The WebSocket endpoint is never configured directly: it is derived
//! from the origin of the page (or service) the client belongs to, with
//! the secure `wss` scheme chosen iff the origin itself is `https`.

use std::time::Duration;

use jobsocket_core::types::JOBS_WS_PATH;

use crate::error::ClientError;

/// Fixed delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Origin used when `JOBSOCKET_ORIGIN` is not set.
pub const DEFAULT_ORIGIN: &str = "http://localhost:8000";

/// Configuration for a [`ChannelClient`](crate::client::ChannelClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin the endpoint was derived from, e.g. `https://jobs.example.com`.
    pub origin: String,
    /// Derived endpoint, e.g. `wss://jobs.example.com/ws/jobs/`.
    pub ws_url: String,
    /// Delay before each automatic reconnect.
    pub reconnect_delay: Duration,
    /// Whether the client keeps reconnecting after an explicit
    /// [`disconnect`](crate::client::ChannelClient::disconnect).
    pub retry_after_disconnect: bool,
}

impl ClientConfig {
    /// Build a configuration for `origin` with default reconnect behaviour.
    pub fn new(origin: &str) -> Result<Self, ClientError> {
        Ok(Self {
            origin: origin.trim().to_string(),
            ws_url: ws_url_for_origin(origin)?,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            retry_after_disconnect: true,
        })
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_retry_after_disconnect(mut self, retry: bool) -> Self {
        self.retry_after_disconnect = retry;
        self
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                            | Default                  |
    /// |------------------------------------|--------------------------|
    /// | `JOBSOCKET_ORIGIN`                 | `http://localhost:8000`  |
    /// | `JOBSOCKET_RECONNECT_DELAY_MS`     | `3000`                   |
    /// | `JOBSOCKET_RETRY_AFTER_DISCONNECT` | `true`                   |
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_vars(
            std::env::var("JOBSOCKET_ORIGIN").ok().as_deref(),
            std::env::var("JOBSOCKET_RECONNECT_DELAY_MS").ok().as_deref(),
            std::env::var("JOBSOCKET_RETRY_AFTER_DISCONNECT").ok().as_deref(),
        )
    }

    /// Build a configuration from raw variable values, `None` meaning unset.
    ///
    /// Set-but-invalid values are rejected rather than replaced by defaults.
    pub fn from_vars(
        origin: Option<&str>,
        reconnect_delay_ms: Option<&str>,
        retry_after_disconnect: Option<&str>,
    ) -> Result<Self, ClientError> {
        let mut config = Self::new(origin.unwrap_or(DEFAULT_ORIGIN))?;

        if let Some(raw) = reconnect_delay_ms {
            let millis: u64 = raw.trim().parse().map_err(|_| {
                ClientError::Config(format!(
                    "JOBSOCKET_RECONNECT_DELAY_MS must be a valid u64, got {raw:?}"
                ))
            })?;
            config.reconnect_delay = Duration::from_millis(millis);
        }

        if let Some(raw) = retry_after_disconnect {
            config.retry_after_disconnect = parse_flag(raw).ok_or_else(|| {
                ClientError::Config(format!(
                    "JOBSOCKET_RETRY_AFTER_DISCONNECT must be true or false, got {raw:?}"
                ))
            })?;
        }

        Ok(config)
    }
}

/// Derive the job-update endpoint from a page origin.
///
/// `http` maps to `ws` and `https` to `wss`; `ws`/`wss` origins are
/// accepted as-is. Any path, query or fragment on the origin is dropped.
pub fn ws_url_for_origin(origin: &str) -> Result<String, ClientError> {
    let origin = origin.trim();
    let (scheme, rest) = origin
        .split_once("://")
        .ok_or_else(|| ClientError::InvalidOrigin(format!("missing scheme in {origin:?}")))?;

    let ws_scheme = match scheme.to_ascii_lowercase().as_str() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(ClientError::InvalidOrigin(format!(
                "unsupported scheme {other:?} in {origin:?}"
            )))
        }
    };

    let host = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();
    if host.is_empty() {
        return Err(ClientError::InvalidOrigin(format!("missing host in {origin:?}")));
    }

    Ok(format!("{ws_scheme}://{host}{JOBS_WS_PATH}"))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn http_origin_uses_plain_ws() {
        assert_eq!(
            ws_url_for_origin("http://localhost:8000").unwrap(),
            "ws://localhost:8000/ws/jobs/"
        );
    }

    #[test]
    fn https_origin_uses_secure_ws() {
        assert_eq!(
            ws_url_for_origin("https://jobs.example.com").unwrap(),
            "wss://jobs.example.com/ws/jobs/"
        );
    }

    #[test]
    fn page_path_is_dropped() {
        assert_eq!(
            ws_url_for_origin("https://jobs.example.com:8443/dashboard/?tab=1").unwrap(),
            "wss://jobs.example.com:8443/ws/jobs/"
        );
    }

    #[test]
    fn scheme_is_case_insensitive() {
        assert_eq!(
            ws_url_for_origin("HTTPS://Example.com").unwrap(),
            "wss://Example.com/ws/jobs/"
        );
    }

    #[test]
    fn unsupported_scheme_is_rejected() {
        assert_matches!(
            ws_url_for_origin("ftp://example.com"),
            Err(ClientError::InvalidOrigin(_))
        );
    }

    #[test]
    fn missing_scheme_or_host_is_rejected() {
        assert_matches!(ws_url_for_origin("example.com"), Err(ClientError::InvalidOrigin(_)));
        assert_matches!(ws_url_for_origin("http:///path"), Err(ClientError::InvalidOrigin(_)));
    }

    #[test]
    fn new_uses_fixed_three_second_delay() {
        let config = ClientConfig::new("http://127.0.0.1:9000").unwrap();
        assert_eq!(config.reconnect_delay, Duration::from_millis(3000));
        assert!(config.retry_after_disconnect);
        assert_eq!(config.ws_url, "ws://127.0.0.1:9000/ws/jobs/");
    }

    #[test]
    fn builder_overrides() {
        let config = ClientConfig::new("http://127.0.0.1:9000")
            .unwrap()
            .with_reconnect_delay(Duration::from_millis(50))
            .with_retry_after_disconnect(false);
        assert_eq!(config.reconnect_delay, Duration::from_millis(50));
        assert!(!config.retry_after_disconnect);
    }

    #[test]
    fn unset_vars_give_defaults() {
        let config = ClientConfig::from_vars(None, None, None).unwrap();
        assert_eq!(config.origin, DEFAULT_ORIGIN);
        assert_eq!(config.ws_url, "ws://localhost:8000/ws/jobs/");
        assert_eq!(config.reconnect_delay, DEFAULT_RECONNECT_DELAY);
        assert!(config.retry_after_disconnect);
    }

    #[test]
    fn set_vars_override_defaults() {
        let config =
            ClientConfig::from_vars(Some("https://jobs.example.com"), Some(" 250 "), Some("off"))
                .unwrap();
        assert_eq!(config.ws_url, "wss://jobs.example.com/ws/jobs/");
        assert_eq!(config.reconnect_delay, Duration::from_millis(250));
        assert!(!config.retry_after_disconnect);
    }

    #[test]
    fn invalid_reconnect_delay_is_a_config_error() {
        assert_matches!(
            ClientConfig::from_vars(None, Some("3s"), None),
            Err(ClientError::Config(msg)) if msg.contains("JOBSOCKET_RECONNECT_DELAY_MS")
        );
        assert_matches!(
            ClientConfig::from_vars(None, Some("-1"), None),
            Err(ClientError::Config(_))
        );
    }

    #[test]
    fn invalid_retry_flag_is_a_config_error() {
        assert_matches!(
            ClientConfig::from_vars(None, None, Some("sometimes")),
            Err(ClientError::Config(msg)) if msg.contains("JOBSOCKET_RETRY_AFTER_DISCONNECT")
        );
    }

    #[test]
    fn invalid_origin_is_rejected() {
        assert_matches!(
            ClientConfig::from_vars(Some("localhost:8000"), None, None),
            Err(ClientError::InvalidOrigin(_))
        );
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag(" TRUE "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
