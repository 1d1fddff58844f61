// ── Core error types ──
//
// Consumer-facing errors from fleetwatch-core. These are NOT API-specific:
// consumers never see HTTP status codes or raw tungstenite failures.
// `SubscriptionError` is what the snapshot cache exposes; `CoreError` is
// returned by one-shot operations.

use thiserror::Error;

/// Error surfaced through the subscription's `error` field.
///
/// Cloneable so it can live inside the published [`SnapshotState`](crate::SnapshotState).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscriptionError {
    /// Missing or invalid endpoint. Not transient; never retried.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The initial (or manual) fetch failed. The cached snapshot is kept.
    #[error("Snapshot fetch failed: {0}")]
    Fetch(String),

    /// The subscription server sent an `error` frame. The socket stays open.
    #[error("Subscription error: {0}")]
    Protocol(String),

    /// The socket failed or closed abnormally. Reconnection follows.
    #[error("Connection lost: {0}")]
    Transport(String),

    /// Every reconnection attempt failed. Live updates stay off until the
    /// consumer re-enables the subscription.
    #[error("Live updates unavailable after {attempts} reconnection attempts")]
    ReconnectExhausted { attempts: u32 },
}

impl SubscriptionError {
    /// `true` for the soft-fatal outcome that ends live updates.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::ReconnectExhausted { .. })
    }

    /// `true` if the error came from the socket rather than the server's
    /// GraphQL layer.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::ReconnectExhausted { .. })
    }
}

/// Error type for one-shot operations in the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Cannot connect to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Trip not found: {trip_id}")]
    TripNotFound { trip_id: String },

    #[error("Request timed out")]
    Timeout,

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fleetwatch_api::Error> for CoreError {
    fn from(err: fleetwatch_api::Error) -> Self {
        use fleetwatch_api::Error as Api;

        match err {
            Api::Authentication { message } => Self::AuthenticationFailed { message },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    Self::Timeout
                } else if e.is_connect() {
                    Self::ConnectionFailed {
                        url: e.url().map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    Self::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::InvalidEndpoint { url, reason } => Self::Config {
                message: format!("Invalid endpoint {url}: {reason}"),
            },
            Api::Tls(msg) => Self::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::Http { status, body } => Self::Api {
                message: body,
                status: Some(status),
            },
            Api::Graphql { messages } => Self::Api {
                message: messages.join("; "),
                status: None,
            },
            Api::EmptyResult { field } => Self::Api {
                message: format!("response has no `{field}`"),
                status: None,
            },
            Api::WebSocketConnect(reason) | Api::WebSocketSend(reason) => Self::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket: {reason}"),
            },
            Api::Deserialization { message, body: _ } => {
                Self::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_exhaustion_is_terminal() {
        assert!(SubscriptionError::ReconnectExhausted { attempts: 5 }.is_terminal());
        assert!(!SubscriptionError::Transport("reset".into()).is_terminal());
        assert!(!SubscriptionError::Protocol("boom".into()).is_terminal());
    }

    #[test]
    fn exhaustion_message_is_user_facing() {
        let err = SubscriptionError::ReconnectExhausted { attempts: 5 };
        assert_eq!(
            err.to_string(),
            "Live updates unavailable after 5 reconnection attempts"
        );
    }

    #[test]
    fn graphql_errors_map_to_api() {
        let err = CoreError::from(fleetwatch_api::Error::Graphql {
            messages: vec!["a".into(), "b".into()],
        });
        assert!(matches!(err, CoreError::Api { ref message, status: None } if message == "a; b"));
    }

    #[test]
    fn endpoint_errors_map_to_config() {
        let err = CoreError::from(fleetwatch_api::Error::InvalidEndpoint {
            url: "ftp://x".into(),
            reason: "bad scheme".into(),
        });
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
