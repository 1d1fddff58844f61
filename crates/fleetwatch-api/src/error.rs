use thiserror::Error;

/// Top-level error type for the `fleetwatch-api` crate.
///
/// Covers every failure mode of the two API surfaces: the HTTP GraphQL
/// endpoint and the `graphql-ws` subscription socket. `fleetwatch-core`
/// maps these into consumer-facing subscription errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Bearer token rejected (missing, expired or revoked).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The configured endpoint cannot serve both HTTP and WebSocket traffic.
    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// TLS or HTTP client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status from the GraphQL endpoint.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    // ── GraphQL ─────────────────────────────────────────────────────
    /// The response carried a GraphQL `errors` array.
    #[error("GraphQL error: {}", messages.join("; "))]
    Graphql { messages: Vec<String> },

    /// The response succeeded but the requested field was null.
    #[error("GraphQL response has no `{field}`")]
    EmptyResult { field: &'static str },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// Writing a frame to the socket failed.
    #[error("WebSocket send failed: {0}")]
    WebSocketSend(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error indicates the bearer token is no longer valid.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::WebSocketConnect(_) | Self::WebSocketSend(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graphql_messages_are_joined() {
        let err = Error::Graphql {
            messages: vec!["trip not found".into(), "unauthorized".into()],
        };
        assert_eq!(err.to_string(), "GraphQL error: trip not found; unauthorized");
    }

    #[test]
    fn transient_classification() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(Error::WebSocketSend("broken pipe".into()).is_transient());
        assert!(
            Error::Http {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!Error::Graphql { messages: vec![] }.is_transient());
    }
}
