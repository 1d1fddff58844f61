//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fleetwatch_config::ConfigError;
use fleetwatch_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(dead_code, unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the backend at {url}")]
    #[diagnostic(
        code(fleetwatch::connection_failed),
        help(
            "Check that the API is running and reachable.\n\
             Use --insecure (-k) for self-signed staging backends."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Live updates unavailable after {attempts} reconnection attempts")]
    #[diagnostic(
        code(fleetwatch::live_updates_unavailable),
        help(
            "The subscription socket kept dropping.\n\
             Raise --max-attempts or check the backend's WebSocket endpoint."
        )
    )]
    LiveUpdatesUnavailable { attempts: u32 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed")]
    #[diagnostic(
        code(fleetwatch::auth_failed),
        help(
            "The bearer token was rejected or has expired.\n\
             Pass --token, set FLEETWATCH_TOKEN, or refresh the token for profile '{profile}'."
        )
    )]
    AuthFailed { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("Trip '{trip_id}' not found")]
    #[diagnostic(code(fleetwatch::not_found), help("Check the trip identifier."))]
    TripNotFound { trip_id: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error: {message}")]
    #[diagnostic(code(fleetwatch::api_error))]
    ApiError { message: String, status: Option<u16> },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleetwatch::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fleetwatch::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No API endpoint configured")]
    #[diagnostic(
        code(fleetwatch::no_config),
        help(
            "Pass --api-url, set FLEETWATCH_API_URL, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fleetwatch::config))]
    Config(ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Request timed out")]
    #[diagnostic(
        code(fleetwatch::timeout),
        help("Increase timeout with --timeout or check backend responsiveness.")
    )]
    Timeout,

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON rendering failed: {0}")]
    #[diagnostic(code(fleetwatch::json))]
    Json(#[from] serde_json::Error),

    #[error("YAML rendering failed: {0}")]
    #[diagnostic(code(fleetwatch::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::LiveUpdatesUnavailable { .. } => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } => exit_code::AUTH,
            Self::TripNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::ProfileNotFound { name, available } => {
                Self::ProfileNotFound { name, available }
            }
            other => Self::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message: _ } => Self::AuthFailed {
                profile: "current".into(),
            },
            CoreError::TripNotFound { trip_id } => Self::TripNotFound { trip_id },
            CoreError::Timeout => Self::Timeout,
            CoreError::Api { message, status } => Self::ApiError { message, status },
            CoreError::Config { message } => Self::Validation {
                field: "api_url".into(),
                reason: message,
            },
            CoreError::Internal(message) => Self::ApiError {
                message,
                status: None,
            },
        }
    }
}
