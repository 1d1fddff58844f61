// ── Runtime subscription configuration ──
//
// These types describe *how* to reach the trip-snapshot API. They carry
// credential data and connection tuning, but never touch disk. The CLI
// constructs a `SubscriptionConfig` and hands it in.

use std::time::Duration;

use fleetwatch_api::Endpoint;
use secrecy::SecretString;

use crate::reconnect::ReconnectPolicy;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict). Default for hosted APIs.
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed staging backends).
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for fleetwatch_api::TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => Self::System,
            TlsVerification::CustomCa(path) => Self::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => Self::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one subscription client.
///
/// `endpoint` is optional on purpose: a missing base URL is reported
/// through the subscription's `error` field rather than failing
/// construction.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionConfig {
    /// GraphQL endpoint; the socket URL is derived from it.
    pub endpoint: Option<Endpoint>,
    /// Bearer token from persisted client storage.
    pub token: Option<SecretString>,
    /// TLS verification strategy for the HTTP fetch.
    pub tls: TlsVerification,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// Reconnection tuning.
    pub reconnect: ReconnectPolicy,
}

impl SubscriptionConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint: Some(endpoint),
            timeout: Duration::from_secs(30),
            ..Self::default()
        }
    }

    /// Transport settings shared by the HTTP client.
    pub fn transport(&self) -> fleetwatch_api::TransportConfig {
        fleetwatch_api::TransportConfig {
            tls: (&self.tls).into(),
            timeout: if self.timeout.is_zero() {
                Duration::from_secs(30)
            } else {
                self.timeout
            },
            bearer: self.token.clone(),
        }
    }
}
