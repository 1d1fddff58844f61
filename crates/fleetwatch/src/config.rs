//! CLI configuration -- thin wrapper around `fleetwatch_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` flag overrides (--api-url, --token, etc.).

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use fleetwatch_core::{Endpoint, SubscriptionConfig, TlsVerification};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use fleetwatch_config::{Config, Profile};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Config file in effect: `--config` / `FLEETWATCH_CONFIG`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(fleetwatch_config::config_path)
}

/// Load the config file in effect. A missing file yields the defaults.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(fleetwatch_config::load_config_from(&config_path(global))?)
}

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .unwrap_or_else(|| config.active_profile_name().to_owned())
}

/// Build a `SubscriptionConfig` from the config file, profile, and CLI overrides.
///
/// Without a matching profile the endpoint must come from `--api-url`.
/// An explicitly requested profile that does not exist is an error.
pub fn build_subscription_config(global: &GlobalOpts) -> Result<SubscriptionConfig, CliError> {
    let cfg = load(global)?;
    let profile_name = active_profile_name(global, &cfg);

    if let Some(profile) = cfg.profiles.get(&profile_name) {
        return resolve_profile(profile, &profile_name, &cfg, global);
    }

    if global.profile.is_some() && global.api_url.is_none() {
        cfg.profile(&profile_name)?;
    }

    from_flags(global, &cfg)
}

/// Apply `watch` reconnection overrides on top of the resolved policy.
pub fn apply_watch_overrides(config: &mut SubscriptionConfig, args: &WatchArgs) {
    if let Some(max_attempts) = args.max_attempts {
        config.reconnect.max_attempts = max_attempts;
    }
    if let Some(base) = args.base_delay_ms {
        config.reconnect.base_delay = Duration::from_millis(base);
    }
    if let Some(max) = args.max_delay_ms {
        config.reconnect.max_delay = Duration::from_millis(max);
    }
}

/// Translate a `Profile` + global flags into a `SubscriptionConfig`.
///
/// CLI flag overrides take priority over profile values.
fn resolve_profile(
    profile: &Profile,
    profile_name: &str,
    cfg: &Config,
    global: &GlobalOpts,
) -> Result<SubscriptionConfig, CliError> {
    // 1. Endpoint (flag > env > profile)
    let endpoint = match global.api_url.as_deref() {
        Some(raw) => parse_endpoint(raw)?,
        None => fleetwatch_config::profile_endpoint(profile)?,
    };

    // 2. Token (flag > credential chain)
    let token = match global.token {
        Some(ref token) => Some(SecretString::from(token.clone())),
        None => fleetwatch_config::resolve_token(profile, profile_name)?.map(|(token, source)| {
            tracing::debug!(?source, profile = profile_name, "resolved bearer token");
            token
        }),
    };

    // 3. TLS verification
    let tls = if global.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        fleetwatch_config::profile_tls(profile, &cfg.defaults)
    };

    // 4. Timeout (flag > profile > defaults)
    let timeout = global
        .timeout
        .or(profile.timeout)
        .unwrap_or(cfg.defaults.timeout);

    Ok(SubscriptionConfig {
        endpoint: Some(endpoint),
        token,
        tls,
        timeout: Duration::from_secs(timeout),
        reconnect: profile.reconnect_policy(),
    })
}

/// No profile found -- build from CLI flags / env vars alone.
fn from_flags(global: &GlobalOpts, cfg: &Config) -> Result<SubscriptionConfig, CliError> {
    let raw = global.api_url.as_deref().ok_or_else(|| CliError::NoConfig {
        path: config_path(global).display().to_string(),
    })?;

    let tls = if global.insecure || cfg.defaults.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    Ok(SubscriptionConfig {
        endpoint: Some(parse_endpoint(raw)?),
        token: global.token.clone().map(SecretString::from),
        tls,
        timeout: Duration::from_secs(global.timeout.unwrap_or(cfg.defaults.timeout)),
        reconnect: fleetwatch_core::ReconnectPolicy::default(),
    })
}

fn parse_endpoint(raw: &str) -> Result<Endpoint, CliError> {
    Endpoint::parse(raw).map_err(|e| CliError::Validation {
        field: "api_url".into(),
        reason: e.to_string(),
    })
}
