//! Shared configuration for fleetwatch.
//!
//! TOML profiles, bearer-token resolution (env + keyring + token file +
//! plaintext), and translation to `fleetwatch_core::SubscriptionConfig`.
//! The CLI layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use fleetwatch_core::{Endpoint, ReconnectPolicy, SubscriptionConfig, TlsVerification};

/// Keyring service name under which tokens are stored.
pub const KEYRING_SERVICE: &str = "fleetwatch";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found (available: {available})")]
    ProfileNotFound { name: String, available: String },

    #[error("cannot read token file {path}: {source}")]
    TokenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named backend profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use when none is given explicitly.
    pub fn active_profile_name(&self) -> &str {
        self.default_profile.as_deref().unwrap_or("default")
    }

    /// Look up a profile by name, listing the alternatives on failure.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles.get(name).ok_or_else(|| {
            let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            names.sort_unstable();
            ConfigError::ProfileNotFound {
                name: name.into(),
                available: if names.is_empty() {
                    "none".into()
                } else {
                    names.join(", ")
                },
            }
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// HTTP timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named backend profile.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Profile {
    /// GraphQL endpoint (e.g., "https://api.fleet.example/graphql").
    /// The subscription socket URL is derived from it.
    pub api_url: String,

    /// Bearer token (plaintext -- prefer keyring, env var or token file).
    pub token: Option<String>,

    /// Environment variable name containing the bearer token.
    pub token_env: Option<String>,

    /// File holding the persisted session token. Defaults to
    /// `<data dir>/tokens/<profile>` when that file exists.
    pub token_file: Option<PathBuf>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,

    /// Reconnection attempts before live updates give up.
    pub max_attempts: Option<u32>,

    /// First reconnect delay in milliseconds.
    pub base_delay_ms: Option<u64>,

    /// Reconnect delay ceiling in milliseconds.
    pub max_delay_ms: Option<u64>,
}

impl Profile {
    /// Reconnection policy with this profile's overrides applied.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        let defaults = ReconnectPolicy::default();
        ReconnectPolicy {
            base_delay: self
                .base_delay_ms
                .map_or(defaults.base_delay, Duration::from_millis),
            max_delay: self
                .max_delay_ms
                .map_or(defaults.max_delay, Duration::from_millis),
            max_attempts: self.max_attempts.unwrap_or(defaults.max_attempts),
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "fleetwatch", "fleetwatch")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default location of a profile's persisted token.
pub fn default_token_path(profile_name: &str) -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("tokens").join(profile_name),
        |dirs| dirs.data_dir().join("tokens").join(profile_name),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("fleetwatch");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load Config from `path` + `FLEETWATCH_` environment variables.
///
/// Nested keys use a double underscore:
/// `FLEETWATCH_DEFAULTS__TIMEOUT=10`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("FLEETWATCH_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

// ── Token resolution (without CLI flags) ────────────────────────────

/// Where a resolved token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Env,
    Keyring,
    File,
    Plaintext,
}

/// Resolve the bearer token from the credential chain (no CLI flag step).
///
/// The token is optional: `Ok(None)` means the backend will be called
/// unauthenticated. Only an explicitly configured but unreadable token
/// file is an error.
pub fn resolve_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<(SecretString, TokenSource)>, ConfigError> {
    // 1. Profile's token_env → env var lookup
    if let Some(ref env_name) = profile.token_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(Some((SecretString::from(val), TokenSource::Env)));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/token")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(Some((SecretString::from(secret), TokenSource::Keyring)));
        }
    }

    // 3. Persisted token file
    let configured = profile.token_file.is_some();
    let path = profile
        .token_file
        .clone()
        .unwrap_or_else(|| default_token_path(profile_name));
    if configured || path.is_file() {
        let contents = std::fs::read_to_string(&path)
            .map_err(|source| ConfigError::TokenFile { path, source })?;
        let token = contents.trim();
        if !token.is_empty() {
            return Ok(Some((SecretString::from(token.to_owned()), TokenSource::File)));
        }
    }

    // 4. Plaintext in config
    Ok(profile
        .token
        .as_ref()
        .map(|token| (SecretString::from(token.clone()), TokenSource::Plaintext)))
}

/// Parse and validate a profile's `api_url`.
pub fn profile_endpoint(profile: &Profile) -> Result<Endpoint, ConfigError> {
    Endpoint::parse(&profile.api_url).map_err(|e| ConfigError::Validation {
        field: "api_url".into(),
        reason: e.to_string(),
    })
}

/// TLS strategy for a profile, falling back to the global default.
pub fn profile_tls(profile: &Profile, defaults: &Defaults) -> TlsVerification {
    if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    }
}

/// Build a `SubscriptionConfig` from a profile -- no CLI flag overrides.
pub fn profile_to_subscription_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SubscriptionConfig, ConfigError> {
    let endpoint = profile_endpoint(profile)?;
    let token = resolve_token(profile, profile_name)?.map(|(token, _)| token);

    Ok(SubscriptionConfig {
        endpoint: Some(endpoint),
        token,
        tls: profile_tls(profile, defaults),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
        reconnect: profile.reconnect_policy(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile(api_url: &str) -> Profile {
        Profile {
            api_url: api_url.into(),
            ..Profile::default()
        }
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "staging"

[defaults]
output = "json"
timeout = 10

[profiles.staging]
api_url = "https://staging.fleet.example/graphql"
max_attempts = 3
base_delay_ms = 500
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        assert_eq!(config.active_profile_name(), "staging");
        assert_eq!(config.defaults.output, "json");
        assert_eq!(config.defaults.color, "auto");
        assert_eq!(config.defaults.timeout, 10);

        let staging = config.profile("staging").unwrap();
        let policy = staging.reconnect_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.active_profile_name(), "default");
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn unknown_profile_lists_alternatives() {
        let mut config = Config::default();
        config.profiles.insert("prod".into(), profile("https://a/graphql"));
        config.profiles.insert("dev".into(), profile("https://b/graphql"));

        let err = config.profile("qa").unwrap_err();
        assert_eq!(
            err.to_string(),
            "profile 'qa' not found (available: dev, prod)"
        );
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.profiles.insert("default".into(), Profile {
            max_delay_ms: Some(10_000),
            ..profile("https://api.fleet.example/graphql")
        });
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let default = loaded.profile("default").unwrap();
        assert_eq!(default.api_url, "https://api.fleet.example/graphql");
        assert_eq!(default.max_delay_ms, Some(10_000));
    }

    #[test]
    fn token_file_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let token_path = dir.path().join("token");
        std::fs::write(&token_path, "  abc.def.ghi\n").unwrap();

        let p = Profile {
            token_file: Some(token_path),
            token: Some("plaintext".into()),
            ..profile("https://api.fleet.example/graphql")
        };
        let (token, source) = resolve_token(&p, "fleetwatch-test-file").unwrap().unwrap();
        assert_eq!(token.expose_secret(), "abc.def.ghi");
        assert_eq!(source, TokenSource::File);
    }

    #[test]
    fn unreadable_token_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = Profile {
            token_file: Some(dir.path().join("missing")),
            ..profile("https://api.fleet.example/graphql")
        };
        let err = resolve_token(&p, "fleetwatch-test-missing").unwrap_err();
        assert!(matches!(err, ConfigError::TokenFile { .. }));
    }

    #[test]
    fn plaintext_token_is_last_resort() {
        let p = Profile {
            token: Some("plain".into()),
            ..profile("https://api.fleet.example/graphql")
        };
        let (token, source) = resolve_token(&p, "fleetwatch-test-plain").unwrap().unwrap();
        assert_eq!(token.expose_secret(), "plain");
        assert_eq!(source, TokenSource::Plaintext);
    }

    #[test]
    fn subscription_config_from_profile() {
        let p = Profile {
            ca_cert: Some(PathBuf::from("/etc/fleet/ca.pem")),
            timeout: Some(5),
            ..profile("https://api.fleet.example/graphql")
        };
        let config = profile_to_subscription_config(&p, "fleetwatch-test-cfg", &Defaults::default()).unwrap();

        let endpoint = config.endpoint.unwrap();
        assert_eq!(endpoint.ws_url().as_str(), "wss://api.fleet.example/graphql");
        assert_eq!(
            config.tls,
            TlsVerification::CustomCa(PathBuf::from("/etc/fleet/ca.pem"))
        );
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.reconnect, ReconnectPolicy::default());
    }

    #[test]
    fn insecure_overrides_ca() {
        let p = Profile {
            insecure: Some(true),
            ca_cert: Some(PathBuf::from("/etc/fleet/ca.pem")),
            ..profile("https://api.fleet.example/graphql")
        };
        assert_eq!(
            profile_tls(&p, &Defaults::default()),
            TlsVerification::DangerAcceptInvalid
        );
    }

    #[test]
    fn bad_api_url_is_validation_error() {
        let err = profile_endpoint(&profile("ftp://files.example/graphql")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "api_url"));

        let err = profile_endpoint(&profile("not a url")).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }
}
