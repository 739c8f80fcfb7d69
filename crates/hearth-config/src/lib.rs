//! Shared configuration for hearth tools.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext), the
//! per-profile storage directory, and translation to
//! `hearth_core::SessionConfig`. The CLI layers its flag overrides on top.

use std::collections::BTreeMap;
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
use url::Url;

use hearth_core::sync::DEFAULT_LABEL_PREFIX;
use hearth_core::{Credential, OrderConfig, SessionConfig, TlsVerification};

/// Prefix of environment variables merged over the config file.
pub const ENV_PREFIX: &str = "HEARTH_";

/// Overrides the config file location.
pub const CONFIG_PATH_ENV: &str = "HEARTH_CONFIG";

/// Overrides the local storage root.
pub const DATA_DIR_ENV: &str = "HEARTH_DATA_DIR";

const KEYRING_SERVICE: &str = "hearth";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

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
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile by name.
    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::ProfileNotFound {
                name: name.into(),
                available: self.profiles.keys().cloned().collect(),
            })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Rank stride for renumbering and appends.
    #[serde(default = "default_gap")]
    pub gap: i64,

    /// Seconds a predicted toggle state is shown before it expires.
    #[serde(default = "default_overlay_ttl")]
    pub overlay_ttl: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            timeout: default_timeout(),
            gap: default_gap(),
            overlay_ttl: default_overlay_ttl(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_gap() -> i64 {
    OrderConfig::default().gap
}
fn default_overlay_ttl() -> u64 {
    5
}

/// A named hub profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Hub base URL (`http://hub.local:8123`) or socket endpoint
    /// (`ws://hub.local:8123/api/websocket`).
    pub url: String,

    /// Long-lived access token (plaintext, prefer keyring or env var).
    pub token: Option<String>,

    /// Environment variable holding the access token.
    pub token_env: Option<String>,

    /// OAuth refresh token; used together with `client_id`.
    pub refresh_token: Option<String>,

    /// Environment variable holding the refresh token.
    pub refresh_token_env: Option<String>,

    /// OAuth client id. When set the profile authenticates by refresh.
    pub client_id: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept self-signed certificates.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,

    /// Override rank stride.
    pub gap: Option<i64>,

    /// Prefix marking labels this client owns.
    pub label_prefix: Option<String>,
}

// ── Paths ───────────────────────────────────────────────────────────

/// Resolve the config file path: `HEARTH_CONFIG`, else platform conventions.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_PATH_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "hearth", "hearth").map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Root of local storage: `HEARTH_DATA_DIR`, else platform conventions.
pub fn data_dir() -> PathBuf {
    if let Some(path) = std::env::var_os(DATA_DIR_ENV) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("com", "hearth", "hearth").map_or_else(
        || dirs_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

/// Directory holding one profile's order, favorites and layout data.
pub fn storage_dir(profile_name: &str) -> PathBuf {
    data_dir().join(profile_name)
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("hearth");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults, then `path` (if present), then `HEARTH_*` variables.
///
/// Nested keys use a double underscore: `HEARTH_DEFAULTS__TIMEOUT=60`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve an access token: `token_env` → keyring → plaintext.
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    resolve_secret(
        profile.token_env.as_deref(),
        &format!("{profile_name}/token"),
        profile.token.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Resolve a refresh token: `refresh_token_env` → keyring → plaintext.
pub fn resolve_refresh_token(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_secret(
        profile.refresh_token_env.as_deref(),
        &format!("{profile_name}/refresh-token"),
        profile.refresh_token.as_deref(),
    )
    .ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Pick the credential kind from the profile: refresh when `client_id`
/// is set, otherwise a long-lived token.
pub fn resolve_credential(profile: &Profile, profile_name: &str) -> Result<Credential, ConfigError> {
    match profile.client_id.as_deref() {
        Some(client_id) if client_id.is_empty() => Err(ConfigError::Validation {
            field: "client_id".into(),
            reason: "must not be empty".into(),
        }),
        Some(client_id) => Ok(Credential::Refresh {
            refresh_token: resolve_refresh_token(profile, profile_name)?,
            client_id: client_id.to_owned(),
        }),
        None => Ok(Credential::Token(resolve_token(profile, profile_name)?)),
    }
}

fn resolve_secret(env_name: Option<&str>, keyring_user: &str, plaintext: Option<&str>) -> Option<SecretString> {
    if let Some(val) = env_name.and_then(|name| std::env::var(name).ok()) {
        return Some(SecretString::from(val));
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, keyring_user) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    plaintext.map(|s| SecretString::from(s.to_owned()))
}

/// Store a secret in the OS keyring under `{profile}/{kind}`.
pub fn store_secret(profile_name: &str, kind: &str, secret: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &format!("{profile_name}/{kind}"))
        .and_then(|entry| entry.set_password(secret))
        .map_err(|e| ConfigError::Validation {
            field: "keyring".into(),
            reason: e.to_string(),
        })
}

// ── Translation to SessionConfig ────────────────────────────────────

/// Accept a hub base URL or a socket endpoint and return the endpoint.
pub fn endpoint_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::Validation {
        field: "url".into(),
        reason,
    };
    let url: Url = raw.parse().map_err(|e| invalid(format!("{raw}: {e}")))?;
    let scheme = match url.scheme() {
        "ws" | "wss" => return Ok(url),
        "http" => "ws",
        "https" => "wss",
        other => return Err(invalid(format!("unsupported scheme '{other}'"))),
    };
    let host = url
        .host_str()
        .ok_or_else(|| invalid(format!("{raw}: missing host")))?;
    let path = match url.path().trim_end_matches('/') {
        "" => "/api/websocket",
        p => p,
    };
    let endpoint = match url.port() {
        Some(port) => format!("{scheme}://{host}:{port}{path}"),
        None => format!("{scheme}://{host}{path}"),
    };
    endpoint.parse().map_err(|e| invalid(format!("{endpoint}: {e}")))
}

/// Build a `SessionConfig` from a profile, without CLI flag overrides.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    let url = endpoint_url(&profile.url)?;
    let credential = resolve_credential(profile, profile_name)?;

    let mut config = SessionConfig::new(url, credential);

    config.tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    config.request_timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.overlay_ttl = Duration::from_secs(defaults.overlay_ttl);

    let gap = profile.gap.unwrap_or(defaults.gap);
    if gap < 2 {
        return Err(ConfigError::Validation {
            field: "gap".into(),
            reason: format!("must be at least 2, got {gap}"),
        });
    }
    config.order = OrderConfig { gap };

    config.label_prefix = match profile.label_prefix.as_deref() {
        Some("") => {
            return Err(ConfigError::Validation {
                field: "label_prefix".into(),
                reason: "must not be empty".into(),
            });
        }
        Some(prefix) => prefix.to_owned(),
        None => DEFAULT_LABEL_PREFIX.to_owned(),
    };

    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn profile(url: &str) -> Profile {
        Profile {
            url: url.into(),
            token: Some("plain-token".into()),
            ..Profile::default()
        }
    }

    #[test]
    fn load_merges_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "home"

[defaults]
timeout = 12

[profiles.home]
url = "http://hub.local:8123"
token = "abc"
gap = 100
"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("home"));
        assert_eq!(cfg.defaults.timeout, 12);
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.defaults.gap, 10);
        assert_eq!(cfg.profile("home").unwrap().gap, Some(100));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert!(cfg.profiles.is_empty());
        assert_eq!(cfg.defaults.overlay_ttl, 5);
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.profiles.insert("home".into(), profile("ws://hub/api/websocket"));

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profile("home").unwrap().url, "ws://hub/api/websocket");
    }

    #[test]
    fn unknown_profile_lists_available() {
        let mut cfg = Config::default();
        cfg.profiles.insert("home".into(), profile("ws://hub/"));
        let err = cfg.profile("cabin").unwrap_err();
        match err {
            ConfigError::ProfileNotFound { name, available } => {
                assert_eq!(name, "cabin");
                assert_eq!(available, vec!["home".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn http_base_maps_to_socket_endpoint() {
        assert_eq!(
            endpoint_url("http://hub.local:8123").unwrap().as_str(),
            "ws://hub.local:8123/api/websocket"
        );
        assert_eq!(
            endpoint_url("https://hub.example/").unwrap().as_str(),
            "wss://hub.example/api/websocket"
        );
        assert_eq!(
            endpoint_url("ws://10.0.0.2:8123/api/websocket").unwrap().as_str(),
            "ws://10.0.0.2:8123/api/websocket"
        );
        assert!(matches!(
            endpoint_url("ftp://hub"),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn session_config_applies_profile_overrides() {
        let mut p = profile("http://hub.local:8123");
        p.token_env = Some("HEARTH_TEST_TOKEN_THAT_IS_NEVER_SET".into());
        p.timeout = Some(7);
        p.gap = Some(50);
        p.insecure = Some(true);

        let config = profile_to_session_config(&p, "home", &Defaults::default()).unwrap();
        assert_eq!(config.url.as_str(), "ws://hub.local:8123/api/websocket");
        assert_eq!(config.request_timeout, Duration::from_secs(7));
        assert_eq!(config.order.gap, 50);
        assert_eq!(config.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(config.label_prefix, DEFAULT_LABEL_PREFIX);
        match config.credential {
            Credential::Token(token) => assert_eq!(token.expose_secret(), "plain-token"),
            Credential::Refresh { .. } => panic!("expected a static token"),
        }
    }

    #[test]
    fn client_id_selects_refresh_credential() {
        let p = Profile {
            url: "http://hub".into(),
            refresh_token: Some("r-1".into()),
            client_id: Some("http://hearth.local/".into()),
            ..Profile::default()
        };
        match resolve_credential(&p, "refresh-profile").unwrap() {
            Credential::Refresh {
                refresh_token,
                client_id,
            } => {
                assert_eq!(refresh_token.expose_secret(), "r-1");
                assert_eq!(client_id, "http://hearth.local/");
            }
            Credential::Token(_) => panic!("expected a refresh credential"),
        }
    }

    #[test]
    fn profile_without_secrets_has_no_credentials() {
        let p = Profile {
            url: "http://hub".into(),
            ..Profile::default()
        };
        assert!(matches!(
            resolve_credential(&p, "hearth-test-empty"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn tiny_gap_is_rejected() {
        let mut p = profile("http://hub");
        p.gap = Some(1);
        assert!(matches!(
            profile_to_session_config(&p, "home", &Defaults::default()),
            Err(ConfigError::Validation { field, .. }) if field == "gap"
        ));
    }
}
