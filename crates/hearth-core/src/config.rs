// ── Runtime session configuration ──
//
// These types describe *how* to reach a hub and how the ordering engine
// is tuned. They carry credential data but never touch disk. The CLI
// constructs a `SessionConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use hearth_api::ReconnectConfig;
use secrecy::SecretString;
use url::Url;

use crate::order::OrderConfig;

/// How to authenticate with the hub.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Long-lived access token.
    Token(SecretString),
    /// Refresh token exchanged for short-lived access tokens.
    Refresh {
        refresh_token: SecretString,
        client_id: String,
    },
}

/// TLS verification strategy for the token endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed hubs).
    DangerAcceptInvalid,
}

/// Configuration for one session against one hub.
///
/// Built by the CLI, passed to `Session` -- core never reads config files.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Socket endpoint (e.g. `ws://hub.local:8123/api/websocket`).
    pub url: Url,
    pub credential: Credential,
    pub tls: TlsVerification,
    /// Deadline for each socket request.
    pub request_timeout: Duration,
    pub reconnect: ReconnectConfig,
    /// Ping cadence; `None` disables the heartbeat.
    pub heartbeat_interval: Option<Duration>,
    /// How long a predicted toggle state masks the real one.
    pub overlay_ttl: Duration,
    pub order: OrderConfig,
    /// Prefix that marks labels owned by this client.
    pub label_prefix: String,
}

impl SessionConfig {
    pub fn new(url: Url, credential: Credential) -> Self {
        Self {
            url,
            credential,
            tls: TlsVerification::default(),
            request_timeout: Duration::from_secs(30),
            reconnect: ReconnectConfig::default(),
            heartbeat_interval: Some(Duration::from_secs(30)),
            overlay_ttl: Duration::from_secs(5),
            order: OrderConfig::default(),
            label_prefix: crate::sync::DEFAULT_LABEL_PREFIX.to_owned(),
        }
    }
}
