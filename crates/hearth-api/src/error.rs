use thiserror::Error;

/// Top-level error type for the `hearth-api` crate.
///
/// Covers every failure mode of the socket client: authentication,
/// credential refresh, transport, request correlation, and remote
/// rejections. `hearth-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The remote rejected the credential, or the refresh endpoint refused
    /// the refresh token. Terminal: no automatic retry follows.
    #[error("Authentication rejected: {message}")]
    AuthInvalid { message: String },

    /// Refreshing the access token failed for a transient reason
    /// (network error, 5xx). Retried on the reconnect backoff.
    #[error("Credential refresh failed: {message}")]
    CredentialRefresh { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (token endpoint).
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// WebSocket connection failed or errored mid-stream.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the remote.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// No frame arrived within the heartbeat window.
    #[error("Connection stalled: no frame for {silent_secs}s")]
    Stalled { silent_secs: u64 },

    // ── Session ─────────────────────────────────────────────────────
    /// `connect()` was called before `configure()`.
    #[error("Connection is not configured")]
    NotConfigured,

    /// A command was issued while the session is not authenticated.
    #[error("Not connected")]
    NotConnected,

    /// The transport dropped while the request was in flight.
    #[error("Disconnected before a response arrived")]
    Disconnected,

    /// No response arrived before the request deadline.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// A new request was registered under an id that was still pending.
    #[error("Request id {0} was reused while pending")]
    DuplicateRequestId(u64),

    // ── Remote ──────────────────────────────────────────────────────
    /// The remote answered `success: false`.
    #[error("Remote rejected command ({code}): {message}")]
    Remote { code: String, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the credential itself is bad and retrying with
    /// the same credential cannot succeed.
    pub fn is_auth_invalid(&self) -> bool {
        matches!(self, Self::AuthInvalid { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::CredentialRefresh { .. }
            | Self::WebSocketConnect(_)
            | Self::WebSocketClosed { .. }
            | Self::Stalled { .. }
            | Self::Disconnected
            | Self::NotConnected
            | Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Extract the remote error code, if available.
    pub fn remote_code(&self) -> Option<&str> {
        match self {
            Self::Remote { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_invalid_is_terminal_not_transient() {
        let err = Error::AuthInvalid {
            message: "bad token".into(),
        };
        assert!(err.is_auth_invalid());
        assert!(!err.is_transient());
    }

    #[test]
    fn refresh_and_socket_failures_are_transient() {
        assert!(Error::CredentialRefresh { message: "503".into() }.is_transient());
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(Error::Timeout { timeout_ms: 30_000 }.is_transient());
        assert!(Error::Disconnected.is_transient());
    }

    #[test]
    fn remote_code_only_for_remote_errors() {
        let err = Error::Remote {
            code: "not_found".into(),
            message: "Label not found".into(),
        };
        assert_eq!(err.remote_code(), Some("not_found"));
        assert_eq!(Error::Disconnected.remote_code(), None);
    }
}
