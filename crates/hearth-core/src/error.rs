// ── Core error types ──
//
// User-facing errors from hearth-core. Consumers never see socket frames
// or JSON parse failures directly; the `From<hearth_api::Error>` impl
// translates transport-layer errors into domain-appropriate variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Hub disconnected")]
    Disconnected,

    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{kind} not found: {identifier}")]
    NotFound { kind: String, identifier: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Operation rejected by hub ({code}): {message}")]
    Rejected { code: String, message: String },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // ── Local persistence ────────────────────────────────────────────
    #[error("Storage error: {message}")]
    Storage { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(kind: &str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.to_owned(),
            identifier: identifier.into(),
        }
    }

    /// Whether retrying later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. } | Self::Disconnected | Self::Timeout { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<hearth_api::Error> for CoreError {
    fn from(err: hearth_api::Error) -> Self {
        use hearth_api::Error as Api;

        match err {
            Api::AuthInvalid { message } => Self::AuthenticationFailed { message },
            Api::CredentialRefresh { message } => Self::ConnectionFailed {
                url: String::new(),
                reason: format!("credential refresh failed: {message}"),
            },
            Api::Transport(ref e) => {
                if e.is_timeout() {
                    Self::Timeout { timeout_ms: 0 }
                } else {
                    Self::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            Api::InvalidUrl(e) => Self::Validation {
                message: format!("Invalid URL: {e}"),
            },
            Api::Tls(msg) => Self::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::WebSocketConnect(reason) => Self::ConnectionFailed {
                url: String::new(),
                reason,
            },
            Api::WebSocketClosed { code, reason } => Self::ConnectionFailed {
                url: String::new(),
                reason: format!("socket closed (code {code}): {reason}"),
            },
            Api::Stalled { silent_secs } => Self::ConnectionFailed {
                url: String::new(),
                reason: format!("no frame for {silent_secs}s"),
            },
            Api::NotConfigured => Self::Validation {
                message: "connection is not configured".into(),
            },
            Api::NotConnected | Api::Disconnected => Self::Disconnected,
            Api::Timeout { timeout_ms } => Self::Timeout { timeout_ms },
            Api::DuplicateRequestId(id) => Self::Internal(format!("request id {id} reused")),
            Api::Remote { code, message } => {
                if code == "not_found" {
                    Self::NotFound {
                        kind: "Registry item".into(),
                        identifier: message,
                    }
                } else {
                    Self::Rejected { code, message }
                }
            }
            Api::Deserialization { message, body: _ } => {
                Self::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage {
            message: format!("malformed stored value: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_invalid_maps_to_authentication_failed() {
        let err = CoreError::from(hearth_api::Error::AuthInvalid {
            message: "nope".into(),
        });
        assert!(matches!(err, CoreError::AuthenticationFailed { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn dropped_transport_is_transient() {
        assert!(CoreError::from(hearth_api::Error::Disconnected).is_transient());
        assert!(CoreError::from(hearth_api::Error::Timeout { timeout_ms: 10 }).is_transient());
    }

    #[test]
    fn remote_rejection_keeps_code() {
        let err = CoreError::from(hearth_api::Error::Remote {
            code: "invalid_format".into(),
            message: "bad".into(),
        });
        assert!(matches!(err, CoreError::Rejected { ref code, .. } if code == "invalid_format"));
    }
}
