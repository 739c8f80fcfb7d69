// Shared HTTP transport configuration.
//
// The socket itself is opened by tokio-tungstenite; plain HTTP is only
// used for the credential refresh endpoint. Both derive their base URL
// from the configured socket endpoint.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::Error;

/// TLS verification mode for HTTP calls.
#[derive(Debug, Clone, Default)]
pub enum TlsMode {
    /// Use the system certificate store.
    #[default]
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate (self-signed hubs on the local network).
    DangerAcceptInvalid,
}

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(concat!("hearth/", env!("CARGO_PKG_VERSION")));

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

/// Map a socket endpoint (`ws://host:8123/api/websocket`) to the HTTP
/// origin it is served from (`http://host:8123/`).
pub fn http_origin(endpoint: &Url) -> Result<Url, Error> {
    let scheme = match endpoint.scheme() {
        "wss" | "https" => "https",
        _ => "http",
    };
    let host = endpoint
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(url::ParseError::EmptyHost))?;
    let origin = match endpoint.port() {
        Some(port) => format!("{scheme}://{host}:{port}/"),
        None => format!("{scheme}://{host}/"),
    };
    Ok(Url::parse(&origin)?)
}

/// Map an HTTP base URL to the socket endpoint served under it.
pub fn socket_endpoint(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    let host = base
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(url::ParseError::EmptyHost))?;
    let raw = match base.port() {
        Some(port) => format!("{scheme}://{host}:{port}/api/websocket"),
        None => format!("{scheme}://{host}/api/websocket"),
    };
    Ok(Url::parse(&raw)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn origin_from_plain_socket() {
        let ws = Url::parse("ws://hub.local:8123/api/websocket").unwrap();
        assert_eq!(http_origin(&ws).unwrap().as_str(), "http://hub.local:8123/");
    }

    #[test]
    fn origin_from_secure_socket() {
        let ws = Url::parse("wss://hub.example.com/api/websocket").unwrap();
        assert_eq!(
            http_origin(&ws).unwrap().as_str(),
            "https://hub.example.com/"
        );
    }

    #[test]
    fn socket_from_http_base() {
        let base = Url::parse("http://10.0.0.2:8123").unwrap();
        assert_eq!(
            socket_endpoint(&base).unwrap().as_str(),
            "ws://10.0.0.2:8123/api/websocket"
        );
    }

    #[test]
    fn default_transport_builds() {
        assert!(TransportConfig::default().build_client().is_ok());
    }
}
