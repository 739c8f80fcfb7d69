//! Credential sources for the socket auth challenge.
//!
//! A [`CredentialProvider`] hands out the access token sent in reply to
//! `auth_required`. Refresh failures are classified so the connection
//! loop can tell a dead refresh token (terminal) from a flaky network
//! (retry on backoff).

use std::fmt;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::time::Instant;
use url::Url;

use crate::error::Error;

/// Tokens this close to expiry are refreshed ahead of use.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Source of access tokens for the auth handshake.
#[async_trait]
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    /// Current access token, refreshing it first if needed.
    async fn access_token(&self) -> Result<SecretString, Error>;

    /// Forget any cached token so the next call refreshes.
    fn invalidate(&self) {}

    /// Whether a rejected token can be replaced by refreshing.
    fn can_refresh(&self) -> bool {
        false
    }
}

// ── StaticToken ──────────────────────────────────────────────────────

/// Long-lived access token. A rejection is always terminal.
pub struct StaticToken(SecretString);

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self(token)
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StaticToken(***)")
    }
}

#[async_trait]
impl CredentialProvider for StaticToken {
    async fn access_token(&self) -> Result<SecretString, Error> {
        Ok(self.0.clone())
    }
}

// ── OAuthRefresher ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

struct CachedToken {
    token: SecretString,
    expires_at: Option<Instant>,
}

/// Refresh-token credential exchanged at `{origin}/auth/token`.
pub struct OAuthRefresher {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    refresh_token: SecretString,
    cached: ArcSwapOption<CachedToken>,
}

impl fmt::Debug for OAuthRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthRefresher")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl OAuthRefresher {
    /// Build a refresher for the hub whose HTTP origin is `origin`.
    pub fn new(
        http: reqwest::Client,
        origin: &Url,
        client_id: impl Into<String>,
        refresh_token: SecretString,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            token_url: origin.join("auth/token")?,
            client_id: client_id.into(),
            refresh_token,
            cached: ArcSwapOption::empty(),
        })
    }

    async fn refresh(&self) -> Result<SecretString, Error> {
        tracing::debug!(url = %self.token_url, "Refreshing access token");

        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", self.refresh_token.expose_secret()),
            ("client_id", self.client_id.as_str()),
        ];
        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_server_error() {
            return Err(Error::CredentialRefresh {
                message: format!("token endpoint returned HTTP {}", status.as_u16()),
            });
        }

        if status.is_client_error() {
            let detail = serde_json::from_str::<TokenErrorResponse>(&body)
                .ok()
                .and_then(|e| e.error_description.or(e.error))
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(Error::AuthInvalid { message: detail });
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: e.to_string(),
                body,
            })?;

        let token = SecretString::from(parsed.access_token);
        let expires_at = parsed
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs));
        self.cached.store(Some(std::sync::Arc::new(CachedToken {
            token: token.clone(),
            expires_at,
        })));
        Ok(token)
    }
}

#[async_trait]
impl CredentialProvider for OAuthRefresher {
    async fn access_token(&self) -> Result<SecretString, Error> {
        if let Some(cached) = self.cached.load_full() {
            let fresh = cached
                .expires_at
                .is_none_or(|at| at > Instant::now() + EXPIRY_MARGIN);
            if fresh {
                return Ok(cached.token.clone());
            }
        }
        self.refresh().await
    }

    fn invalidate(&self) {
        self.cached.store(None);
    }

    fn can_refresh(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_verbatim() {
        let provider = StaticToken::new(SecretString::from("long-lived".to_string()));
        let token = provider.access_token().await.unwrap();
        assert_eq!(token.expose_secret(), "long-lived");
        assert!(!provider.can_refresh());
    }

    #[test]
    fn debug_output_hides_secrets() {
        let provider = StaticToken::new(SecretString::from("hunter2".to_string()));
        assert!(!format!("{provider:?}").contains("hunter2"));
    }

    #[test]
    fn token_url_is_joined_to_origin() {
        let origin = Url::parse("http://hub.local:8123/").unwrap();
        let refresher = OAuthRefresher::new(
            reqwest::Client::new(),
            &origin,
            "http://hearth.app/",
            SecretString::from("r".to_string()),
        )
        .unwrap();
        assert_eq!(
            refresher.token_url.as_str(),
            "http://hub.local:8123/auth/token"
        );
    }
}
