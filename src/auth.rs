//! Bearer token acquisition.
//!
//! Exchanges the configured service credentials for an access token using
//! the OAuth2 client-credentials grant. There is no retry: a rejected
//! exchange is fatal for the run, and the authority's `error_description`
//! is surfaced verbatim.

use serde::Deserialize;

use crate::config::RemoteConfig;
use crate::error::{Result, SyncError};

/// An opaque bearer token. `Debug` never prints the token itself.
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Client-credentials token provider for one tenant.
pub struct TokenProvider {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: Option<String>,
    missing_secret: String,
    scope: String,
}

impl TokenProvider {
    pub fn new(remote: &RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            token_url: remote.token_url(),
            client_id: remote.client_id.clone(),
            client_secret: remote.secret().map(str::to_string),
            missing_secret: remote.missing_secret_message(),
            scope: remote.scope(),
        }
    }

    /// Exchange the credentials for a bearer token.
    ///
    /// Fails without a request when no secret was configured or resolved.
    pub async fn acquire(&self) -> Result<AccessToken> {
        let Some(secret) = self.client_secret.as_deref() else {
            return Err(SyncError::Auth(self.missing_secret.clone()));
        };
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", secret),
            ("scope", self.scope.as_str()),
        ];

        let resp = self
            .client
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| SyncError::Auth(format!("token request failed: {}", e)))?;

        let status = resp.status();
        let body = resp.text().await?;
        tracing::debug!(%status, "token endpoint responded");

        let parsed: Option<TokenResponse> = serde_json::from_str(&body).ok();
        match parsed {
            Some(TokenResponse {
                access_token: Some(token),
                ..
            }) if status.is_success() => Ok(AccessToken::new(token)),
            Some(TokenResponse {
                error_description: Some(description),
                ..
            }) => Err(SyncError::Auth(description)),
            Some(TokenResponse {
                error: Some(error), ..
            }) => Err(SyncError::Auth(error)),
            _ => Err(SyncError::Auth(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(500).collect::<String>()
            ))),
        }
    }
}
