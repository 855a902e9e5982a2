//! Client-credentials token exchange for the authorization service

use crate::fga_client::FgaError;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Tokens are refreshed this long before the issuer's expiry
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    audience: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Lifetime in seconds
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Exchanges client credentials for a bearer token and caches it until shortly
/// before it expires
pub struct TokenProvider {
    client: Client,
    client_id: String,
    client_secret: String,
    token_url: String,
    audience: String,
    cached: RwLock<Option<CachedToken>>,
}

impl TokenProvider {
    pub fn new(
        client: Client,
        client_id: String,
        client_secret: String,
        token_url: String,
        audience: String,
    ) -> Self {
        Self {
            client,
            client_id,
            client_secret,
            token_url,
            audience,
            cached: RwLock::new(None),
        }
    }

    /// Returns a valid access token, exchanging the credentials when needed
    pub async fn token(&self) -> Result<String, FgaError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if Instant::now() < cached.refresh_at {
                return Ok(cached.access_token.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        let token = self.exchange().await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    async fn exchange(&self) -> Result<CachedToken, FgaError> {
        debug!("Requesting access token from {}", self.token_url);
        let request = TokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            audience: &self.audience,
            grant_type: "client_credentials",
        };

        let response = self.client.post(&self.token_url).json(&request).send().await?;
        let status = response.status();
        if status.is_server_error() {
            return Err(FgaError::Unavailable(format!(
                "token issuer responded with status {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(FgaError::Credentials(format!(
                "token issuer responded with status {}",
                status
            )));
        }

        let body = response.bytes().await?;
        let token: TokenResponse = serde_json::from_slice(&body)
            .map_err(|e| FgaError::Credentials(format!("invalid token response: {}", e)))?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(REFRESH_MARGIN);

        Ok(CachedToken {
            access_token: token.access_token,
            refresh_at: Instant::now() + lifetime,
        })
    }
}
