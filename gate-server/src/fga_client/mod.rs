use crate::config::{FgaConfig, FgaCredentials};
use crate::models::AccessQuery;
use async_trait::async_trait;
use http::header::{AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue, StatusCode};
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

pub mod check;
pub mod list_objects;
pub mod token;
pub mod write;

use token::TokenProvider;

/// Base delay between retries of read-only calls, multiplied by the attempt number
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Errors returned by the remote authorization service client
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FgaError {
    /// Connection failure, timeout, throttling or a server-side failure.
    /// The only error that allows a degraded-mode decision.
    #[error("Authorization service unavailable: {0}")]
    Unavailable(String),
    /// Well-formed rejection, e.g. an unknown model id or a malformed object
    #[error("Authorization service rejected the request ({status} {code}): {message}")]
    Remote {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Failed to parse authorization service response: {0}")]
    Decode(String),
    #[error("Failed to obtain authorization service credentials: {0}")]
    Credentials(String),
}

impl FgaError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<reqwest::Error> for FgaError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            // Connect errors, timeouts and broken bodies all mean the service
            // could not answer
            Self::Unavailable(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FgaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Error body returned by the service on a rejected request
#[derive(Debug, Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Maps an unsuccessful response to an error.
/// Throttling and server errors are transient; everything else is a rejection.
fn classify_failure(status: StatusCode, body: &[u8]) -> FgaError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return FgaError::Unavailable(format!("service responded with status {}", status));
    }
    let body: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    FgaError::Remote {
        status: status.as_u16(),
        code: if body.code.is_empty() {
            status.canonical_reason().unwrap_or("unknown").to_string()
        } else {
            body.code
        },
        message: body.message,
    }
}

/// Typed access to the remote relationship-based authorization service.
///
/// A pure transport: it performs no authorization of its own.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Does `principal` hold `relation` on `resource`?
    async fn check(&self, query: &AccessQuery) -> Result<bool, FgaError>;

    /// Writes the relationship tuple. Never retried.
    async fn write(&self, tuple: &AccessQuery) -> Result<(), FgaError>;

    /// Resources of `resource_type` on which `principal` holds `relation`
    async fn list_objects(
        &self,
        principal: &str,
        relation: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, FgaError>;

    /// Returns Ok(()) if the configured store is reachable
    async fn health_check(&self) -> Result<(), String>;
}

enum Auth {
    None,
    Static(String),
    Exchange(TokenProvider),
}

/// HTTP implementation of [`AuthorizationClient`]
pub struct HttpFgaClient {
    client: Client,
    config: FgaConfig,
    auth: Auth,
}

impl HttpFgaClient {
    pub fn new(config: &FgaConfig) -> Result<Self, FgaError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_millis(config.query_timeout_ms))
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .default_headers(headers)
            // Configure connection pool
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| FgaError::Credentials(format!("Failed to create HTTP client: {}", e)))?;

        let auth = match config.credentials().map_err(FgaError::Credentials)? {
            FgaCredentials::None => Auth::None,
            FgaCredentials::ApiToken(token) => Auth::Static(token),
            FgaCredentials::ClientCredentials {
                client_id,
                client_secret,
                token_url,
                audience,
            } => Auth::Exchange(TokenProvider::new(
                client.clone(),
                client_id,
                client_secret,
                token_url,
                audience,
            )),
        };

        Ok(Self {
            client,
            config: config.clone(),
            auth,
        })
    }

    async fn bearer(&self) -> Result<Option<String>, FgaError> {
        match &self.auth {
            Auth::None => Ok(None),
            Auth::Static(token) => Ok(Some(token.clone())),
            Auth::Exchange(provider) => provider.token().await.map(Some),
        }
    }

    fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<String>,
    ) -> reqwest::RequestBuilder {
        match token {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {}", token)),
            None => request,
        }
    }

    /// POSTs a JSON body to a store-scoped endpoint and decodes the response
    async fn send<B: Serialize + Sync, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R, FgaError> {
        let url = self.config.store_url(endpoint);
        debug!("Sending request to authorization service at: {}", url);

        let token = self.bearer().await?;
        let response = self
            .authorize(self.client.post(&url), token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Runs a read-only call, retrying while the service is unavailable
    async fn retrying<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, FgaError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FgaError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Err(err) if err.is_unavailable() && attempt < self.config.retry_attempts => {
                    attempt += 1;
                    warn!(
                        "{} failed ({}), retrying ({}/{})",
                        operation, err, attempt, self.config.retry_attempts
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl AuthorizationClient for HttpFgaClient {
    async fn check(&self, query: &AccessQuery) -> Result<bool, FgaError> {
        self.retrying("check", || self.post_check(query)).await
    }

    async fn write(&self, tuple: &AccessQuery) -> Result<(), FgaError> {
        self.post_write(tuple).await
    }

    async fn list_objects(
        &self,
        principal: &str,
        relation: &str,
        resource_type: &str,
    ) -> Result<Vec<String>, FgaError> {
        self.retrying("list-objects", || {
            self.post_list_objects(principal, relation, resource_type)
        })
        .await
    }

    async fn health_check(&self) -> Result<(), String> {
        let token = self.bearer().await.map_err(|e| e.to_string())?;
        let response = self
            .authorize(self.client.get(self.config.store_url("")), token)
            .send()
            .await
            .map_err(|e| format!("Failed to reach authorization service: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!(
                "Authorization service returned status: {}",
                response.status()
            ))
        }
    }
}
