use confique::Config;
use std::collections::HashMap;

/// Configuration for the remote relationship-based authorization service
#[derive(Debug, Config, Clone)]
pub struct FgaConfig {
    /// Base URL of the authorization API (required)
    #[config(env = "GATE_FGA_API_URL")]
    pub api_url: String,

    /// Store identifier (required)
    #[config(env = "GATE_FGA_STORE_ID")]
    pub store_id: String,

    /// Authorization model identifier (required)
    #[config(env = "GATE_FGA_MODEL_ID")]
    pub model_id: String,

    /// Static bearer token, mutually exclusive with client credentials
    #[config(env = "GATE_FGA_API_TOKEN")]
    pub api_token: Option<String>,

    /// Client credentials exchanged for a bearer token at the token issuer
    #[config(env = "GATE_FGA_CLIENT_ID")]
    pub client_id: Option<String>,

    #[config(env = "GATE_FGA_CLIENT_SECRET")]
    pub client_secret: Option<String>,

    /// Token issuer host or URL (e.g. `auth.fga.dev`)
    #[config(env = "GATE_FGA_TOKEN_ISSUER")]
    pub token_issuer: Option<String>,

    /// Audience requested with client credentials (default: `<api_url>/`)
    #[config(env = "GATE_FGA_API_AUDIENCE")]
    pub api_audience: Option<String>,

    /// Timeout for a single remote query in milliseconds (default: 3000)
    #[config(env = "GATE_FGA_QUERY_TIMEOUT_MS", default = 3000)]
    pub query_timeout_ms: u64,

    /// Timeout for establishing a connection in milliseconds (default: 1000)
    #[config(env = "GATE_FGA_CONNECT_TIMEOUT_MS", default = 1000)]
    pub connect_timeout_ms: u64,

    /// Extra attempts for read-only calls when the service is unreachable (default: 2)
    #[config(env = "GATE_FGA_RETRY_ATTEMPTS", default = 2)]
    pub retry_attempts: u32,

    /// Valid relations per resource type, e.g. `document = ["viewer", "owner"]`.
    /// File only. When absent every type and relation is forwarded as-is.
    pub relations: Option<HashMap<String, Vec<String>>>,
}

/// How the client authenticates against the authorization service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FgaCredentials {
    None,
    ApiToken(String),
    ClientCredentials {
        client_id: String,
        client_secret: String,
        token_url: String,
        audience: String,
    },
}

impl FgaConfig {
    /// Resolves the credential settings, rejecting partial client credentials
    pub fn credentials(&self) -> Result<FgaCredentials, String> {
        let client_credentials = (
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
            self.token_issuer.as_deref(),
        );

        match (self.api_token.as_deref(), client_credentials) {
            (Some(_), (Some(_), _, _) | (_, Some(_), _)) => Err(
                "GATE_FGA_API_TOKEN and GATE_FGA_CLIENT_ID/SECRET are mutually exclusive"
                    .to_string(),
            ),
            (Some(token), _) => Ok(FgaCredentials::ApiToken(token.to_string())),
            (None, (None, None, None)) => Ok(FgaCredentials::None),
            (None, (Some(id), Some(secret), Some(issuer))) => {
                Ok(FgaCredentials::ClientCredentials {
                    client_id: id.to_string(),
                    client_secret: secret.to_string(),
                    token_url: token_url(issuer),
                    audience: self
                        .api_audience
                        .clone()
                        .unwrap_or_else(|| format!("{}/", self.api_url.trim_end_matches('/'))),
                })
            }
            (None, _) => Err(
                "Client credentials require GATE_FGA_CLIENT_ID, GATE_FGA_CLIENT_SECRET and GATE_FGA_TOKEN_ISSUER"
                    .to_string(),
            ),
        }
    }

    /// Returns the URL of a store-scoped endpoint, e.g. `check` or `list-objects`
    pub fn store_url(&self, endpoint: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let endpoint = endpoint.trim_start_matches('/');
        if endpoint.is_empty() {
            format!("{}/stores/{}", base, self.store_id)
        } else {
            format!("{}/stores/{}/{}", base, self.store_id, endpoint)
        }
    }
}

fn token_url(issuer: &str) -> String {
    let issuer = issuer.trim_end_matches('/');
    if issuer.starts_with("http://") || issuer.starts_with("https://") {
        format!("{}/oauth/token", issuer)
    } else {
        format!("https://{}/oauth/token", issuer)
    }
}
