//! OAuth2 client-credentials tokens for the management plane

use keyguard_core::config::AzureConfig;
use keyguard_core::{ConfigError, SecretString, UpstreamError};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

use crate::client::sanitize_body;
use crate::resource::MANAGEMENT_AUDIENCE;

/// Tokens are refreshed this long before they expire
pub const REFRESH_MARGIN: Duration = Duration::from_secs(300);

const OPERATION: &str = "acquire_token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Seconds,
}

// The v1 endpoint reports `expires_in` as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(u64),
    Text(String),
}

impl Seconds {
    fn to_duration(&self) -> Option<Duration> {
        match self {
            Self::Number(secs) => Some(Duration::from_secs(*secs)),
            Self::Text(text) => text.trim().parse().ok().map(Duration::from_secs),
        }
    }
}

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

/// Service-principal token source with an in-memory cache
///
/// Concurrent callers share one refresh: the cache lock is held while a new
/// token is fetched.
pub struct TokenSource {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: SecretString,
    cached: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSource")
            .field("token_url", &self.token_url.as_str())
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl TokenSource {
    pub fn new(http: reqwest::Client, config: &AzureConfig) -> Result<Self, ConfigError> {
        let login = Url::parse(&config.login_endpoint).map_err(|e| ConfigError::InvalidValue {
            field: "azure.login_endpoint".into(),
            reason: e.to_string(),
        })?;
        let token_url = login
            .join(&format!("{}/oauth2/token", config.tenant_id.trim()))
            .map_err(|e| ConfigError::InvalidValue {
                field: "azure.tenant_id".into(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cached: Mutex::new(None),
        })
    }

    /// Current bearer token, fetching a new one when the cache is stale
    pub async fn token(&self) -> Result<SecretString, UpstreamError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
            return Ok(token.value.clone());
        }

        let (value, expires_in) = self.fetch().await?;
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + expires_in.saturating_sub(REFRESH_MARGIN),
        });
        tracing::info!(
            client_id = %self.client_id,
            expires_in_secs = expires_in.as_secs(),
            "Obtained management access token"
        );
        Ok(value)
    }

    /// Drop the cached token so the next call fetches a fresh one
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self) -> Result<(SecretString, Duration), UpstreamError> {
        let request = self.client_secret.expose_secret(|secret| {
            self.http.post(self.token_url.clone()).form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", secret),
                ("resource", MANAGEMENT_AUDIENCE),
            ])
        });

        let response = request.send().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to send token request");
            UpstreamError::Transport {
                operation: OPERATION.into(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| UpstreamError::Transport {
            operation: OPERATION.into(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            let body = sanitize_body(&body);
            tracing::error!(status = %status, body = %body, "Token request failed");
            return Err(if status.is_client_error() {
                UpstreamError::Unauthorized {
                    operation: OPERATION.into(),
                    reason: format!("HTTP {status}: {body}"),
                }
            } else {
                UpstreamError::Status {
                    operation: OPERATION.into(),
                    status: status.as_u16(),
                    body,
                }
            });
        }

        let token: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, body = %sanitize_body(&body), "Failed to parse token response");
            UpstreamError::Decode {
                operation: OPERATION.into(),
                reason: e.to_string(),
            }
        })?;
        let expires_in = token.expires_in.to_duration().ok_or_else(|| UpstreamError::Decode {
            operation: OPERATION.into(),
            reason: "expires_in is not a number of seconds".into(),
        })?;

        Ok((SecretString::new(token.access_token), expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_in_accepts_number_or_text() {
        let numeric: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","expires_in":3600}"#).unwrap();
        let text: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","expires_in":"3599"}"#).unwrap();

        assert_eq!(numeric.expires_in.to_duration(), Some(Duration::from_secs(3600)));
        assert_eq!(text.expires_in.to_duration(), Some(Duration::from_secs(3599)));
        assert_eq!(Seconds::Text("soon".into()).to_duration(), None);
    }

    #[test]
    fn token_url_includes_tenant() {
        let config = AzureConfig {
            tenant_id: "tenant-1".into(),
            login_endpoint: "https://login.example.test".into(),
            ..AzureConfig::default()
        };
        let source = TokenSource::new(reqwest::Client::new(), &config).unwrap();
        assert_eq!(
            source.token_url.as_str(),
            "https://login.example.test/tenant-1/oauth2/token"
        );
    }
}
